//! Per-frame pipeline: capture, optional CPU processing, upload, uniforms, stats.

use std::time::Duration;

use camquad_engine::render::{
    EnsureOutcome, StreamingTexture, TextureBackend, TextureDesc, TextureError, UniformCarrier,
};

use crate::filter::FilterEngine;
use crate::frame::{FrameNormalizer, ProcessedFrame};
use crate::perf::PerformanceSample;
use crate::source::FrameSource;
use crate::state::{AppContext, ProcessingMode};
use crate::uniforms::ShaderUniformBridge;

/// What happened to the texture this frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A new frame was written. `reallocated` is set when its size differed
    /// from the previous one.
    Uploaded { width: u32, height: u32, reallocated: bool },
    /// No frame was available; the previous texture contents stay.
    Stale,
}

/// Owns the CPU-side stages of the frame loop.
///
/// One [`step`](Self::step) per rendered frame, in this order:
/// 1. poll the source (a miss skips 2 to 4)
/// 2. CPU mode only: filter and transform the frame
/// 3. normalize to RGBA8 bottom-up, then ensure and update the texture
/// 4. write the shader uniforms from the frame's state snapshot
/// 5. record the frame time and report FPS once per second
///
/// Uniforms are only rewritten together with the texture, so the shader always
/// matches how the pixels it samples were produced.
///
/// Drawing happens after `step` returns.
#[derive(Debug)]
pub struct FramePipeline {
    filters: FilterEngine,
    normalizer: FrameNormalizer,
    bridge: ShaderUniformBridge,
    perf: PerformanceSample,
}

impl FramePipeline {
    pub fn new(tile_size: u32) -> Self {
        Self {
            filters: FilterEngine::new(tile_size),
            normalizer: FrameNormalizer::new(),
            bridge: ShaderUniformBridge::new(tile_size),
            perf: PerformanceSample::default(),
        }
    }

    #[inline]
    pub fn filters(&self) -> &FilterEngine {
        &self.filters
    }

    #[inline]
    pub fn perf(&self) -> &PerformanceSample {
        &self.perf
    }

    /// Runs one iteration. `state` is the snapshot taken at the start of the
    /// frame; `frame_time` is the duration of the previous frame.
    pub fn step<S, B, U>(
        &mut self,
        source: &mut S,
        texture: &mut StreamingTexture<B::Texture>,
        backend: &mut B,
        uniforms: &mut U,
        state: &AppContext,
        frame_time: Duration,
    ) -> Result<StepOutcome, TextureError>
    where
        S: FrameSource + ?Sized,
        B: TextureBackend,
        U: UniformCarrier + ?Sized,
    {
        let outcome = self.upload(source, texture, backend, state)?;

        if let StepOutcome::Uploaded { .. } = outcome {
            self.bridge.apply(uniforms, state);
        }

        if let Some(report) = self.perf.record(frame_time) {
            log::info!(
                "FPS: {:.1} ({:.2} ms) | mode: {} | filter: {}",
                report.fps,
                report.mean_frame_ms,
                state.processing,
                state.filter
            );
        }

        Ok(outcome)
    }

    /// Logs lifetime frame count and the current window's mean frame time.
    pub fn log_stats(&self) {
        match self.perf.summary() {
            Some(r) => log::info!(
                "frames: {} total | {:.2} ms mean over last {} frames",
                self.perf.total_frames(),
                r.mean_frame_ms,
                r.frames
            ),
            None => log::info!("frames: {} total", self.perf.total_frames()),
        }
    }

    fn upload<S, B>(
        &mut self,
        source: &mut S,
        texture: &mut StreamingTexture<B::Texture>,
        backend: &mut B,
        state: &AppContext,
    ) -> Result<StepOutcome, TextureError>
    where
        S: FrameSource + ?Sized,
        B: TextureBackend,
    {
        let Some(frame) = source.next_frame() else {
            return Ok(StepOutcome::Stale);
        };

        let processed = match state.processing {
            ProcessingMode::Cpu => self.filters.apply(frame, state.filter, &state.transform),
            ProcessingMode::Gpu => ProcessedFrame::from(frame),
        };
        if processed.is_empty() {
            log::debug!("empty frame from {}; skipped", source.describe());
            return Ok(StepOutcome::Stale);
        }

        let (width, height) = (processed.width(), processed.height());
        let pixels = self.normalizer.normalize(&processed);

        let ensured = texture.ensure(backend, TextureDesc::rgba8_srgb(width, height))?;
        texture.update(backend, width, height, pixels);

        Ok(StepOutcome::Uploaded {
            width,
            height,
            reallocated: matches!(ensured, EnsureOutcome::Allocated { replaced: true }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::frame::{PixelLayout, RawFrame};
    use crate::source::TestPatternSource;
    use crate::state::{FilterMode, TransformState};
    use camquad_engine::render::ShaderUniforms;
    use glam::Vec2;
    use std::collections::VecDeque;

    const DT: Duration = Duration::from_millis(16);

    #[derive(Default)]
    struct FakeBackend {
        created: usize,
        last_upload: Vec<u8>,
    }

    impl TextureBackend for FakeBackend {
        type Texture = ();

        fn create_texture(&mut self, _desc: &TextureDesc) -> Result<(), TextureError> {
            self.created += 1;
            Ok(())
        }

        fn write_texture(&mut self, _texture: &(), _desc: &TextureDesc, pixels: &[u8]) {
            self.last_upload.clear();
            self.last_upload.extend_from_slice(pixels);
        }
    }

    /// Plays back a fixed list of poll results.
    struct Scripted(VecDeque<Option<RawFrame>>);

    impl FrameSource for Scripted {
        fn open(&mut self) -> Result<(), SourceError> {
            Ok(())
        }
        fn next_frame(&mut self) -> Option<RawFrame> {
            self.0.pop_front().flatten()
        }
        fn release(&mut self) {}
        fn resolution(&self) -> Option<(u32, u32)> {
            None
        }
        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    struct Harness {
        pipeline: FramePipeline,
        texture: StreamingTexture<()>,
        backend: FakeBackend,
        uniforms: ShaderUniforms,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                pipeline: FramePipeline::new(10),
                texture: StreamingTexture::new(),
                backend: FakeBackend::default(),
                uniforms: ShaderUniforms::new(),
            }
        }

        fn step(&mut self, source: &mut dyn FrameSource, state: &AppContext) -> StepOutcome {
            self.pipeline
                .step(source, &mut self.texture, &mut self.backend, &mut self.uniforms, state, DT)
                .unwrap()
        }
    }

    fn busy(processing: ProcessingMode) -> AppContext {
        AppContext {
            transform: TransformState::new(Vec2::new(0.2, 0.1), 30.0, 1.5),
            filter: FilterMode::Pixelate,
            processing,
        }
    }

    fn open_pattern(w: u32, h: u32) -> TestPatternSource {
        let mut src = TestPatternSource::new(w, h);
        src.open().unwrap();
        src
    }

    #[test]
    fn gpu_mode_skips_cpu_filters_and_mirrors_state() {
        let mut h = Harness::new();
        let mut src = open_pattern(32, 16);

        let out = h.step(&mut src, &busy(ProcessingMode::Gpu));

        assert_eq!(out, StepOutcome::Uploaded { width: 32, height: 16, reallocated: false });
        assert_eq!(h.pipeline.filters().invocations(), 0);
        assert_eq!(h.uniforms.filter_mode(), 1);
        assert_eq!(h.uniforms.scale(), 1.5);
    }

    #[test]
    fn cpu_mode_bakes_frame_and_neutralizes_shader() {
        let mut h = Harness::new();
        let mut src = open_pattern(32, 16);

        h.step(&mut src, &busy(ProcessingMode::Cpu));

        assert_eq!(h.pipeline.filters().invocations(), 1);
        assert_eq!(h.uniforms.filter_mode(), 0);
        assert_eq!(h.uniforms.translate(), [0.0, 0.0]);
        assert_eq!(h.uniforms.rotation(), 0.0);
        assert_eq!(h.uniforms.scale(), 1.0);
        assert_eq!(h.uniforms.pixel_size(), 10);
    }

    #[test]
    fn capture_miss_keeps_texture_and_uniforms_together() {
        let mut h = Harness::new();
        let frame = RawFrame::filled(4, 4, PixelLayout::Bgr8, &[1, 2, 3]);
        let mut src = Scripted(VecDeque::from([Some(frame), None]));

        h.step(&mut src, &busy(ProcessingMode::Cpu));
        let id = h.texture.id();

        // Switched to GPU mode, but the texture still holds CPU-baked pixels.
        let out = h.step(&mut src, &busy(ProcessingMode::Gpu));
        assert_eq!(out, StepOutcome::Stale);
        assert_eq!(h.texture.id(), id);
        assert_eq!(h.uniforms.filter_mode(), 0);
        assert_eq!(h.uniforms.translate(), [0.0, 0.0]);
        assert_eq!(h.uniforms.rotation(), 0.0);
        assert_eq!(h.uniforms.scale(), 1.0);
    }

    #[test]
    fn next_upload_after_miss_applies_new_mode() {
        let mut h = Harness::new();
        let frame = || RawFrame::filled(4, 4, PixelLayout::Bgr8, &[1, 2, 3]);
        let mut src = Scripted(VecDeque::from([Some(frame()), None, Some(frame())]));

        h.step(&mut src, &busy(ProcessingMode::Cpu));
        h.step(&mut src, &busy(ProcessingMode::Gpu));
        let out = h.step(&mut src, &busy(ProcessingMode::Gpu));

        assert!(matches!(out, StepOutcome::Uploaded { .. }));
        assert_eq!(h.pipeline.filters().invocations(), 1);
        assert_eq!(h.uniforms.filter_mode(), 1);
        assert_eq!(h.uniforms.scale(), 1.5);
    }

    #[test]
    fn empty_frame_is_stale() {
        let mut h = Harness::new();
        let mut src = Scripted(VecDeque::from([Some(RawFrame::empty(PixelLayout::Bgr8))]));

        let out = h.step(&mut src, &busy(ProcessingMode::Cpu));
        assert_eq!(out, StepOutcome::Stale);
        assert_eq!(h.backend.created, 0);
    }

    #[test]
    fn steady_stream_allocates_once() {
        let mut h = Harness::new();
        let mut src = open_pattern(64, 48);

        for _ in 0..30 {
            h.step(&mut src, &AppContext::default());
        }
        assert_eq!(h.backend.created, 1);
        assert_eq!(h.texture.allocation_count(), 1);
    }

    #[test]
    fn resolution_change_reallocates() {
        let mut h = Harness::new();
        let mut src = Scripted(VecDeque::from([
            Some(RawFrame::filled(4, 4, PixelLayout::Rgb8, &[0, 0, 0])),
            Some(RawFrame::filled(8, 2, PixelLayout::Rgb8, &[0, 0, 0])),
        ]));

        h.step(&mut src, &AppContext::default());
        let out = h.step(&mut src, &AppContext::default());

        assert_eq!(out, StepOutcome::Uploaded { width: 8, height: 2, reallocated: true });
        assert_eq!(h.backend.created, 2);
    }

    #[test]
    fn upload_is_rgba_bottom_up() {
        let mut h = Harness::new();
        // BGR: top row blue, bottom row red.
        let frame = RawFrame::new(1, 2, PixelLayout::Bgr8, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let mut src = Scripted(VecDeque::from([Some(frame)]));

        h.step(&mut src, &AppContext::default());
        assert_eq!(h.backend.last_upload, vec![255, 0, 0, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn cpu_grayscale_reaches_the_texture() {
        let mut h = Harness::new();
        let frame = RawFrame::new(1, 1, PixelLayout::Bgr8, vec![0, 0, 255]).unwrap();
        let mut src = Scripted(VecDeque::from([Some(frame)]));
        let state = AppContext {
            filter: FilterMode::Grayscale,
            processing: ProcessingMode::Cpu,
            ..Default::default()
        };

        h.step(&mut src, &state);
        assert_eq!(h.backend.last_upload, vec![76, 76, 76, 255]);
    }

    #[test]
    fn frames_are_counted() {
        let mut h = Harness::new();
        let mut src = Scripted(VecDeque::new());
        for _ in 0..5 {
            h.step(&mut src, &AppContext::default());
        }
        assert_eq!(h.pipeline.perf().total_frames(), 5);
    }
}
