use crate::error::SourceError;
use crate::frame::{PixelLayout, RawFrame};
use crate::source::FrameSource;

/// Synthetic source: a diagonal gradient scrolling one pixel per frame, with a
/// white crosshair through the centre. Frames are BGR like most capture APIs.
#[derive(Debug)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    open: bool,
    frame_index: u64,
    /// Every n-th poll reports a capture miss.
    drop_every: Option<u64>,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            open: false,
            frame_index: 0,
            drop_every: None,
        }
    }

    /// Simulates flaky capture: every `n`-th poll returns no frame.
    pub fn with_dropped_frames(mut self, n: u64) -> Self {
        self.drop_every = (n > 0).then_some(n);
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn render(&self) -> RawFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = self.frame_index as usize;
        let mut data = Vec::with_capacity(w * h * 3);

        for y in 0..h {
            for x in 0..w {
                if x == w / 2 || y == h / 2 {
                    data.extend_from_slice(&[255, 255, 255]);
                    continue;
                }
                let r = ((x + shift) * 255 / w.max(1)) as u8;
                let g = (y * 255 / h.max(1)) as u8;
                let b = (((x + y + shift) / 4) % 256) as u8;
                data.extend_from_slice(&[b, g, r]);
            }
        }

        RawFrame::new(self.width, self.height, PixelLayout::Bgr8, data)
            .unwrap_or_else(|_| RawFrame::empty(PixelLayout::Bgr8))
    }
}

impl FrameSource for TestPatternSource {
    fn open(&mut self) -> Result<(), SourceError> {
        self.open = true;
        log::info!("test pattern source opened at {}x{}", self.width, self.height);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        if !self.open {
            return None;
        }
        self.frame_index += 1;

        if let Some(n) = self.drop_every {
            if self.frame_index % n == 0 {
                log::debug!("test pattern: dropping frame {}", self.frame_index);
                return None;
            }
        }
        Some(self.render())
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.open) {
            log::info!("test pattern source released");
        }
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        self.open.then_some((self.width, self.height))
    }

    fn describe(&self) -> String {
        format!("test pattern {}x{}", self.width, self.height)
    }
}
