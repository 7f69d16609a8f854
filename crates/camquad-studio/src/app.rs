use camquad_engine::core::{App, AppControl, FrameCtx};
use camquad_engine::render::{VideoQuad, WgpuTextures};
use camquad_engine::scene::{Camera, ObjectId, Scene, SceneObject};
use camquad_video::{
    AppContext, Command, FramePipeline, FrameSource, InteractionController, StepOutcome, StudioConfig,
};

/// The camquad application: one video quad in front of a fixed camera.
///
/// Field order is teardown order.
pub struct StudioApp {
    scene: Scene,
    quad: Option<ObjectId>,
    camera: Camera,
    pipeline: FramePipeline,
    interaction: InteractionController,
    state: AppContext,
    source: Box<dyn FrameSource>,
    clear: wgpu::Color,
}

impl StudioApp {
    pub fn new(config: &StudioConfig, source: Box<dyn FrameSource>) -> Self {
        let (width, height) = config.window_size;
        let [r, g, b] = config.clear_color;

        Self {
            scene: Scene::new(),
            quad: None,
            camera: Camera::default(),
            pipeline: FramePipeline::new(config.tile_size),
            interaction: InteractionController::new(width as f32, height as f32),
            state: AppContext::default(),
            source,
            clear: wgpu::Color { r, g, b, a: 1.0 },
        }
    }

    /// Feeds this frame's input events to the controller. Returns `true` on exit.
    fn handle_input(&mut self, ctx: &FrameCtx<'_, '_>) -> bool {
        let (w, h) = ctx.window.logical_size();
        self.interaction.set_window_size(w, h);

        let mut exit = false;
        for event in &ctx.input_frame.events {
            match self.interaction.handle(event, &mut self.state) {
                Some(Command::Exit) => exit = true,
                Some(Command::PrintStats) => self.pipeline.log_stats(),
                None => {}
            }
        }
        exit
    }
}

impl App for StudioApp {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let exit = self.handle_input(ctx);
        let snapshot = self.state.snapshot();

        let scene = &mut self.scene;
        let id = *self
            .quad
            .get_or_insert_with(|| scene.add(SceneObject::Quad(VideoQuad::new(1.0))));
        let Some(quad) = self.scene.video_quad_mut(id) else {
            return AppControl::Exit;
        };

        {
            let mut backend = WgpuTextures::new(ctx.gpu.device(), ctx.gpu.queue());
            let (texture, uniforms) = quad.stream_parts();
            let frame_time = ctx.time.raw_dt;

            match self.pipeline.step(self.source.as_mut(), texture, &mut backend, uniforms, &snapshot, frame_time) {
                Ok(StepOutcome::Uploaded { width, height, .. }) => {
                    quad.set_aspect(width as f32 / height as f32);
                }
                Ok(StepOutcome::Stale) => {}
                Err(err) => {
                    ctx.runtime.fail(anyhow::Error::new(err).context("video texture"));
                    return AppControl::Exit;
                }
            }
        }

        let scene = &mut self.scene;
        let camera = &self.camera;
        let control = ctx.render(self.clear, |rctx, target| scene.render(rctx, target, camera));

        if exit { AppControl::Exit } else { control }
    }

    fn on_exit(&mut self) {
        log::info!("shutting down after {} frames", self.pipeline.perf().total_frames());
        // GPU objects go before the runtime drops the device; the camera last.
        self.scene = Scene::new();
        self.quad = None;
        self.source.release();
    }
}
