use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App as CoreApp, AppControl, FrameCtx, WindowCtx};
use crate::device::{Gpu, GpuInit};
use crate::input::platform::translate_window_event;
use crate::input::{InputFrame, InputState};
use crate::time::{FrameClock, FrameTime};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "camquad".to_string(),
            initial_size: LogicalSize::new(1024.0, 768.0),
        }
    }
}

/// Runtime context passed to the application.
///
/// Requests are buffered and applied after the current frame returns, so an
/// exit requested mid-frame still lets that frame complete.
#[derive(Default)]
pub struct RuntimeCtx {
    exit: bool,
    fatal: Option<anyhow::Error>,
}

impl RuntimeCtx {
    pub fn exit(&mut self) {
        self.exit = true;
    }

    /// Stops the loop and makes `Runtime::run` return `err`. The first error
    /// reported wins.
    pub fn fail(&mut self, err: anyhow::Error) {
        self.exit = true;
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Runs the event loop until the app exits or the window closes.
    ///
    /// Returns an error when the window or GPU context cannot be created, or
    /// when the app reported one through [`RuntimeCtx::fail`]. The app's
    /// `on_exit` has run by then.
    pub fn run<A>(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut state = AppState::new(initial, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    input_state: InputState,
    input_frame: InputFrame,
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    initial: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    window: Option<WindowEntry>,
    exit_requested: bool,
    exited: bool,

    /// First fatal error, from startup or `RuntimeCtx::fail`; returned from `Runtime::run`.
    fatal: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            initial,
            gpu_init,
            app,
            window: None,
            exit_requested: false,
            exited: false,
            fatal: None,
        }
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.initial.title.clone())
            .with_inner_size(self.initial.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();

        let entry = WindowEntryTryBuilder {
            input_state: InputState::default(),
            input_frame: InputFrame::default(),
            clock: FrameClock::default(),
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
            .try_build()
            .context("GPU initialization failed")?;

        entry.with_window(|w| w.request_redraw());
        self.window = Some(entry);
        Ok(())
    }

    /// Tears down in reverse acquisition order: the app's resources first, then
    /// the GPU context and window.
    fn shutdown(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        self.app.on_exit();
        self.window = None;
    }

    /// Applies the requests an app made during one frame. Returns `true` when
    /// the loop must stop.
    fn finish_frame(&mut self, control: AppControl, runtime_ctx: RuntimeCtx) -> bool {
        if let Some(err) = runtime_ctx.fatal {
            if self.fatal.is_none() {
                self.fatal = Some(err);
            }
        }
        if control == AppControl::Exit || runtime_ctx.exit {
            self.exit_requested = true;
        }
        self.exit_requested
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            log::error!("{e:#}");
            self.fatal = Some(e);
            self.exit_requested = true;
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous redraw: every iteration polls the frame source.
        if let Some(entry) = &self.window {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let Some(entry) = self.window.as_mut() else {
            return;
        };

        // Input is recorded in arrival order and consumed by the next frame.
        entry.with_mut(|fields| {
            if let Some(ev) = translate_window_event(fields.window, fields.input_state, &event) {
                fields.input_state.apply_event(fields.input_frame, ev);
            }
        });

        match &event {
            WindowEvent::CloseRequested => {
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                entry.with_gpu_mut(|gpu| gpu.resize(*new_size));
                entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let new_size = entry.with_window(|w| w.inner_size());
                entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::RedrawRequested => {
                let mut runtime_ctx = RuntimeCtx::default();
                let mut app_control = AppControl::Continue;
                let app = &mut self.app;

                entry.with_mut(|fields| {
                    let ft: FrameTime = fields.clock.tick();

                    // Scope so `ctx` is dropped before the frame deltas are cleared.
                    {
                        let mut ctx = FrameCtx {
                            window: WindowCtx {
                                id: window_id,
                                window: fields.window,
                            },
                            gpu: fields.gpu,
                            input: fields.input_state,
                            input_frame: fields.input_frame,
                            time: ft,
                            runtime: &mut runtime_ctx,
                        };

                        app_control = app.on_frame(&mut ctx);
                    }

                    fields.input_frame.clear();
                });

                if self.finish_frame(app_control, runtime_ctx) {
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

impl<A> Drop for AppState<A>
where
    A: CoreApp + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[derive(Default)]
    struct Idle {
        exits: usize,
    }

    impl CoreApp for Idle {
        fn on_frame(&mut self, _ctx: &mut FrameCtx<'_, '_>) -> AppControl {
            AppControl::Continue
        }

        fn on_exit(&mut self) {
            self.exits += 1;
        }
    }

    fn state() -> AppState<Idle> {
        AppState::new(RuntimeConfig::default(), GpuInit::default(), Idle::default())
    }

    #[test]
    fn continue_keeps_running() {
        let mut state = state();
        assert!(!state.finish_frame(AppControl::Continue, RuntimeCtx::default()));
        assert!(state.fatal.is_none());
    }

    #[test]
    fn exit_is_not_an_error() {
        let mut by_control = state();
        assert!(by_control.finish_frame(AppControl::Exit, RuntimeCtx::default()));
        assert!(by_control.fatal.is_none());

        let mut ctx = RuntimeCtx::default();
        ctx.exit();
        let mut by_request = state();
        assert!(by_request.finish_frame(AppControl::Continue, ctx));
        assert!(by_request.fatal.is_none());
    }

    #[test]
    fn failure_stops_loop_and_is_kept_for_run() {
        let mut ctx = RuntimeCtx::default();
        ctx.fail(anyhow!("allocation failed"));
        ctx.fail(anyhow!("second"));
        assert!(ctx.exit && ctx.fatal.is_some());

        let mut state = state();
        assert!(state.finish_frame(AppControl::Continue, ctx));
        let err = state.fatal.take().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("allocation failed"));
    }

    #[test]
    fn startup_error_is_not_overwritten_by_frame_error() {
        let mut state = state();
        state.fatal = Some(anyhow!("startup"));

        let mut ctx = RuntimeCtx::default();
        ctx.fail(anyhow!("frame"));
        state.finish_frame(AppControl::Exit, ctx);

        assert_eq!(state.fatal.take().map(|e| e.to_string()).as_deref(), Some("startup"));
    }

    #[test]
    fn shutdown_runs_app_exit_once() {
        let mut state = state();
        state.shutdown();
        state.shutdown();
        assert_eq!(state.app.exits, 1);
    }
}
