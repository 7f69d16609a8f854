use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by higher layers.
///
/// Input is not delivered through a separate callback: events that arrived since
/// the previous frame are available on `FrameCtx::input_frame` in arrival order,
/// so an application consumes them at the start of `on_frame`.
pub trait App {
    /// Called once per rendered frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called once when the event loop is shutting down, before the GPU context
    /// is destroyed. Applications release their own resources here.
    fn on_exit(&mut self) {}
}
