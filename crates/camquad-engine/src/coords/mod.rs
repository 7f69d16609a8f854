//! Surface-space geometry shared by renderers.

mod viewport;

pub use viewport::Viewport;
