//! camquad engine crate.
//!
//! This crate owns the platform + GPU runtime pieces used by higher layers:
//! the winit runtime loop, input translation, frame timing, the streaming
//! video texture, the video shader and a small scene graph to draw it with.

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod coords;
pub mod render;
pub mod scene;
