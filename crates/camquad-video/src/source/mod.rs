//! Frame sources.

mod camera;
mod pattern;

pub use camera::CameraSource;
pub use pattern::TestPatternSource;

use crate::error::SourceError;
use crate::frame::RawFrame;

/// A live sequence of frames.
///
/// `next_frame` never blocks for longer than one capture interval and returns
/// `None` for a capture miss; a miss is not the end of the stream.
pub trait FrameSource {
    /// Acquires the device. Must succeed before frames are polled.
    fn open(&mut self) -> Result<(), SourceError>;

    fn next_frame(&mut self) -> Option<RawFrame>;

    /// Releases the device. Calling it again, or before `open`, does nothing.
    fn release(&mut self);

    /// Delivered frame size, known once the source is open.
    fn resolution(&self) -> Option<(u32, u32)>;

    /// Human readable name for logs.
    fn describe(&self) -> String;
}
