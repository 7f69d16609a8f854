use thiserror::Error;

/// Frame source failures.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The capture device could not be opened. Fatal at startup.
    #[error("camera {index} unavailable: {reason}")]
    DeviceUnavailable { index: u32, reason: String },

    /// A capture produced no usable image. Tolerated; the frame is skipped.
    #[error("capture produced an empty frame")]
    EmptyFrame,

    #[error("camera capture is not supported on this platform")]
    Unsupported,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame buffer holds {got} bytes, {width}x{height} needs {expected}")]
    LengthMismatch { width: u32, height: u32, expected: usize, got: usize },
}
