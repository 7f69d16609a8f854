//! camquad video crate.
//!
//! The frame-to-texture pipeline on top of `camquad-engine`: frame sources,
//! CPU filters, interaction state, the uniform bridge that keeps the CPU and
//! GPU processing paths exclusive, and the per-frame pipeline step.

pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod interaction;
pub mod perf;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod uniforms;

pub use config::{CameraConfig, SourceKind, StudioConfig};
pub use error::{FrameError, SourceError};
pub use filter::FilterEngine;
pub use frame::{FrameNormalizer, PixelLayout, ProcessedFrame, RawFrame};
pub use interaction::{Command, InteractionController};
pub use perf::{PerfReport, PerformanceSample};
pub use pipeline::{FramePipeline, StepOutcome};
pub use source::{CameraSource, FrameSource, TestPatternSource};
pub use state::{AppContext, DragMode, FilterMode, ProcessingMode, TransformState};
pub use uniforms::ShaderUniformBridge;
