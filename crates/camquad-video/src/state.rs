//! Interactive state shared by the pipeline stages.

use std::fmt;

use glam::Vec2;

/// Image filter. The discriminant is the `filterMode` shader value.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FilterMode {
    #[default]
    None = 0,
    Pixelate = 1,
    Grayscale = 2,
}

impl FilterMode {
    #[inline]
    pub const fn ordinal(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Pixelate => "pixelate",
            Self::Grayscale => "grayscale",
        })
    }
}

/// Where filters and transforms are evaluated.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ProcessingMode {
    Cpu,
    #[default]
    Gpu,
}

impl ProcessingMode {
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Cpu => Self::Gpu,
            Self::Gpu => Self::Cpu,
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
        })
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum DragMode {
    #[default]
    Idle,
    Dragging,
}

/// Translate / rotate / scale applied to the video.
///
/// `translation` is in normalized units (the frame spans `[-1, 1]`), positive y
/// is up. `rotation` is degrees, counter-clockwise. `scale` always lies in
/// `[SCALE_MIN, SCALE_MAX]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransformState {
    translation: Vec2,
    rotation: f32,
    scale: f32,
    mode: DragMode,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            rotation: 0.0,
            scale: 1.0,
            mode: DragMode::Idle,
        }
    }
}

impl TransformState {
    pub const SCALE_MIN: f32 = 0.1;
    pub const SCALE_MAX: f32 = 5.0;

    pub fn new(translation: Vec2, rotation: f32, scale: f32) -> Self {
        Self {
            translation,
            rotation,
            scale: clamp_scale(scale),
            mode: DragMode::Idle,
        }
    }

    #[inline]
    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[inline]
    pub fn mode(&self) -> DragMode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: DragMode) {
        self.mode = mode;
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.translation += delta;
    }

    pub fn rotate(&mut self, degrees: f32) {
        self.rotation += degrees;
    }

    pub fn adjust_scale(&mut self, delta: f32) {
        self.scale = clamp_scale(self.scale + delta);
    }

    /// Back to identity. The drag mode is left alone.
    pub fn reset(&mut self) {
        self.translation = Vec2::ZERO;
        self.rotation = 0.0;
        self.scale = 1.0;
    }

    /// True when applying this transform changes nothing.
    pub fn is_identity(&self) -> bool {
        self.translation == Vec2::ZERO && self.rotation == 0.0 && self.scale == 1.0
    }
}

fn clamp_scale(scale: f32) -> f32 {
    if scale.is_nan() {
        return 1.0;
    }
    scale.clamp(TransformState::SCALE_MIN, TransformState::SCALE_MAX)
}

/// Everything input handling mutates, read by the pipeline once per frame.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct AppContext {
    pub transform: TransformState,
    pub filter: FilterMode,
    pub processing: ProcessingMode,
}

impl AppContext {
    /// Copy of the state for one frame iteration.
    #[inline]
    pub fn snapshot(&self) -> AppContext {
        *self
    }
}
