use camquad_engine::render::{ShaderUniforms, UniformCarrier};

use crate::state::{AppContext, FilterMode, ProcessingMode, TransformState};

/// Writes interactive state into the video shader's uniforms.
///
/// In CPU mode the frame already carries the filter and transform, so the
/// shader gets neutral values; in GPU mode it mirrors the state.
#[derive(Debug, Copy, Clone)]
pub struct ShaderUniformBridge {
    pixel_size: i32,
}

impl ShaderUniformBridge {
    pub fn new(pixel_size: u32) -> Self {
        Self { pixel_size: pixel_size.clamp(1, i32::MAX as u32) as i32 }
    }

    pub fn apply<U: UniformCarrier + ?Sized>(&self, carrier: &mut U, state: &AppContext) {
        let (filter, transform) = match state.processing {
            ProcessingMode::Cpu => (FilterMode::None, TransformState::default()),
            ProcessingMode::Gpu => (state.filter, state.transform),
        };

        carrier.set_int(ShaderUniforms::FILTER_MODE, filter.ordinal());
        carrier.set_int(ShaderUniforms::PIXEL_SIZE, self.pixel_size);
        carrier.set_float(ShaderUniforms::TRANSLATE_X, transform.translation().x);
        carrier.set_float(ShaderUniforms::TRANSLATE_Y, transform.translation().y);
        carrier.set_float(ShaderUniforms::ROTATION, transform.rotation().to_radians());
        carrier.set_float(ShaderUniforms::SCALE, transform.scale());
    }
}
