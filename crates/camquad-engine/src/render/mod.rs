//! GPU rendering subsystem.
//!
//! Each renderer owns its GPU resources (pipelines, buffers, textures); they are
//! released when the owning component is dropped.
//!
//! Convention:
//! - video frames are uploaded bottom row first (GL-style orientation), so the
//!   quad maps `uv = (0, 0)` to its bottom-left corner
//! - shader parameters are written by name through [`UniformCarrier`]

mod ctx;
mod quad;
mod shader;
mod texture;

pub use ctx::{RenderCtx, RenderTarget};
pub use quad::{QuadVertex, VideoQuad};
pub use shader::{ShaderUniforms, UniformCarrier, VideoShader, VideoUniforms};
pub use texture::{
    EnsureOutcome, GpuTexture, StreamingTexture, TextureBackend, TextureDesc, TextureError,
    TextureId, WgpuTextures,
};
