use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::render::{
    GpuTexture, RenderCtx, RenderTarget, ShaderUniforms, StreamingTexture, VideoShader,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x2  // uv
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Two triangles spanning `[-aspect, aspect] × [-1, 1]` on the z = 0 plane.
/// `uv = (0, 0)` is the bottom-left corner.
pub fn quad_vertices(aspect: f32) -> [QuadVertex; 6] {
    let w = aspect;
    let v = |x: f32, y: f32, u: f32, t: f32| QuadVertex { position: [x, y, 0.0], uv: [u, t] };
    [
        v(-w, -1.0, 0.0, 0.0),
        v(w, -1.0, 1.0, 0.0),
        v(w, 1.0, 1.0, 1.0),
        v(w, 1.0, 1.0, 1.0),
        v(-w, 1.0, 0.0, 1.0),
        v(-w, -1.0, 0.0, 0.0),
    ]
}

/// A textured quad showing the video stream.
///
/// Owns its geometry, its shader and the streaming texture. Fields drop in
/// declaration order, so bindings go before the texture they reference.
pub struct VideoQuad {
    aspect: f32,
    model: Mat4,
    vbo: Option<wgpu::Buffer>,
    shader: VideoShader,
    texture: StreamingTexture<GpuTexture>,
}

impl VideoQuad {
    /// `aspect` is frame width / height. Non-finite or non-positive values fall back to 1.
    pub fn new(aspect: f32) -> Self {
        Self {
            aspect: sanitize_aspect(aspect),
            model: Mat4::IDENTITY,
            vbo: None,
            shader: VideoShader::new(),
            texture: StreamingTexture::new(),
        }
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Changes the quad's aspect ratio. Returns `true` when the geometry must be rebuilt.
    pub fn set_aspect(&mut self, aspect: f32) -> bool {
        let aspect = sanitize_aspect(aspect);
        if (aspect - self.aspect).abs() <= f32::EPSILON {
            return false;
        }
        log::debug!("video quad aspect {:.3} -> {:.3}", self.aspect, aspect);
        self.aspect = aspect;
        self.vbo = None;
        true
    }

    #[inline]
    pub fn model(&self) -> Mat4 {
        self.model
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.model = model;
    }

    /// Texture and uniforms together, for the per-frame upload.
    #[inline]
    pub fn stream_parts(&mut self) -> (&mut StreamingTexture<GpuTexture>, &mut ShaderUniforms) {
        (&mut self.texture, self.shader.uniforms_mut())
    }

    /// Draws the quad with `view_proj * model`. Nothing is drawn until a
    /// texture has been uploaded.
    pub fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, view_proj: Mat4) {
        let (Some(id), Some(desc)) = (self.texture.id(), self.texture.desc()) else { return };

        self.ensure_geometry(ctx);

        let mvp = view_proj * self.model;
        let uniforms = self.shader.uniforms_mut();
        uniforms.set_mvp(mvp);
        uniforms.set_texture_size(desc.width, desc.height);

        let Some(texture) = self.texture.texture() else { return };
        self.shader.prepare(ctx, id, texture);

        let Some(vbo) = self.vbo.as_ref() else { return };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("camquad video pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if !self.shader.bind(&mut rpass) {
            return;
        }
        rpass.set_vertex_buffer(0, vbo.slice(..));
        rpass.draw(0..6, 0..1);
    }

    fn ensure_geometry(&mut self, ctx: &RenderCtx<'_>) {
        if self.vbo.is_some() {
            return;
        }
        self.vbo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camquad video quad vbo"),
            contents: bytemuck::cast_slice(&quad_vertices(self.aspect)),
            usage: wgpu::BufferUsages::VERTEX,
        }));
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_is_twenty_bytes() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
        assert_eq!(QuadVertex::layout().array_stride, 20);
    }

    #[test]
    fn vertices_span_aspect_by_one() {
        let verts = quad_vertices(16.0 / 9.0);
        for v in &verts {
            assert!((v.position[0].abs() - 16.0 / 9.0).abs() < 1e-6);
            assert_eq!(v.position[1].abs(), 1.0);
            assert_eq!(v.position[2], 0.0);
        }
    }

    #[test]
    fn uv_origin_is_bottom_left() {
        let verts = quad_vertices(1.5);
        let bl = verts.iter().find(|v| v.uv == [0.0, 0.0]).unwrap();
        assert_eq!(bl.position, [-1.5, -1.0, 0.0]);
        let tr = verts.iter().find(|v| v.uv == [1.0, 1.0]).unwrap();
        assert_eq!(tr.position, [1.5, 1.0, 0.0]);
    }

    #[test]
    fn set_aspect_reports_changes_only() {
        let mut quad = VideoQuad::new(4.0 / 3.0);
        assert!(!quad.set_aspect(4.0 / 3.0));
        assert!(quad.set_aspect(16.0 / 9.0));
        assert!((quad.aspect() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_aspect_falls_back_to_square() {
        assert_eq!(VideoQuad::new(0.0).aspect(), 1.0);
        assert_eq!(VideoQuad::new(f32::NAN).aspect(), 1.0);
        assert_eq!(VideoQuad::new(-2.0).aspect(), 1.0);
    }
}
