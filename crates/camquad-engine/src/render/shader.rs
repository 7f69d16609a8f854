use std::collections::HashSet;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::render::{GpuTexture, RenderCtx, TextureId};

/// Named scalar parameters of a shader program.
pub trait UniformCarrier {
    fn set_int(&mut self, name: &str, value: i32);
    fn set_float(&mut self, name: &str, value: f32);
}

/// GPU layout of the video shader's uniform block (`shaders/video.wgsl`).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct VideoUniforms {
    pub mvp: [[f32; 4]; 4],
    pub tex_size: [f32; 2],
    pub translate: [f32; 2],
    /// Radians.
    pub rotation: f32,
    pub scale: f32,
    pub filter_mode: i32,
    pub pixel_size: i32,
}

impl Default for VideoUniforms {
    fn default() -> Self {
        Self {
            mvp: Mat4::IDENTITY.to_cols_array_2d(),
            tex_size: [1.0, 1.0],
            translate: [0.0, 0.0],
            rotation: 0.0,
            scale: 1.0,
            filter_mode: 0,
            pixel_size: 1,
        }
    }
}

/// CPU copy of the uniform block, addressable by uniform name.
///
/// Written during the frame, flushed to the GPU by [`VideoShader::prepare`].
#[derive(Debug, Default)]
pub struct ShaderUniforms {
    block: VideoUniforms,
    unknown: HashSet<String>,
}

impl ShaderUniforms {
    pub const FILTER_MODE: &'static str = "filterMode";
    pub const PIXEL_SIZE: &'static str = "pixelSize";
    pub const TRANSLATE_X: &'static str = "uTranslateX";
    pub const TRANSLATE_Y: &'static str = "uTranslateY";
    pub const ROTATION: &'static str = "uRotation";
    pub const SCALE: &'static str = "uScale";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mvp(&mut self, mvp: Mat4) {
        self.block.mvp = mvp.to_cols_array_2d();
    }

    pub fn set_texture_size(&mut self, width: u32, height: u32) {
        self.block.tex_size = [width.max(1) as f32, height.max(1) as f32];
    }

    #[inline]
    pub fn block(&self) -> &VideoUniforms {
        &self.block
    }

    #[inline]
    pub fn filter_mode(&self) -> i32 {
        self.block.filter_mode
    }

    #[inline]
    pub fn pixel_size(&self) -> i32 {
        self.block.pixel_size
    }

    #[inline]
    pub fn translate(&self) -> [f32; 2] {
        self.block.translate
    }

    #[inline]
    pub fn rotation(&self) -> f32 {
        self.block.rotation
    }

    #[inline]
    pub fn scale(&self) -> f32 {
        self.block.scale
    }

    fn ignore(&mut self, name: &str, kind: &str) {
        if self.unknown.insert(name.to_owned()) {
            log::debug!("video shader has no {kind} uniform named `{name}`; ignored");
        }
    }
}

impl UniformCarrier for ShaderUniforms {
    fn set_int(&mut self, name: &str, value: i32) {
        match name {
            Self::FILTER_MODE => self.block.filter_mode = value,
            Self::PIXEL_SIZE => self.block.pixel_size = value,
            _ => self.ignore(name, "int"),
        }
    }

    fn set_float(&mut self, name: &str, value: f32) {
        match name {
            Self::TRANSLATE_X => self.block.translate[0] = value,
            Self::TRANSLATE_Y => self.block.translate[1] = value,
            Self::ROTATION => self.block.rotation = value,
            Self::SCALE => self.block.scale = value,
            _ => self.ignore(name, "float"),
        }
    }
}

/// Textured, filterable video shader.
///
/// Bindings (group 0):
/// - 0: [`VideoUniforms`]
/// - 1: frame texture
/// - 2: linear clamp sampler
///
/// Pipeline objects are built lazily for the current surface format; the bind
/// group is rebuilt whenever the bound texture is reallocated.
#[derive(Default)]
pub struct VideoShader {
    pipeline_format: Option<wgpu::TextureFormat>,
    pipeline: Option<wgpu::RenderPipeline>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    sampler: Option<wgpu::Sampler>,
    ubo: Option<wgpu::Buffer>,
    bind_group: Option<(TextureId, wgpu::BindGroup)>,

    uniforms: ShaderUniforms,
}

impl VideoShader {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn uniforms_mut(&mut self) -> &mut ShaderUniforms {
        &mut self.uniforms
    }

    /// Uploads the uniform block and binds `texture`.
    ///
    /// Must run before [`bind`](Self::bind) each frame.
    pub fn prepare(&mut self, ctx: &RenderCtx<'_>, texture_id: TextureId, texture: &GpuTexture) {
        self.ensure_pipeline(ctx);
        self.ensure_buffers(ctx);
        self.ensure_bind_group(ctx, texture_id, texture);

        if let Some(ubo) = self.ubo.as_ref() {
            ctx.queue.write_buffer(ubo, 0, bytemuck::bytes_of(self.uniforms.block()));
        }
    }

    /// Sets pipeline and bindings on `rpass`. Returns `false` if not prepared.
    pub fn bind(&self, rpass: &mut wgpu::RenderPass<'_>) -> bool {
        let Some(pipeline) = self.pipeline.as_ref() else { return false };
        let Some((_, bind_group)) = self.bind_group.as_ref() else { return false };

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        true
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipeline_format == Some(ctx.surface_format) && self.pipeline.is_some() {
            return;
        }

        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("camquad video shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/video.wgsl").into()),
        });

        let bind_group_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camquad video bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<VideoUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("camquad video pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("camquad video pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[crate::render::QuadVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("video pipeline built for {:?}", ctx.surface_format);

        self.pipeline_format = Some(ctx.surface_format);
        self.pipeline = Some(pipeline);
        self.bind_group_layout = Some(bind_group_layout);
        self.bind_group = None;
    }

    fn ensure_buffers(&mut self, ctx: &RenderCtx<'_>) {
        if self.ubo.is_none() {
            self.ubo = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("camquad video ubo"),
                size: std::mem::size_of::<VideoUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        if self.sampler.is_none() {
            self.sampler = Some(ctx.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("camquad video sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }));
        }
    }

    fn ensure_bind_group(&mut self, ctx: &RenderCtx<'_>, texture_id: TextureId, texture: &GpuTexture) {
        if matches!(&self.bind_group, Some((id, _)) if *id == texture_id) {
            return;
        }
        let Some(bgl) = self.bind_group_layout.as_ref() else { return };
        let Some(ubo) = self.ubo.as_ref() else { return };
        let Some(sampler) = self.sampler.as_ref() else { return };

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camquad video bind group"),
            layout: bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        self.bind_group = Some((texture_id, bind_group));
    }
}
