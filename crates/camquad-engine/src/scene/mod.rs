//! Scene graph.
//!
//! A flat list of renderable objects drawn in insertion order with one shared
//! view/projection. The object set is closed (see [`SceneObject`]).

mod camera;

pub use camera::Camera;

use glam::Mat4;

use crate::render::{RenderCtx, RenderTarget, VideoQuad};

/// Anything the scene can hold.
pub enum SceneObject {
    /// Transform-only anchor; draws nothing.
    Empty { model: Mat4 },
    Quad(VideoQuad),
}

impl SceneObject {
    pub fn empty() -> Self {
        Self::Empty { model: Mat4::IDENTITY }
    }

    pub fn model(&self) -> Mat4 {
        match self {
            Self::Empty { model } => *model,
            Self::Quad(quad) => quad.model(),
        }
    }

    fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, view_proj: Mat4) {
        match self {
            Self::Empty { .. } => {}
            Self::Quad(quad) => quad.render(ctx, target, view_proj),
        }
    }
}

/// Index of an object inside its [`Scene`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

#[derive(Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    /// The video quad stored under `id`, if that object is one.
    pub fn video_quad_mut(&mut self, id: ObjectId) -> Option<&mut VideoQuad> {
        match self.objects.get_mut(id.0)? {
            SceneObject::Quad(quad) => Some(quad),
            SceneObject::Empty { .. } => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Draws every object with `camera`, using the viewport aspect.
    pub fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, camera: &Camera) {
        let view_proj = camera.view_projection(ctx.viewport.aspect());
        for object in &mut self.objects {
            object.render(ctx, target, view_proj);
        }
    }
}
