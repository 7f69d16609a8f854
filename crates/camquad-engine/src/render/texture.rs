//! Streaming video texture.
//!
//! The allocation policy lives in [`StreamingTexture`]; the GPU calls live behind
//! [`TextureBackend`] so the policy can be exercised without a device.

use thiserror::Error;

/// Shape of a texture allocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl TextureDesc {
    #[inline]
    pub const fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self { width, height, format }
    }

    /// The video frame format: 8-bit sRGB RGBA.
    #[inline]
    pub const fn rgba8_srgb(width: u32, height: u32) -> Self {
        Self::new(width, height, wgpu::TextureFormat::Rgba8UnormSrgb)
    }

    /// Bytes per texel, or `None` for block-compressed / multi-planar formats.
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        if self.format.block_dimensions() != (1, 1) {
            return None;
        }
        self.format.block_copy_size(None)
    }

    /// Size of a tightly packed upload for this texture.
    pub fn byte_len(&self) -> usize {
        self.bytes_per_pixel().unwrap_or(0) as usize * self.width as usize * self.height as usize
    }
}

/// Identity of one allocation. A new id means the GPU resource was replaced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

#[derive(Debug, Error, PartialEq)]
pub enum TextureError {
    #[error("texture dimensions must be non-zero (got {width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    #[error("texture format {0:?} cannot be streamed from tightly packed rows")]
    UnsupportedFormat(wgpu::TextureFormat),

    #[error("failed to allocate {width}x{height} texture: {reason}")]
    AllocationFailed { width: u32, height: u32, reason: String },

    #[error("update of {got_width}x{got_height} does not match allocated {width}x{height} texture")]
    DimensionMismatch { width: u32, height: u32, got_width: u32, got_height: u32 },
}

/// GPU side of texture streaming.
///
/// `Texture` owns the resource: dropping it releases the GPU memory.
pub trait TextureBackend {
    type Texture;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture, TextureError>;

    /// Writes a full, tightly packed image into `texture` at origin (0, 0).
    fn write_texture(&mut self, texture: &Self::Texture, desc: &TextureDesc, pixels: &[u8]);
}

/// Result of [`StreamingTexture::ensure`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The existing allocation already matches.
    Reused,
    /// A new resource was created; `replaced` is true when an older one was dropped.
    Allocated { replaced: bool },
}

struct Allocation<T> {
    id: TextureId,
    desc: TextureDesc,
    texture: T,
}

/// A single streaming texture: allocated on first use, rewritten in place every
/// frame, reallocated only when the frame shape changes.
pub struct StreamingTexture<T> {
    current: Option<Allocation<T>>,
    allocations: u64,
}

impl<T> Default for StreamingTexture<T> {
    fn default() -> Self {
        Self {
            current: None,
            allocations: 0,
        }
    }
}

impl<T> StreamingTexture<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure a texture of exactly `desc` exists.
    ///
    /// Any change of width, height or format drops the old resource and creates
    /// a new one; a matching allocation is left untouched.
    pub fn ensure<B>(&mut self, backend: &mut B, desc: TextureDesc) -> Result<EnsureOutcome, TextureError>
    where
        B: TextureBackend<Texture = T>,
    {
        if desc.width == 0 || desc.height == 0 {
            return Err(TextureError::ZeroSize { width: desc.width, height: desc.height });
        }
        if desc.bytes_per_pixel().is_none() {
            return Err(TextureError::UnsupportedFormat(desc.format));
        }

        let replaced = match &self.current {
            Some(a) if a.desc == desc => return Ok(EnsureOutcome::Reused),
            Some(a) => {
                log::info!(
                    "video texture {}x{} -> {}x{}; reallocating",
                    a.desc.width, a.desc.height, desc.width, desc.height
                );
                true
            }
            None => {
                log::info!("allocating {}x{} video texture ({:?})", desc.width, desc.height, desc.format);
                false
            }
        };

        let texture = backend.create_texture(&desc)?;
        self.allocations += 1;

        // Assigning drops the previous allocation, releasing its GPU memory.
        self.current = Some(Allocation {
            id: TextureId(self.allocations),
            desc,
            texture,
        });

        Ok(EnsureOutcome::Allocated { replaced })
    }

    /// Replaces the texture contents in place.
    ///
    /// # Panics
    /// Panics if no texture has been allocated, or if `width`/`height` or the
    /// pixel count differ from the last [`ensure`](Self::ensure). Both are
    /// programming errors in the caller.
    pub fn update<B>(&mut self, backend: &mut B, width: u32, height: u32, pixels: &[u8])
    where
        B: TextureBackend<Texture = T>,
    {
        let Some(current) = &self.current else {
            panic!("StreamingTexture::update called before ensure");
        };

        let desc = current.desc;
        if width != desc.width || height != desc.height {
            panic!(
                "{}",
                TextureError::DimensionMismatch {
                    width: desc.width,
                    height: desc.height,
                    got_width: width,
                    got_height: height,
                }
            );
        }
        assert_eq!(
            pixels.len(),
            desc.byte_len(),
            "pixel buffer length does not match {}x{} {:?}",
            desc.width,
            desc.height,
            desc.format
        );

        backend.write_texture(&current.texture, &desc, pixels);
    }

    /// Drops the GPU resource. Returns `false` when nothing was allocated.
    pub fn release(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn id(&self) -> Option<TextureId> {
        self.current.as_ref().map(|a| a.id)
    }

    pub fn desc(&self) -> Option<TextureDesc> {
        self.current.as_ref().map(|a| a.desc)
    }

    pub fn texture(&self) -> Option<&T> {
        self.current.as_ref().map(|a| &a.texture)
    }

    /// Number of resources created over this buffer's lifetime.
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }
}

// ── wgpu backend ──────────────────────────────────────────────────────────

/// A wgpu texture together with its default view.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// [`TextureBackend`] over a wgpu device/queue pair.
pub struct WgpuTextures<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl<'a> WgpuTextures<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

impl TextureBackend for WgpuTextures<'_> {
    type Texture = GpuTexture;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<GpuTexture, TextureError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(TextureError::AllocationFailed {
                width: desc.width,
                height: desc.height,
                reason: format!("exceeds device limit of {max} texels per side"),
            });
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camquad video texture"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(GpuTexture { texture, view })
    }

    fn write_texture(&mut self, texture: &GpuTexture, desc: &TextureDesc, pixels: &[u8]) {
        let bpp = desc.bytes_per_pixel().unwrap_or(4);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * bpp),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const RGBA: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Counts live textures through a shared cell; dropping one decrements it.
    struct FakeTexture {
        live: Rc<Cell<i32>>,
    }

    impl Drop for FakeTexture {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        live: Rc<Cell<i32>>,
        created: Vec<TextureDesc>,
        writes: usize,
        fail_next: bool,
    }

    impl TextureBackend for FakeBackend {
        type Texture = FakeTexture;

        fn create_texture(&mut self, desc: &TextureDesc) -> Result<FakeTexture, TextureError> {
            if std::mem::take(&mut self.fail_next) {
                return Err(TextureError::AllocationFailed {
                    width: desc.width,
                    height: desc.height,
                    reason: "out of memory".into(),
                });
            }
            self.created.push(*desc);
            self.live.set(self.live.get() + 1);
            Ok(FakeTexture { live: self.live.clone() })
        }

        fn write_texture(&mut self, _texture: &FakeTexture, desc: &TextureDesc, pixels: &[u8]) {
            assert_eq!(pixels.len(), desc.byte_len());
            self.writes += 1;
        }
    }

    fn desc(w: u32, h: u32) -> TextureDesc {
        TextureDesc::new(w, h, RGBA)
    }

    // ── ensure ────────────────────────────────────────────────────────────

    #[test]
    fn first_ensure_allocates() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();

        let out = tex.ensure(&mut backend, desc(64, 32)).unwrap();

        assert_eq!(out, EnsureOutcome::Allocated { replaced: false });
        assert_eq!(backend.created, vec![desc(64, 32)]);
        assert_eq!(tex.desc(), Some(desc(64, 32)));
    }

    #[test]
    fn matching_ensure_reuses_allocation() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        tex.ensure(&mut backend, desc(64, 32)).unwrap();
        let id = tex.id();

        assert_eq!(tex.ensure(&mut backend, desc(64, 32)).unwrap(), EnsureOutcome::Reused);
        assert_eq!(tex.id(), id);
        assert_eq!(backend.created.len(), 1);
    }

    #[test]
    fn size_change_reallocates_and_drops_old_resource() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        tex.ensure(&mut backend, desc(64, 32)).unwrap();
        let first = tex.id();

        let out = tex.ensure(&mut backend, desc(32, 64)).unwrap();

        assert_eq!(out, EnsureOutcome::Allocated { replaced: true });
        assert_ne!(tex.id(), first);
        assert_eq!(backend.live.get(), 1);
        assert_eq!(tex.allocation_count(), 2);
    }

    #[test]
    fn format_change_reallocates() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        tex.ensure(&mut backend, desc(8, 8)).unwrap();

        let bgra = TextureDesc::new(8, 8, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(
            tex.ensure(&mut backend, bgra).unwrap(),
            EnsureOutcome::Allocated { replaced: true }
        );
    }

    #[test]
    fn zero_size_is_rejected() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        assert_eq!(
            tex.ensure(&mut backend, desc(0, 720)),
            Err(TextureError::ZeroSize { width: 0, height: 720 })
        );
        assert!(backend.created.is_empty());
    }

    #[test]
    fn allocation_failure_keeps_previous_texture() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        tex.ensure(&mut backend, desc(8, 8)).unwrap();
        let id = tex.id();

        backend.fail_next = true;
        let err = tex.ensure(&mut backend, desc(16, 16)).unwrap_err();

        assert!(matches!(err, TextureError::AllocationFailed { .. }));
        assert_eq!(tex.id(), id);
        assert_eq!(tex.desc(), Some(desc(8, 8)));
    }

    // ── update ────────────────────────────────────────────────────────────

    #[test]
    fn update_with_matching_dimensions_never_reallocates() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        tex.ensure(&mut backend, desc(4, 2)).unwrap();
        let id = tex.id();
        let pixels = vec![0u8; 4 * 2 * 4];

        for _ in 0..10 {
            tex.ensure(&mut backend, desc(4, 2)).unwrap();
            tex.update(&mut backend, 4, 2, &pixels);
        }

        assert_eq!(tex.id(), id);
        assert_eq!(backend.created.len(), 1);
        assert_eq!(backend.writes, 10);
    }

    #[test]
    #[should_panic(expected = "does not match allocated 4x2")]
    fn update_with_swapped_dimensions_panics() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        tex.ensure(&mut backend, desc(4, 2)).unwrap();
        tex.update(&mut backend, 2, 4, &[0u8; 32]);
    }

    #[test]
    #[should_panic(expected = "pixel buffer length")]
    fn update_with_short_buffer_panics() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        tex.ensure(&mut backend, desc(4, 2)).unwrap();
        tex.update(&mut backend, 4, 2, &[0u8; 31]);
    }

    #[test]
    #[should_panic(expected = "before ensure")]
    fn update_before_ensure_panics() {
        let mut backend = FakeBackend::default();
        let mut tex: StreamingTexture<FakeTexture> = StreamingTexture::new();
        tex.update(&mut backend, 1, 1, &[0u8; 4]);
    }

    // ── release ───────────────────────────────────────────────────────────

    #[test]
    fn release_drops_resource_exactly_once() {
        let mut backend = FakeBackend::default();
        let mut tex = StreamingTexture::new();
        tex.ensure(&mut backend, desc(8, 8)).unwrap();

        assert!(tex.release());
        assert_eq!(backend.live.get(), 0);
        assert!(!tex.release());
        assert_eq!(backend.live.get(), 0);
        assert_eq!(tex.id(), None);
    }

    #[test]
    fn dropping_the_buffer_releases_resource() {
        let mut backend = FakeBackend::default();
        {
            let mut tex = StreamingTexture::new();
            tex.ensure(&mut backend, desc(8, 8)).unwrap();
            assert_eq!(backend.live.get(), 1);
        }
        assert_eq!(backend.live.get(), 0);
    }

    #[test]
    fn byte_len_for_rgba() {
        assert_eq!(desc(1280, 720).byte_len(), 1280 * 720 * 4);
    }
}
