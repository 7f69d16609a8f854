//! CPU filters and the CPU affine transform.

use crate::frame::{ProcessedFrame, RawFrame};
use crate::state::{FilterMode, TransformState};

/// Q14 BT.601 luma weights; they sum to `1 << 14`.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// CPU processing path: filter, then transform.
///
/// Keeps one scratch buffer for the resampling pass; after the first frame of a
/// given size, `apply` does not allocate.
#[derive(Debug)]
pub struct FilterEngine {
    tile_size: u32,
    scratch: Vec<u8>,
    invocations: u64,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TILE_SIZE)
    }
}

impl FilterEngine {
    pub const DEFAULT_TILE_SIZE: u32 = 10;

    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size: tile_size.max(1),
            scratch: Vec::new(),
            invocations: 0,
        }
    }

    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Number of `apply` calls so far.
    #[inline]
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Applies `filter` and then `transform` to `frame`.
    ///
    /// Empty frames are returned untouched.
    pub fn apply(&mut self, mut frame: RawFrame, filter: FilterMode, transform: &TransformState) -> ProcessedFrame {
        self.invocations += 1;
        if frame.is_empty() {
            return frame.into();
        }

        match filter {
            FilterMode::None => {}
            FilterMode::Pixelate => pixelate(&mut frame, self.tile_size),
            FilterMode::Grayscale => grayscale(&mut frame),
        }

        if !transform.is_identity() {
            self.warp(&mut frame, transform);
        }

        frame.into()
    }

    /// Single bilinear pass of the affine map into the scratch buffer, which is
    /// then swapped with the frame's storage.
    fn warp(&mut self, frame: &mut RawFrame, transform: &TransformState) {
        let map = InverseAffine::new(frame.width(), frame.height(), transform);
        let w = frame.width() as usize;
        let c = frame.channels();

        self.scratch.resize(frame.data().len(), 0);
        let src = frame.data();

        for (y, row) in self.scratch.chunks_exact_mut(w * c).enumerate() {
            for (x, px) in row.chunks_exact_mut(c).enumerate() {
                let (sx, sy) = map.source(x as f32, y as f32);
                sample_bilinear(frame, src, sx, sy, px);
            }
        }

        frame.swap_data(&mut self.scratch);
    }
}

/// Replaces every tile with its per-channel mean (rounded half up).
///
/// Tiles start at the top-left corner; tiles on the right and bottom edges are
/// clipped to the frame and average only their in-bounds pixels.
pub fn pixelate(frame: &mut RawFrame, tile_size: u32) {
    let tile = tile_size.max(1) as usize;
    if tile == 1 || frame.is_empty() {
        return;
    }

    let w = frame.width() as usize;
    let h = frame.height() as usize;
    let c = frame.channels();
    let stride = frame.stride();
    let data = frame.data_mut();

    for y0 in (0..h).step_by(tile) {
        let y1 = (y0 + tile).min(h);
        for x0 in (0..w).step_by(tile) {
            let x1 = (x0 + tile).min(w);

            let mut sums = [0u64; 4];
            for y in y0..y1 {
                let row = &data[y * stride + x0 * c..y * stride + x1 * c];
                for px in row.chunks_exact(c) {
                    for (sum, &v) in sums.iter_mut().zip(px) {
                        *sum += u64::from(v);
                    }
                }
            }

            let count = ((y1 - y0) * (x1 - x0)) as u64;
            let mut mean = [0u8; 4];
            for (m, sum) in mean.iter_mut().zip(sums) {
                *m = ((sum + count / 2) / count) as u8;
            }

            for y in y0..y1 {
                let row = &mut data[y * stride + x0 * c..y * stride + x1 * c];
                for px in row.chunks_exact_mut(c) {
                    px.copy_from_slice(&mean[..c]);
                }
            }
        }
    }
}

/// Replaces the colour channels with BT.601 luma. Alpha is left alone.
pub fn grayscale(frame: &mut RawFrame) {
    let [ri, gi, bi] = frame.layout().rgb_offsets();
    let c = frame.channels();

    for px in frame.data_mut().chunks_exact_mut(c) {
        let y = (u32::from(px[ri]) * LUMA_R
            + u32::from(px[gi]) * LUMA_G
            + u32::from(px[bi]) * LUMA_B
            + (1 << (LUMA_SHIFT - 1)))
            >> LUMA_SHIFT;
        let y = y.min(255) as u8;
        px[ri] = y;
        px[gi] = y;
        px[bi] = y;
    }
}

/// Destination-to-source mapping of the transform in image coordinates (y down).
///
/// Forward map: `[[a, b], [-b, a]] * p + t` with `a = s·cosθ`, `b = s·sinθ`,
/// rotating about the frame centre, then offset by `(tx·w/2, -ty·h/2)`.
#[derive(Debug, Copy, Clone)]
struct InverseAffine {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
    inv_det: f32,
}

impl InverseAffine {
    fn new(width: u32, height: u32, t: &TransformState) -> Self {
        let w = width as f32;
        let h = height as f32;
        let cx = w / 2.0;
        let cy = h / 2.0;

        let (sin, cos) = t.rotation().to_radians().sin_cos();
        let a = t.scale() * cos;
        let b = t.scale() * sin;

        let tx = (1.0 - a) * cx - b * cy + t.translation().x * w / 2.0;
        let ty = b * cx + (1.0 - a) * cy - t.translation().y * h / 2.0;

        Self { a, b, tx, ty, inv_det: 1.0 / (a * a + b * b) }
    }

    #[inline]
    fn source(&self, x: f32, y: f32) -> (f32, f32) {
        let dx = x - self.tx;
        let dy = y - self.ty;
        (
            (self.a * dx - self.b * dy) * self.inv_det,
            (self.b * dx + self.a * dy) * self.inv_det,
        )
    }
}

/// Bilinear sample at `(sx, sy)`; taps outside the frame read as zero.
#[inline]
fn sample_bilinear(frame: &RawFrame, src: &[u8], sx: f32, sy: f32, out: &mut [u8]) {
    let w = frame.width() as i64;
    let h = frame.height() as i64;
    let c = out.len();

    let x0f = sx.floor();
    let y0f = sy.floor();
    let fx = sx - x0f;
    let fy = sy - y0f;
    let x0 = x0f as i64;
    let y0 = y0f as i64;

    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        out.fill(0);
        return;
    }

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f32; 4];
    for (x, y, weight) in taps {
        if x < 0 || y < 0 || x >= w || y >= h || weight == 0.0 {
            continue;
        }
        let i = (y as usize * w as usize + x as usize) * c;
        for (a, &v) in acc.iter_mut().zip(&src[i..i + c]) {
            *a += weight * f32::from(v);
        }
    }

    for (o, a) in out.iter_mut().zip(acc) {
        *o = a.round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelLayout;
    use glam::Vec2;
    use proptest::prelude::*;

    /// Deterministic non-uniform test image.
    fn pattern(w: u32, h: u32, layout: PixelLayout) -> RawFrame {
        let c = layout.channels();
        let mut data = Vec::with_capacity(w as usize * h as usize * c);
        for y in 0..h {
            for x in 0..w {
                for k in 0..c {
                    data.push(((x * 7 + y * 13 + k as u32 * 31) % 251) as u8);
                }
            }
        }
        RawFrame::new(w, h, layout, data).unwrap()
    }

    fn tile_mean(frame: &RawFrame, x0: u32, y0: u32, tile: u32) -> Vec<u8> {
        let x1 = (x0 + tile).min(frame.width());
        let y1 = (y0 + tile).min(frame.height());
        let c = frame.channels();
        let mut sums = vec![0u64; c];
        for y in y0..y1 {
            for x in x0..x1 {
                for (s, &v) in sums.iter_mut().zip(frame.pixel(x, y)) {
                    *s += v as u64;
                }
            }
        }
        let n = ((x1 - x0) * (y1 - y0)) as u64;
        sums.into_iter().map(|s| ((s + n / 2) / n) as u8).collect()
    }

    // ── pixelate ──────────────────────────────────────────────────────────

    #[test]
    fn pixelate_sets_every_pixel_to_its_tile_mean() {
        let original = pattern(40, 30, PixelLayout::Bgr8);
        let mut frame = original.clone();
        pixelate(&mut frame, 10);

        for y in 0..30 {
            for x in 0..40 {
                let expected = tile_mean(&original, x / 10 * 10, y / 10 * 10, 10);
                assert_eq!(frame.pixel(x, y), expected.as_slice(), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn pixelate_720p_gives_uniform_ten_pixel_blocks() {
        let mut engine = FilterEngine::new(10);
        let frame = pattern(1280, 720, PixelLayout::Bgr8);
        let out = engine.apply(frame, FilterMode::Pixelate, &TransformState::default());

        for by in (0..720).step_by(10) {
            for bx in (0..1280).step_by(10) {
                let first = out.pixel(bx, by).to_vec();
                for y in by..by + 10 {
                    for x in bx..bx + 10 {
                        assert_eq!(out.pixel(x, y), first.as_slice());
                    }
                }
            }
        }
        assert_ne!(out.pixel(0, 0), out.pixel(10, 0));
    }

    #[test]
    fn pixelate_edge_tiles_average_in_bounds_pixels_only() {
        let original = pattern(15, 12, PixelLayout::Rgb8);
        let mut frame = original.clone();
        pixelate(&mut frame, 10);

        assert_eq!(frame.pixel(14, 11), tile_mean(&original, 10, 10, 10).as_slice());
        assert_eq!(frame.pixel(12, 3), tile_mean(&original, 10, 0, 10).as_slice());
    }

    #[test]
    fn pixelate_rounds_half_up() {
        let mut frame = RawFrame::new(2, 1, PixelLayout::Rgb8, vec![0, 0, 0, 1, 1, 1]).unwrap();
        pixelate(&mut frame, 2);
        assert_eq!(frame.data(), &[1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn pixelate_tile_of_one_is_no_op() {
        let original = pattern(8, 8, PixelLayout::Rgba8);
        let mut frame = original.clone();
        pixelate(&mut frame, 1);
        assert_eq!(frame, original);
    }

    // ── grayscale ─────────────────────────────────────────────────────────

    #[test]
    fn grayscale_uses_fixed_point_luma() {
        // (255·4899 + 8192) >> 14 == 76
        let mut red_bgr = RawFrame::new(1, 1, PixelLayout::Bgr8, vec![0, 0, 255]).unwrap();
        grayscale(&mut red_bgr);
        assert_eq!(red_bgr.data(), &[76, 76, 76]);

        let mut red_rgb = RawFrame::new(1, 1, PixelLayout::Rgb8, vec![255, 0, 0]).unwrap();
        grayscale(&mut red_rgb);
        assert_eq!(red_rgb.data(), &[76, 76, 76]);

        let mut white = RawFrame::filled(1, 1, PixelLayout::Rgb8, &[255, 255, 255]);
        grayscale(&mut white);
        assert_eq!(white.data(), &[255, 255, 255]);
    }

    #[test]
    fn grayscale_leaves_alpha() {
        let mut frame = RawFrame::new(1, 1, PixelLayout::Bgra8, vec![10, 200, 30, 77]).unwrap();
        grayscale(&mut frame);
        assert_eq!(frame.data()[3], 77);
    }

    // ── apply ─────────────────────────────────────────────────────────────

    #[test]
    fn identity_transform_and_no_filter_is_no_op() {
        let mut engine = FilterEngine::default();
        let frame = pattern(33, 17, PixelLayout::Bgr8);
        let out = engine.apply(frame.clone(), FilterMode::None, &TransformState::default());
        assert_eq!(out.into_inner(), frame);
        assert_eq!(engine.invocations(), 1);
    }

    #[test]
    fn empty_frame_passes_through() {
        let mut engine = FilterEngine::default();
        let t = TransformState::new(Vec2::new(0.5, 0.5), 30.0, 2.0);
        let out = engine.apply(RawFrame::empty(PixelLayout::Bgr8), FilterMode::Pixelate, &t);
        assert!(out.is_empty());
    }

    #[test]
    fn positive_tx_shifts_right_by_half_width_per_unit() {
        let mut engine = FilterEngine::default();
        let frame = pattern(8, 4, PixelLayout::Rgb8);
        let t = TransformState::new(Vec2::new(0.5, 0.0), 0.0, 1.0);
        let out = engine.apply(frame.clone(), FilterMode::None, &t);

        for y in 0..4 {
            assert_eq!(out.pixel(0, y), &[0, 0, 0]);
            assert_eq!(out.pixel(1, y), &[0, 0, 0]);
            for x in 2..8 {
                assert_eq!(out.pixel(x, y), frame.pixel(x - 2, y));
            }
        }
    }

    #[test]
    fn positive_ty_shifts_up() {
        let mut engine = FilterEngine::default();
        let frame = pattern(4, 4, PixelLayout::Rgb8);
        let t = TransformState::new(Vec2::new(0.0, 1.0), 0.0, 1.0);
        let out = engine.apply(frame.clone(), FilterMode::None, &t);

        assert_eq!(out.pixel(1, 0), frame.pixel(1, 2));
        assert_eq!(out.pixel(1, 1), frame.pixel(1, 3));
        assert_eq!(out.pixel(1, 2), &[0, 0, 0]);
        assert_eq!(out.pixel(1, 3), &[0, 0, 0]);
    }

    #[test]
    fn shrinking_leaves_a_black_border() {
        let mut engine = FilterEngine::default();
        let frame = pattern(8, 8, PixelLayout::Rgb8);
        let t = TransformState::new(Vec2::ZERO, 0.0, 0.5);
        let out = engine.apply(frame.clone(), FilterMode::None, &t);

        assert_eq!(out.pixel(0, 0), &[0, 0, 0]);
        assert_eq!(out.pixel(4, 4), frame.pixel(4, 4));
    }

    #[test]
    fn warp_reuses_scratch_storage() {
        let mut engine = FilterEngine::default();
        let t = TransformState::new(Vec2::new(0.1, 0.0), 10.0, 1.2);

        let first = engine.apply(pattern(16, 16, PixelLayout::Rgb8), FilterMode::None, &t);
        let recycled = first.into_inner().into_data();
        let ptr = recycled.as_ptr();

        // Feed the returned buffer back in; its storage ends up as the next scratch.
        let frame = RawFrame::new(16, 16, PixelLayout::Rgb8, recycled).unwrap();
        let second = engine.apply(frame, FilterMode::None, &t);
        assert_ne!(second.data().as_ptr(), ptr);
        assert_eq!(engine.scratch.as_ptr(), ptr);
    }

    proptest! {
        #[test]
        fn grayscale_is_idempotent(data in prop::collection::vec(any::<u8>(), 4 * 3 * 5)) {
            let mut once = RawFrame::new(4, 5, PixelLayout::Bgr8, data).unwrap();
            grayscale(&mut once);
            let mut twice = once.clone();
            grayscale(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn pixelate_is_idempotent(
            data in prop::collection::vec(any::<u8>(), 13 * 7 * 4),
            tile in 1u32..9,
        ) {
            let mut once = RawFrame::new(13, 7, PixelLayout::Rgba8, data).unwrap();
            pixelate(&mut once, tile);
            let mut twice = once.clone();
            pixelate(&mut twice, tile);
            prop_assert_eq!(once, twice);
        }
    }
}
