//! Frame model.
//!
//! Frames are stored top row first, tightly packed, 8 bits per channel.

use std::ops::Deref;

use crate::error::FrameError;

/// Channel order of a frame buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
}

impl PixelLayout {
    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }

    /// Byte offsets of red, green and blue within one pixel.
    #[inline]
    pub const fn rgb_offsets(self) -> [usize; 3] {
        match self {
            Self::Rgb8 | Self::Rgba8 => [0, 1, 2],
            Self::Bgr8 | Self::Bgra8 => [2, 1, 0],
        }
    }

    #[inline]
    pub const fn alpha_offset(self) -> Option<usize> {
        match self {
            Self::Rgba8 | Self::Bgra8 => Some(3),
            Self::Rgb8 | Self::Bgr8 => None,
        }
    }
}

/// One captured image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(FrameError::LengthMismatch { width, height, expected, got: data.len() });
        }
        Ok(Self { width, height, layout, data })
    }

    /// A frame filled with `pixel` (one value per channel).
    pub fn filled(width: u32, height: u32, layout: PixelLayout, pixel: &[u8]) -> Self {
        assert_eq!(pixel.len(), layout.channels(), "pixel does not match layout {layout:?}");
        let data = pixel.repeat(width as usize * height as usize);
        Self { width, height, layout, data }
    }

    pub fn empty(layout: PixelLayout) -> Self {
        Self { width: 0, height: 0, layout, data: Vec::new() }
    }

    /// Zero width or zero height.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Channels of the pixel at `(x, y)`, `y = 0` being the top row.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels();
        let i = y as usize * self.stride() + x as usize * c;
        &self.data[i..i + c]
    }

    pub(crate) fn swap_data(&mut self, other: &mut Vec<u8>) {
        std::mem::swap(&mut self.data, other);
    }
}

/// A frame after CPU processing. Same shape as the frame it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFrame(RawFrame);

impl ProcessedFrame {
    pub fn into_inner(self) -> RawFrame {
        self.0
    }
}

impl From<RawFrame> for ProcessedFrame {
    fn from(frame: RawFrame) -> Self {
        Self(frame)
    }
}

impl Deref for ProcessedFrame {
    type Target = RawFrame;

    fn deref(&self) -> &RawFrame {
        &self.0
    }
}

/// Converts frames to the texture convention: RGBA8, bottom row first.
///
/// The output buffer is retained, so steady-state normalization does not allocate.
#[derive(Debug, Default)]
pub struct FrameNormalizer {
    out: Vec<u8>,
}

impl FrameNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, frame: &RawFrame) -> &[u8] {
        let w = frame.width() as usize;
        let h = frame.height() as usize;
        let c = frame.channels();
        let [ri, gi, bi] = frame.layout().rgb_offsets();
        let ai = frame.layout().alpha_offset();

        self.out.resize(w * h * 4, 0);
        if w == 0 || h == 0 {
            return &self.out;
        }

        let src = frame.data();
        for (dst_row, src_row) in self.out.chunks_exact_mut(w * 4).zip(src.chunks_exact(w * c).rev()) {
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(c)) {
                d[0] = s[ri];
                d[1] = s[gi];
                d[2] = s[bi];
                d[3] = ai.map_or(u8::MAX, |a| s[a]);
            }
        }
        &self.out
    }
}
