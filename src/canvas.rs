use image::{Rgba, RgbaImage};

use crate::error::{EditorError, Result};
use crate::log_warn;
use crate::ops::transform::resample_box;

/// A pixel with zero alpha.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// COORDINATES & SELECTION
// ============================================================================

/// Pixel coordinate inside a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Pos {
    pub x: u32,
    pub y: u32,
}

impl Pos {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<(u32, u32)> for Pos {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// Rectangular selection with inclusive corners.
///
/// Built from any two opposite corners; min/max are taken on both axes so the
/// drag direction does not matter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionRect {
    min: Pos,
    max: Pos,
}

impl SelectionRect {
    pub fn from_corners(a: Pos, b: Pos) -> Self {
        Self {
            min: Pos::new(a.x.min(b.x), a.y.min(b.y)),
            max: Pos::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn min(&self) -> Pos {
        self.min
    }

    pub fn max(&self) -> Pos {
        self.max
    }

    pub fn width(&self) -> u32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> u32 {
        self.max.y - self.min.y + 1
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }
}

// ============================================================================
// PIXEL BUFFER - contiguous RGBA8 grid
// ============================================================================

/// Width×height grid of RGBA pixels.
///
/// Value type: cloning copies every pixel, so a buffer stored in history or
/// handed to a compositor can never be mutated through another owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Create a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self::new_filled(width, height, TRANSPARENT)
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let (width, height) = sanitize_dimensions(width, height);
        Self {
            image: RgbaImage::from_pixel(width, height, color),
        }
    }

    /// Wrap an existing image as-is.
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        if image.width() == 0 || image.height() == 0 {
            log_warn!("PixelBuffer: empty source image replaced by 1×1 transparent buffer");
            return Self::new(1, 1);
        }
        Self { image }
    }

    /// Build a buffer of exactly `width`×`height` from `image`, resampling
    /// with a box filter when the sizes differ.
    pub fn fitted(image: &RgbaImage, width: u32, height: u32) -> Self {
        let (width, height) = sanitize_dimensions(width, height);
        if image.width() == width && image.height() == height {
            return Self { image: image.clone() };
        }
        if image.width() == 0 || image.height() == 0 {
            return Self::new(width, height);
        }
        Self {
            image: resample_box(image, width, height),
        }
    }

    /// Build from tightly packed RGBA bytes.
    pub fn from_raw_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        let got = data.len();
        RgbaImage::from_raw(width, height, data)
            .filter(|img| img.width() > 0 && img.height() > 0)
            .map(|image| Self { image })
            .ok_or_else(|| {
                EditorError::Decode(format!(
                    "raw buffer holds {got} bytes, {width}×{height} RGBA needs {expected}"
                ))
            })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x < self.width() && pos.y < self.height()
    }

    /// `Ok(())` if `pos` lies inside the buffer.
    pub fn check_bounds(&self, pos: Pos) -> Result<()> {
        if self.contains(pos) {
            Ok(())
        } else {
            Err(EditorError::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.width(),
                height: self.height(),
            })
        }
    }

    pub fn get_pixel(&self, pos: Pos) -> Result<Rgba<u8>> {
        self.check_bounds(pos)?;
        Ok(*self.image.get_pixel(pos.x, pos.y))
    }

    pub fn set_pixel(&mut self, pos: Pos, color: Rgba<u8>) -> Result<()> {
        self.check_bounds(pos)?;
        self.image.put_pixel(pos.x, pos.y, color);
        Ok(())
    }

    /// Every coordinate in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = Pos> + use<> {
        let (w, h) = self.dimensions();
        (0..h).flat_map(move |y| (0..w).map(move |x| Pos::new(x, y)))
    }

    pub fn as_rgba_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_rgba_image(self) -> RgbaImage {
        self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.image.pixels().all(|p| p[3] == 0)
    }

    pub fn memory_bytes(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// Zero-sized buffers are not representable; clamp to 1×1.
fn sanitize_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        log_warn!("PixelBuffer: dimensions {}×{} clamped to 1×1", width, height);
        (1, 1)
    } else {
        (width, height)
    }
}

// ============================================================================
// COMPOSITING
// ============================================================================

/// Source-over blend of `top` onto `base` (straight alpha).
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    // Fully transparent top: nothing to blend
    if top[3] == 0 {
        return base;
    }
    // Fully opaque top: overwrite
    if top[3] == 255 {
        return top;
    }

    let base_a = base[3] as f32 / 255.0;
    let top_a = top[3] as f32 / 255.0;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return TRANSPARENT;
    }

    let channel = |i: usize| {
        let t = top[i] as f32 / 255.0;
        let b = base[i] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_transparent() {
        let buf = PixelBuffer::new(3, 2);
        assert_eq!(buf.dimensions(), (3, 2));
        assert!(buf.is_fully_transparent());
        assert_eq!(buf.as_raw().len(), 3 * 2 * 4);
    }

    #[test]
    fn zero_dimensions_clamp_to_one_pixel() {
        let buf = PixelBuffer::new(0, 5);
        assert_eq!(buf.dimensions(), (1, 1));
    }

    #[test]
    fn pixel_access_is_bounds_checked() {
        let mut buf = PixelBuffer::new(2, 2);
        buf.set_pixel(Pos::new(1, 1), Rgba([1, 2, 3, 4])).unwrap();
        assert_eq!(buf.get_pixel(Pos::new(1, 1)).unwrap(), Rgba([1, 2, 3, 4]));

        let err = buf.set_pixel(Pos::new(2, 0), Rgba([0, 0, 0, 255])).unwrap_err();
        assert!(matches!(
            err,
            EditorError::OutOfBounds { x: 2, y: 0, width: 2, height: 2 }
        ));
        assert!(buf.get_pixel(Pos::new(0, 7)).is_err());
    }

    #[test]
    fn coords_are_row_major() {
        let buf = PixelBuffer::new(2, 2);
        let coords: Vec<_> = buf.coords().collect();
        assert_eq!(
            coords,
            vec![Pos::new(0, 0), Pos::new(1, 0), Pos::new(0, 1), Pos::new(1, 1)]
        );
    }

    #[test]
    fn raw_length_mismatch_is_rejected() {
        assert!(PixelBuffer::from_raw_rgba(2, 2, vec![0; 15]).is_err());
        assert!(PixelBuffer::from_raw_rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn selection_corners_normalize() {
        let a = SelectionRect::from_corners(Pos::new(5, 1), Pos::new(2, 4));
        let b = SelectionRect::from_corners(Pos::new(2, 4), Pos::new(5, 1));
        assert_eq!(a, b);
        assert_eq!(a.min(), Pos::new(2, 1));
        assert_eq!(a.max(), Pos::new(5, 4));
        assert_eq!((a.width(), a.height()), (4, 4));
        assert!(a.contains(Pos::new(5, 4)));
        assert!(!a.contains(Pos::new(6, 4)));
    }

    #[test]
    fn blend_respects_alpha() {
        let green = Rgba([0, 255, 0, 255]);
        assert_eq!(blend_pixel(green, TRANSPARENT), green);
        assert_eq!(blend_pixel(green, Rgba([0, 0, 255, 255])), Rgba([0, 0, 255, 255]));
        assert_eq!(blend_pixel(TRANSPARENT, TRANSPARENT), TRANSPARENT);

        let half_red = Rgba([255, 0, 0, 128]);
        let out = blend_pixel(Rgba([0, 0, 0, 255]), half_red);
        assert_eq!(out[3], 255);
        assert!((out[0] as i32 - 128).abs() <= 1);

        // Semi-transparent over nothing keeps its own colour and alpha.
        assert_eq!(blend_pixel(TRANSPARENT, half_red), half_red);
    }
}
