// ============================================================================
// ADJUSTMENT OPERATIONS - per-pixel colour transforms
// ============================================================================
//
// Rows are processed in parallel via rayon.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::PixelBuffer;

// ============================================================================
// HELPER: per-pixel transform
// ============================================================================

/// Apply a per-pixel transform to a copy of `src`.
/// `transform` receives `[r, g, b, a]` and returns the replacement pixel.
pub fn apply_pixel_transform<F>(src: &PixelBuffer, transform: F) -> PixelBuffer
where
    F: Fn([u8; 4]) -> [u8; 4] + Sync,
{
    let (w, h) = src.dimensions();
    let stride = w as usize * 4;
    let src_raw = src.as_raw();
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for (px_in, px_out) in row_in.chunks_exact(4).zip(row_out.chunks_exact_mut(4)) {
            let out = transform([px_in[0], px_in[1], px_in[2], px_in[3]]);
            px_out.copy_from_slice(&out);
        }
    });

    match RgbaImage::from_raw(w, h, dst_raw) {
        Some(img) => PixelBuffer::from_rgba_image(img),
        None => src.clone(),
    }
}

// ============================================================================
// INSTANT OPERATIONS
// ============================================================================

/// Invert all color channels (R, G, B). Alpha is preserved.
pub fn invert(src: &PixelBuffer) -> PixelBuffer {
    apply_pixel_transform(src, |[r, g, b, a]| [255 - r, 255 - g, 255 - b, a])
}

/// ITU-R 601-2 luma, the same weights a classic "L" conversion uses.
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

/// Replace every pixel with its luminance on all three colour channels.
///
/// The result is fully opaque: it is a three-channel luminance image loaded
/// back into an RGBA layer.
pub fn grayscale(src: &PixelBuffer) -> PixelBuffer {
    apply_pixel_transform(src, |[r, g, b, _]| {
        let l = luminance(r, g, b);
        [l, l, l, 255]
    })
}
