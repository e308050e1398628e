// ============================================================================
// TRANSFORM OPERATIONS - flip, rotate, crop, resample
// ============================================================================
//
// Every function here is pure: it reads a buffer and returns a new one.
// History recording is the layer's job.

use image::{RgbaImage, imageops};
use rayon::prelude::*;

use crate::canvas::{PixelBuffer, SelectionRect};
use crate::error::Result;

/// Mirror top↔bottom.
pub fn flip_vertical(src: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::from_rgba_image(imageops::flip_vertical(src.as_rgba_image()))
}

/// Mirror left↔right.
pub fn flip_horizontal(src: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::from_rgba_image(imageops::flip_horizontal(src.as_rgba_image()))
}

/// Rotate 90° counter-clockwise, then resample back to the source size.
///
/// For non-square buffers the rotated image has swapped dimensions and is
/// stretched back into the original width×height, which loses detail.
pub fn rotate_left(src: &PixelBuffer) -> PixelBuffer {
    let rotated = imageops::rotate270(src.as_rgba_image());
    PixelBuffer::fitted(&rotated, src.width(), src.height())
}

/// Rotate 90° clockwise, then resample back to the source size.
pub fn rotate_right(src: &PixelBuffer) -> PixelBuffer {
    let rotated = imageops::rotate90(src.as_rgba_image());
    PixelBuffer::fitted(&rotated, src.width(), src.height())
}

/// Copy out the (inclusive) rectangle `rect`.
pub fn crop(src: &PixelBuffer, rect: &SelectionRect) -> Result<PixelBuffer> {
    src.check_bounds(rect.min())?;
    src.check_bounds(rect.max())?;
    let min = rect.min();
    let cropped =
        imageops::crop_imm(src.as_rgba_image(), min.x, min.y, rect.width(), rect.height()).to_image();
    Ok(PixelBuffer::from_rgba_image(cropped))
}

/// Area-average (box filter) resample to `new_w`×`new_h`.
///
/// Each destination pixel averages the source pixels its footprint covers;
/// when upscaling the footprint shrinks to the single nearest source pixel.
/// Colour is averaged weighted by alpha so transparent pixels do not darken
/// their neighbours.
pub fn resample_box(src: &RgbaImage, new_w: u32, new_h: u32) -> RgbaImage {
    let (sw, sh) = src.dimensions();
    if (sw, sh) == (new_w, new_h) {
        return src.clone();
    }
    let new_w = new_w.max(1);
    let new_h = new_h.max(1);
    let src_raw = src.as_raw();
    let src_stride = sw as usize * 4;
    let dst_stride = new_w as usize * 4;
    let mut dst_raw = vec![0u8; dst_stride * new_h as usize];

    // Source span [start, end) covered by destination index `d`.
    let span = |d: u32, src_len: u32, dst_len: u32| -> (usize, usize) {
        let start = (d as u64 * src_len as u64 / dst_len as u64) as usize;
        let end = ((d as u64 + 1) * src_len as u64).div_ceil(dst_len as u64) as usize;
        (start, end.max(start + 1).min(src_len as usize))
    };

    dst_raw.par_chunks_mut(dst_stride).enumerate().for_each(|(dy, row_out)| {
        let (y0, y1) = span(dy as u32, sh, new_h);
        for dx in 0..new_w {
            let (x0, x1) = span(dx, sw, new_w);
            let mut acc = [0u64; 4];
            let mut count = 0u64;
            for sy in y0..y1 {
                let row = &src_raw[sy * src_stride..(sy + 1) * src_stride];
                for sx in x0..x1 {
                    let o = sx * 4;
                    let a = row[o + 3] as u64;
                    acc[0] += row[o] as u64 * a;
                    acc[1] += row[o + 1] as u64 * a;
                    acc[2] += row[o + 2] as u64 * a;
                    acc[3] += a;
                    count += 1;
                }
            }
            let o = dx as usize * 4;
            if acc[3] > 0 {
                row_out[o] = ((acc[0] + acc[3] / 2) / acc[3]) as u8;
                row_out[o + 1] = ((acc[1] + acc[3] / 2) / acc[3]) as u8;
                row_out[o + 2] = ((acc[2] + acc[3] / 2) / acc[3]) as u8;
                row_out[o + 3] = ((acc[3] + count / 2) / count) as u8;
            }
        }
    });

    RgbaImage::from_raw(new_w, new_h, dst_raw).unwrap_or_else(|| RgbaImage::new(new_w, new_h))
}
