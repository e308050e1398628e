// ============================================================================
// CANVAS-LEVEL OPERATIONS - merge two buffers / composite a layer stack
// ============================================================================

use rayon::prelude::*;

use crate::canvas::{PixelBuffer, blend_pixel};

/// Source-over composite of `top` onto `bottom`, `top` anchored at (0, 0).
///
/// The result always has `bottom`'s dimensions; any part of `top` outside it
/// is ignored.
pub fn merge(top: &PixelBuffer, bottom: &PixelBuffer) -> PixelBuffer {
    let mut out = bottom.as_rgba_image().clone();
    let top_img = top.as_rgba_image();
    let overlap_w = top.width().min(bottom.width());
    let overlap_h = top.height().min(bottom.height()) as usize;
    let out_stride = bottom.width() as usize * 4;

    out.par_chunks_mut(out_stride)
        .take(overlap_h)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..overlap_w {
                let o = x as usize * 4;
                let base = image::Rgba([row[o], row[o + 1], row[o + 2], row[o + 3]]);
                let blended = blend_pixel(base, *top_img.get_pixel(x, y as u32));
                row[o..o + 4].copy_from_slice(&blended.0);
            }
        });

    PixelBuffer::from_rgba_image(out)
}

/// Flatten a stack given top-first (index 0 = topmost).
///
/// Folds from the bottom up; `None` when the stack is empty.
pub fn composite_stack<'a, I>(top_first: I) -> Option<PixelBuffer>
where
    I: IntoIterator<Item = &'a PixelBuffer>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut bottom_up = top_first.into_iter().rev();
    let first = bottom_up.next()?.clone();
    Some(bottom_up.fold(first, |acc, upper| merge(upper, &acc)))
}
