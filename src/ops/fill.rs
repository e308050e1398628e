// ============================================================================
// FLOOD FILL - 4-connected, exact colour match
// ============================================================================

use image::Rgba;

use crate::canvas::{PixelBuffer, Pos};
use crate::error::Result;

/// Fill the 4-connected region around `origin` that shares the origin's
/// colour with `color`.
///
/// Uses an explicit stack over flat indices with a visited mask, so every
/// pixel of the region is pushed and painted exactly once.
pub fn flood_fill(src: &PixelBuffer, origin: Pos, color: Rgba<u8>) -> Result<PixelBuffer> {
    let target = src.get_pixel(origin)?;
    let mut out = src.clone();
    if target == color {
        return Ok(out);
    }

    let (w, h) = src.dimensions();
    let wu = w as usize;
    let flat = src.as_raw();

    #[inline(always)]
    fn pix(flat: &[u8], idx: usize) -> [u8; 4] {
        let o = idx * 4;
        [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
    }

    let tc = target.0;
    let mut visited = vec![false; wu * h as usize];
    let seed = origin.y as usize * wu + origin.x as usize;
    visited[seed] = true;
    let mut stack: Vec<usize> = vec![seed];

    while let Some(idx) = stack.pop() {
        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        out.set_pixel(Pos::new(x, y), color)?;

        let mut visit = |ni: usize| {
            if !visited[ni] && pix(flat, ni) == tc {
                visited[ni] = true;
                stack.push(ni);
            }
        };
        // Left, right, up, down
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < w {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - wu);
        }
        if y + 1 < h {
            visit(idx + wu);
        }
    }

    Ok(out)
}
