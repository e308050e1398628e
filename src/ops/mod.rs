pub mod adjustments;
pub mod canvas_ops;
pub mod fill;
pub mod transform;

use image::Rgba;

use crate::canvas::{PixelBuffer, Pos, SelectionRect};
use crate::error::{EditorError, Result};

/// Pixel transforms a layer can apply to its live buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transform {
    FlipVertical,
    FlipHorizontal,
    Invert,
    Grayscale,
    RotateLeft,
    RotateRight,
    FloodFill { origin: Pos, color: Rgba<u8> },
    /// Crop to the rectangle, then stretch back to the layer size.
    Crop(SelectionRect),
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::FlipVertical => "Flip Vertical",
            Transform::FlipHorizontal => "Flip Horizontal",
            Transform::Invert => "Invert",
            Transform::Grayscale => "Grayscale",
            Transform::RotateLeft => "Rotate Left",
            Transform::RotateRight => "Rotate Right",
            Transform::FloodFill { .. } => "Flood Fill",
            Transform::Crop(_) => "Crop",
        }
    }

    /// Check coordinate arguments against a `width`×`height` buffer.
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        let check = |pos: Pos| {
            if pos.x < width && pos.y < height {
                Ok(())
            } else {
                Err(EditorError::OutOfBounds {
                    x: pos.x,
                    y: pos.y,
                    width,
                    height,
                })
            }
        };
        match self {
            Transform::FloodFill { origin, .. } => check(*origin),
            Transform::Crop(rect) => {
                check(rect.min())?;
                check(rect.max())
            }
            _ => Ok(()),
        }
    }

    /// Produce the transformed buffer. The result keeps `src`'s dimensions.
    pub fn apply(&self, src: &PixelBuffer) -> Result<PixelBuffer> {
        Ok(match self {
            Transform::FlipVertical => transform::flip_vertical(src),
            Transform::FlipHorizontal => transform::flip_horizontal(src),
            Transform::Invert => adjustments::invert(src),
            Transform::Grayscale => adjustments::grayscale(src),
            Transform::RotateLeft => transform::rotate_left(src),
            Transform::RotateRight => transform::rotate_right(src),
            Transform::FloodFill { origin, color } => fill::flood_fill(src, *origin, *color)?,
            Transform::Crop(rect) => {
                let cropped = transform::crop(src, rect)?;
                PixelBuffer::fitted(cropped.as_rgba_image(), src.width(), src.height())
            }
        })
    }
}
