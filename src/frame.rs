use image::RgbaImage;

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, Result};
use crate::io::ImageCodec;
use crate::layer::{DEFAULT_LAYER_NAME, Layer};
use crate::ops::canvas_ops;
use crate::{log_info, log_warn};

/// Default display name for new frames.
pub const DEFAULT_FRAME_NAME: &str = "New Frame";

/// One animation frame: an ordered stack of equally sized layers.
#[derive(Debug)]
pub struct Frame {
    /// Display label, not a key.
    pub id: String,
    width: u32,
    height: u32,
    /// Rendering order: index 0 is the topmost layer, the last index is the
    /// bottom of the stack.
    layers: Vec<Layer>,
    selected_layer: Option<usize>,
    max_history: usize,
}

impl Frame {
    /// A frame holding one transparent layer.
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_history_limit(id, width, height, 0)
    }

    pub fn with_history_limit(id: impl Into<String>, width: u32, height: u32, max_history: usize) -> Self {
        let mut frame = Self::empty_with_limit(id, width, height, max_history);
        frame.new_layer();
        frame
    }

    /// A frame with no layers at all.
    pub fn empty(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self::empty_with_limit(id, width, height, 0)
    }

    pub(crate) fn empty_with_limit(id: impl Into<String>, width: u32, height: u32, max_history: usize) -> Self {
        let (width, height) = PixelBuffer::new(width, height).dimensions();
        Self {
            id: id.into(),
            width,
            height,
            layers: Vec::new(),
            selected_layer: None,
            max_history,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    // ---- layer access --------------------------------------------------------

    /// Layers top-first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.iter_mut()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.layers.len() {
            Ok(())
        } else {
            Err(EditorError::NoSuchLayer {
                index,
                len: self.layers.len(),
            })
        }
    }

    pub fn layer(&self, index: usize) -> Result<&Layer> {
        self.check_index(index)?;
        Ok(&self.layers[index])
    }

    pub fn layer_mut(&mut self, index: usize) -> Result<&mut Layer> {
        self.check_index(index)?;
        Ok(&mut self.layers[index])
    }

    // ---- selection -----------------------------------------------------------

    pub fn select_layer(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.selected_layer = Some(index);
        Ok(())
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_layer
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected_layer.and_then(|i| self.layers.get(i))
    }

    pub fn selected_layer_mut(&mut self) -> Option<&mut Layer> {
        self.selected_layer.and_then(|i| self.layers.get_mut(i))
    }

    // ---- structural edits ----------------------------------------------------

    /// Append a transparent layer at the bottom of the stack and select it.
    pub fn new_layer(&mut self) -> &mut Layer {
        let layer = Layer::with_history_limit(DEFAULT_LAYER_NAME, self.width, self.height, self.max_history);
        self.push_selected(layer)
    }

    /// Append a layer holding `image` (resampled to the frame size) with the
    /// loaded image recorded as one history entry.
    pub fn new_layer_from_image(&mut self, image: &RgbaImage) -> &mut Layer {
        let mut layer = Layer::with_history_limit(DEFAULT_LAYER_NAME, self.width, self.height, self.max_history);
        layer.load_image(image);
        layer.add_history(None);
        self.push_selected(layer)
    }

    /// Append a deep copy of the layer at `index`, labeled "Copy of <id>".
    pub fn copy_layer(&mut self, index: usize) -> Result<&mut Layer> {
        self.check_index(index)?;
        let mut copy = self.layers[index].copy();
        copy.set_id(format!("Copy of {}", self.layers[index].id));
        Ok(self.push_selected(copy))
    }

    fn push_selected(&mut self, layer: Layer) -> &mut Layer {
        self.layers.push(layer);
        let idx = self.layers.len() - 1;
        self.selected_layer = Some(idx);
        &mut self.layers[idx]
    }

    /// Remove and return the layer at `index`.
    pub fn delete_layer(&mut self, index: usize) -> Result<Layer> {
        self.check_index(index)?;
        let removed = self.layers.remove(index);
        self.selected_layer = match self.selected_layer {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        Ok(removed)
    }

    /// Move the layer one step towards the top. No-op for the topmost layer.
    pub fn promote_layer(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index == 0 {
            return Ok(());
        }
        self.swap_layers(index, index - 1);
        Ok(())
    }

    /// Move the layer one step towards the bottom. No-op for the bottommost layer.
    pub fn demote_layer(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index + 1 == self.layers.len() {
            return Ok(());
        }
        self.swap_layers(index, index + 1);
        Ok(())
    }

    /// Swap two layers; the selection follows the layer it pointed at.
    fn swap_layers(&mut self, a: usize, b: usize) {
        self.layers.swap(a, b);
        self.selected_layer = match self.selected_layer {
            Some(sel) if sel == a => Some(b),
            Some(sel) if sel == b => Some(a),
            other => other,
        };
    }

    /// Composite the layer at `index` over the layer directly beneath it,
    /// store the result in that lower layer, and remove the upper one.
    /// No-op for the bottommost layer.
    pub fn merge_layer_down(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index + 1 == self.layers.len() {
            return Ok(());
        }
        let merged = canvas_ops::merge(self.layers[index].buffer(), self.layers[index + 1].buffer());

        let lower = &mut self.layers[index + 1];
        lower.add_history(None);
        lower.load_buffer(merged);

        let removed = self.delete_layer(index)?;
        log_info!("Frame '{}': merged layer '{}' down", self.id, removed.id);
        Ok(())
    }

    // ---- compositing ---------------------------------------------------------

    /// Flatten all layers, bottom to top, with source-over blending.
    pub fn export_composite_buffer(&self) -> Result<PixelBuffer> {
        canvas_ops::composite_stack(self.layers.iter().map(Layer::buffer)).ok_or_else(|| {
            log_warn!("Frame '{}': composite requested with no layers", self.id);
            EditorError::EmptyFrame
        })
    }

    pub fn export_composite_image(&self) -> Result<RgbaImage> {
        Ok(self.export_composite_buffer()?.into_rgba_image())
    }

    pub fn export_composite_bytes(&self, codec: &dyn ImageCodec) -> Result<Vec<u8>> {
        codec.encode(&self.export_composite_image()?)
    }

    /// Deep copy of every layer (pixels only, fresh histories).
    pub(crate) fn copy_with_id(&self, id: impl Into<String>) -> Frame {
        Frame {
            id: id.into(),
            width: self.width,
            height: self.height,
            layers: self.layers.iter().map(Layer::copy).collect(),
            selected_layer: if self.layers.is_empty() { None } else { Some(0) },
            max_history: self.max_history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Pos;
    use image::Rgba;

    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn ids(frame: &Frame) -> Vec<&str> {
        frame.layers().iter().map(|l| l.id.as_str()).collect()
    }

    fn named(n: usize) -> Frame {
        let mut frame = Frame::empty("f", 2, 2);
        for i in 0..n {
            frame.new_layer().set_id(format!("L{i}"));
        }
        frame
    }

    #[test]
    fn new_frame_has_one_selected_layer() {
        let frame = Frame::new("f", 3, 3);
        assert_eq!(frame.layer_count(), 1);
        assert_eq!(frame.selected_index(), Some(0));
        assert_eq!(frame.layers()[0].id, DEFAULT_LAYER_NAME);
    }

    #[test]
    fn new_layer_appends_and_selects() {
        let mut frame = named(2);
        frame.new_layer().set_id("L2");
        assert_eq!(ids(&frame), vec!["L0", "L1", "L2"]);
        assert_eq!(frame.selected_index(), Some(2));
    }

    #[test]
    fn new_layer_from_image_records_history() {
        let mut frame = Frame::empty("f", 2, 2);
        let layer = frame.new_layer_from_image(&RgbaImage::from_pixel(4, 4, GREEN));
        assert_eq!(layer.get_pixel(Pos::new(1, 1)).unwrap(), GREEN);
        assert_eq!(layer.history().len(), 2);
        assert!(!layer.is_modified());
    }

    #[test]
    fn promote_top_and_demote_bottom_are_noops() {
        let mut frame = named(3);
        frame.promote_layer(0).unwrap();
        assert_eq!(ids(&frame), vec!["L0", "L1", "L2"]);
        frame.demote_layer(2).unwrap();
        assert_eq!(ids(&frame), vec!["L0", "L1", "L2"]);
    }

    #[test]
    fn promote_and_demote_swap_neighbours() {
        let mut frame = named(3);
        frame.select_layer(2).unwrap();
        frame.promote_layer(2).unwrap();
        assert_eq!(ids(&frame), vec!["L0", "L2", "L1"]);
        assert_eq!(frame.selected_layer().unwrap().id, "L2");

        frame.demote_layer(0).unwrap();
        assert_eq!(ids(&frame), vec!["L2", "L0", "L1"]);
        assert_eq!(frame.selected_layer().unwrap().id, "L2");
    }

    #[test]
    fn delete_revalidates_selection() {
        let mut frame = named(3);
        frame.select_layer(2).unwrap();
        frame.delete_layer(0).unwrap();
        assert_eq!(frame.selected_layer().unwrap().id, "L2");

        frame.delete_layer(1).unwrap();
        assert_eq!(frame.selected_index(), None);
        assert_eq!(ids(&frame), vec!["L1"]);
    }

    #[test]
    fn bad_index_is_reported() {
        let mut frame = named(1);
        assert!(matches!(
            frame.delete_layer(3),
            Err(EditorError::NoSuchLayer { index: 3, len: 1 })
        ));
        assert!(frame.promote_layer(1).is_err());
        assert!(frame.select_layer(1).is_err());
    }

    #[test]
    fn merge_down_on_bottom_is_noop() {
        let mut frame = named(2);
        frame.merge_layer_down(1).unwrap();
        assert_eq!(frame.layer_count(), 2);
    }

    #[test]
    fn merge_down_keeps_lower_layer_with_blended_pixels() {
        let mut frame = named(2);
        frame.layer_mut(0).unwrap().set_pixel(Pos::new(0, 0), BLUE).unwrap();
        frame.layer_mut(1).unwrap().load_image(&RgbaImage::from_pixel(2, 2, GREEN));
        frame.merge_layer_down(0).unwrap();

        assert_eq!(ids(&frame), vec!["L1"]);
        let merged = frame.layer(0).unwrap();
        assert_eq!(merged.get_pixel(Pos::new(0, 0)).unwrap(), BLUE);
        assert_eq!(merged.get_pixel(Pos::new(1, 1)).unwrap(), GREEN);
    }

    #[test]
    fn merge_down_is_undoable_on_the_lower_layer() {
        let mut frame = named(2);
        frame.layer_mut(0).unwrap().set_pixel(Pos::new(0, 0), BLUE).unwrap();
        frame.layer_mut(1).unwrap().set_pixel(Pos::new(1, 1), GREEN).unwrap();
        let before = frame.layer(1).unwrap().buffer().clone();
        frame.merge_layer_down(0).unwrap();

        let lower = frame.layer_mut(0).unwrap();
        assert!(lower.undo());
        assert_eq!(lower.buffer(), &before);
    }

    #[test]
    fn composite_puts_index_zero_on_top() {
        let mut frame = named(2);
        frame.layer_mut(0).unwrap().set_pixel(Pos::new(0, 0), BLUE).unwrap();
        frame.layer_mut(1).unwrap().load_image(&RgbaImage::from_pixel(2, 2, GREEN));
        let img = frame.export_composite_image().unwrap();
        assert_eq!(*img.get_pixel(0, 0), BLUE);
        assert_eq!(*img.get_pixel(1, 0), GREEN);
    }

    #[test]
    fn composite_of_empty_frame_fails() {
        let frame = Frame::empty("f", 2, 2);
        assert!(matches!(frame.export_composite_image(), Err(EditorError::EmptyFrame)));
    }

    #[test]
    fn copy_layer_is_labeled_and_independent() {
        let mut frame = named(1);
        frame.layer_mut(0).unwrap().set_pixel(Pos::new(0, 0), BLUE).unwrap();
        frame.copy_layer(0).unwrap().set_pixel(Pos::new(0, 0), GREEN).unwrap();
        assert_eq!(ids(&frame), vec!["L0", "Copy of L0"]);
        assert_eq!(frame.selected_index(), Some(1));
        assert_eq!(frame.layer(0).unwrap().get_pixel(Pos::new(0, 0)).unwrap(), BLUE);
    }
}
