use image::{Rgba, RgbaImage};

use crate::canvas::{PixelBuffer, Pos, SelectionRect};
use crate::components::history::HistoryStack;
use crate::error::Result;
use crate::io::ImageCodec;
use crate::ops::Transform;

/// Default display name for new layers.
pub const DEFAULT_LAYER_NAME: &str = "New Layer";

/// A named pixel buffer with its own undo history and selection.
///
/// History snapshots are taken *before* a transform runs, so an entry's
/// label names the state the transform started from. After a fresh edit the
/// live buffer is ahead of `history[cursor]`; `modified` tracks that, and
/// `undo` records such a state before stepping back.
#[derive(Debug)]
pub struct Layer {
    /// Display label, not a key.
    pub id: String,
    width: u32,
    height: u32,
    pixels: PixelBuffer,
    history: HistoryStack,
    selection: Option<SelectionRect>,
    /// Source of default history labels.
    history_uid: u64,
    /// Live buffer differs from the snapshot under the history cursor.
    modified: bool,
}

impl Layer {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_history_limit(id, width, height, 0)
    }

    /// `max_history` of 0 keeps every entry.
    pub fn with_history_limit(id: impl Into<String>, width: u32, height: u32, max_history: usize) -> Self {
        let pixels = PixelBuffer::new(width, height);
        let (width, height) = pixels.dimensions();
        Self {
            id: id.into(),
            width,
            height,
            history: HistoryStack::with_limit(pixels.clone(), max_history),
            pixels,
            selection: None,
            history_uid: 0,
            modified: false,
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

    // ---- pixel access --------------------------------------------------------

    pub fn get_pixel(&self, pos: Pos) -> Result<Rgba<u8>> {
        self.pixels.get_pixel(pos)
    }

    /// Paint one pixel on the live buffer. No history entry is taken; the
    /// next transform (or undo) records the painted state.
    pub fn set_pixel(&mut self, pos: Pos, color: Rgba<u8>) -> Result<()> {
        self.pixels.set_pixel(pos, color)?;
        self.mark_modified();
        Ok(())
    }

    pub fn coords(&self) -> impl Iterator<Item = Pos> + use<> {
        self.pixels.coords()
    }

    // ---- import / export -----------------------------------------------------

    pub fn buffer(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn export_image(&self) -> RgbaImage {
        self.pixels.as_rgba_image().clone()
    }

    pub fn export_bytes(&self, codec: &dyn ImageCodec) -> Result<Vec<u8>> {
        codec.encode(self.pixels.as_rgba_image())
    }

    /// Replace the whole grid, resampling to the layer size.
    pub fn load_image(&mut self, image: &RgbaImage) {
        self.pixels = PixelBuffer::fitted(image, self.width, self.height);
        self.mark_modified();
    }

    pub fn load_buffer(&mut self, buffer: PixelBuffer) {
        if buffer.dimensions() == (self.width, self.height) {
            self.pixels = buffer;
            self.mark_modified();
        } else {
            self.load_image(buffer.as_rgba_image());
        }
    }

    // ---- history -------------------------------------------------------------

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    /// True while the live buffer holds edits not yet in history.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn next_uid(&mut self) -> String {
        let id = self.history_uid;
        self.history_uid += 1;
        id.to_string()
    }

    fn mark_modified(&mut self) {
        self.history.truncate_future();
        self.modified = true;
    }

    /// Snapshot the live buffer into history under `label` (or the next uid).
    ///
    /// Anything past the cursor is discarded.
    pub fn add_history(&mut self, label: Option<&str>) {
        let label = match label {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => self.next_uid(),
        };
        self.history.push(label, self.pixels.clone());
        self.modified = false;
    }

    /// Step back one history entry. Returns false at the first entry.
    pub fn undo(&mut self) -> bool {
        // An edit not yet in history becomes the redo target.
        if self.modified {
            self.add_history(None);
        }
        match self.history.step_back() {
            Some(snapshot) => {
                self.pixels = snapshot.clone();
                self.modified = false;
                true
            }
            None => false,
        }
    }

    /// Step forward one history entry. Returns false at the last entry.
    pub fn redo(&mut self) -> bool {
        match self.history.step_forward() {
            Some(snapshot) => {
                self.pixels = snapshot.clone();
                self.modified = false;
                true
            }
            None => false,
        }
    }

    // ---- transforms ----------------------------------------------------------

    /// Record the pre-transform state, then apply `transform`.
    pub fn apply_transform(&mut self, transform: Transform) -> Result<()> {
        self.apply_transform_inner(transform, None)
    }

    pub fn apply_transform_labeled(&mut self, transform: Transform, label: &str) -> Result<()> {
        self.apply_transform_inner(transform, Some(label))
    }

    fn apply_transform_inner(&mut self, transform: Transform, label: Option<&str>) -> Result<()> {
        transform.validate(self.width, self.height)?;
        self.add_history(label);
        self.pixels = transform.apply(&self.pixels)?;
        self.mark_modified();
        Ok(())
    }

    pub fn flip_vertical(&mut self) -> Result<()> {
        self.apply_transform(Transform::FlipVertical)
    }

    pub fn flip_horizontal(&mut self) -> Result<()> {
        self.apply_transform(Transform::FlipHorizontal)
    }

    pub fn grayscale(&mut self) -> Result<()> {
        self.apply_transform(Transform::Grayscale)
    }

    pub fn invert(&mut self) -> Result<()> {
        self.apply_transform(Transform::Invert)
    }

    pub fn rotate_left(&mut self) -> Result<()> {
        self.apply_transform(Transform::RotateLeft)
    }

    pub fn rotate_right(&mut self) -> Result<()> {
        self.apply_transform(Transform::RotateRight)
    }

    pub fn flood_fill(&mut self, origin: Pos, color: Rgba<u8>) -> Result<()> {
        self.apply_transform(Transform::FloodFill { origin, color })
    }

    /// Crop to the selection and stretch the result over the layer.
    /// Does nothing without a selection.
    pub fn crop_to_selection(&mut self) -> Result<()> {
        match self.selection {
            Some(rect) => self.apply_transform(Transform::Crop(rect)),
            None => Ok(()),
        }
    }

    // ---- selection -----------------------------------------------------------

    pub fn selection(&self) -> Option<SelectionRect> {
        self.selection
    }

    pub fn set_selection(&mut self, a: Pos, b: Pos) -> Result<()> {
        self.pixels.check_bounds(a)?;
        self.pixels.check_bounds(b)?;
        self.selection = Some(SelectionRect::from_corners(a, b));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    // ---- copying -------------------------------------------------------------

    /// Deep copy of the pixels under the same id. The copy starts a fresh
    /// history whose only entry is the copied image.
    pub fn copy(&self) -> Layer {
        Layer {
            id: self.id.clone(),
            width: self.width,
            height: self.height,
            pixels: self.pixels.clone(),
            history: HistoryStack::with_limit(self.pixels.clone(), self.history.max_entries()),
            selection: None,
            history_uid: 0,
            modified: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::history::START_LABEL;
    use crate::error::EditorError;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn painted() -> Layer {
        let mut layer = Layer::new("test", 3, 2);
        layer.set_pixel(Pos::new(0, 0), RED).unwrap();
        layer.set_pixel(Pos::new(2, 1), BLUE).unwrap();
        layer
    }

    #[test]
    fn new_layer_is_transparent_with_start_entry() {
        let layer = Layer::new("l", 4, 4);
        assert!(layer.buffer().is_fully_transparent());
        assert_eq!(layer.history().labels(), vec![START_LABEL]);
        assert!(!layer.is_modified());
    }

    #[test]
    fn undo_restores_pre_transform_buffer() {
        let mut layer = painted();
        let before = layer.buffer().clone();
        layer.flip_horizontal().unwrap();
        assert_ne!(layer.buffer(), &before);
        assert!(layer.undo());
        assert_eq!(layer.buffer(), &before);
    }

    #[test]
    fn redo_restores_post_transform_buffer() {
        let mut layer = painted();
        layer.invert().unwrap();
        layer.rotate_right().unwrap();
        let after = layer.buffer().clone();
        assert!(layer.undo());
        assert!(layer.redo());
        assert_eq!(layer.buffer(), &after);
    }

    #[test]
    fn undo_walks_back_through_every_transform() {
        let mut layer = painted();
        let s0 = layer.buffer().clone();
        layer.flip_vertical().unwrap();
        let s1 = layer.buffer().clone();
        layer.invert().unwrap();
        let s2 = layer.buffer().clone();
        layer.grayscale().unwrap();

        assert!(layer.undo());
        assert_eq!(layer.buffer(), &s2);
        assert!(layer.undo());
        assert_eq!(layer.buffer(), &s1);
        assert!(layer.undo());
        assert_eq!(layer.buffer(), &s0);
    }

    #[test]
    fn undo_and_redo_stop_at_the_ends() {
        let mut layer = Layer::new("l", 2, 2);
        assert!(!layer.undo());
        assert!(!layer.redo());

        // Start, the pre-invert snapshot, and the inverted tip.
        layer.invert().unwrap();
        assert!(layer.undo());
        assert!(layer.undo());
        assert!(!layer.undo());
        assert!(layer.buffer().is_fully_transparent());
        assert!(layer.redo());
        assert!(layer.redo());
        assert!(!layer.redo());
        assert_eq!(layer.get_pixel(Pos::new(0, 0)).unwrap(), Rgba([255, 255, 255, 0]));
    }

    #[test]
    fn several_undos_then_redos_return_to_the_latest_edit() {
        let mut layer = painted();
        layer.invert().unwrap();
        layer.flip_horizontal().unwrap();
        layer.rotate_right().unwrap();
        let latest = layer.buffer().clone();

        for _ in 0..3 {
            assert!(layer.undo());
        }
        for _ in 0..3 {
            assert!(layer.redo());
        }
        assert_eq!(layer.buffer(), &latest);
        assert!(!layer.redo());
    }

    #[test]
    fn first_transform_on_fresh_layer_is_recorded() {
        let mut layer = Layer::new("l", 2, 2);
        layer.apply_transform_labeled(Transform::Invert, "before invert").unwrap();
        assert_eq!(layer.history().labels(), vec![START_LABEL, "before invert"]);
        assert!(layer.history().current().snapshot.is_fully_transparent());

        layer.grayscale().unwrap();
        assert_eq!(layer.history().labels(), vec![START_LABEL, "before invert", "0"]);
    }

    #[test]
    fn new_transform_after_undo_discards_redo() {
        let mut layer = painted();
        layer.flip_horizontal().unwrap();
        layer.invert().unwrap();
        layer.undo();
        layer.undo();
        layer.flip_vertical().unwrap();
        let current = layer.buffer().clone();
        assert!(!layer.redo());
        assert_eq!(layer.buffer(), &current);
    }

    #[test]
    fn pixel_edit_after_undo_discards_redo() {
        let mut layer = painted();
        layer.invert().unwrap();
        layer.undo();
        layer.set_pixel(Pos::new(1, 1), RED).unwrap();
        assert!(!layer.redo());
    }

    #[test]
    fn history_labels_use_per_layer_counter() {
        let mut a = painted();
        let mut b = painted();
        a.invert().unwrap();
        a.invert().unwrap();
        b.invert().unwrap();
        assert_eq!(a.history().labels(), vec![START_LABEL, "0", "1"]);
        assert_eq!(b.history().labels(), vec![START_LABEL, "0"]);
    }

    #[test]
    fn explicit_label_names_the_pre_transform_state() {
        let mut layer = painted();
        let before = layer.buffer().clone();
        layer.apply_transform_labeled(Transform::Invert, "before invert").unwrap();
        let entry = layer.history().current();
        assert_eq!(entry.label, "before invert");
        assert_eq!(entry.snapshot, before);
    }

    #[test]
    fn failed_transform_records_nothing() {
        let mut layer = painted();
        let err = layer.flood_fill(Pos::new(9, 9), RED).unwrap_err();
        assert!(matches!(err, EditorError::OutOfBounds { .. }));
        assert_eq!(layer.history().len(), 1);
        assert!(layer.is_modified());
    }

    #[test]
    fn flood_fill_through_layer_is_undoable() {
        let mut layer = Layer::new("l", 3, 3);
        layer.flood_fill(Pos::new(1, 1), BLUE).unwrap();
        assert!(layer.coords().all(|p| layer.get_pixel(p).unwrap() == BLUE));
        layer.undo();
        assert!(layer.buffer().is_fully_transparent());
    }

    #[test]
    fn load_image_resamples_to_layer_size() {
        let mut layer = Layer::new("l", 2, 2);
        layer.load_image(&RgbaImage::from_pixel(8, 6, RED));
        assert_eq!(layer.buffer().dimensions(), (2, 2));
        assert_eq!(layer.get_pixel(Pos::new(1, 1)).unwrap(), RED);
    }

    #[test]
    fn crop_to_selection_stretches_selected_area() {
        let mut layer = Layer::new("l", 4, 4);
        layer.set_pixel(Pos::new(3, 3), RED).unwrap();
        layer.set_selection(Pos::new(3, 3), Pos::new(2, 2)).unwrap();
        layer.crop_to_selection().unwrap();
        assert_eq!(layer.buffer().dimensions(), (4, 4));
        assert_eq!(layer.get_pixel(Pos::new(3, 3)).unwrap(), RED);
        assert_eq!(layer.get_pixel(Pos::new(2, 2)).unwrap(), RED);
        assert_eq!(layer.get_pixel(Pos::new(1, 1)).unwrap()[3], 0);
    }

    #[test]
    fn crop_without_selection_is_noop() {
        let mut layer = painted();
        let before = layer.buffer().clone();
        layer.crop_to_selection().unwrap();
        assert_eq!(layer.buffer(), &before);
        assert_eq!(layer.history().len(), 1);
    }

    #[test]
    fn selection_corners_are_bounds_checked() {
        let mut layer = Layer::new("l", 2, 2);
        assert!(layer.set_selection(Pos::new(0, 0), Pos::new(2, 1)).is_err());
        assert!(layer.selection().is_none());
        layer.set_selection(Pos::new(1, 1), Pos::new(0, 0)).unwrap();
        assert_eq!(layer.selection().unwrap().min(), Pos::new(0, 0));
    }

    #[test]
    fn copy_is_deep_with_fresh_history() {
        let mut original = painted();
        original.invert().unwrap();
        let mut copy = original.copy();
        assert_eq!(copy.buffer(), original.buffer());
        assert_eq!(copy.history().len(), 1);
        assert_eq!(copy.history().current().snapshot, *original.buffer());

        copy.set_pixel(Pos::new(1, 0), RED).unwrap();
        assert_ne!(copy.get_pixel(Pos::new(1, 0)).unwrap(), original.get_pixel(Pos::new(1, 0)).unwrap());
    }

    #[test]
    fn export_does_not_touch_history() {
        let layer = painted();
        let img = layer.export_image();
        assert_eq!(*img.get_pixel(0, 0), RED);
        assert_eq!(layer.history().len(), 1);
    }
}
