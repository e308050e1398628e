use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, Result};
use crate::frame::{DEFAULT_FRAME_NAME, Frame};
use crate::io::{AnimationCodec, AnimationFrame};
use crate::settings::EditorSettings;
use crate::{log_info, log_warn};

/// Single open document: a fixed-size canvas with an ordered list of frames.
#[derive(Debug)]
pub struct Project {
    pub id: Uuid,
    /// Display name ("Untitled" until the caller names it)
    pub name: String,
    width: u32,
    height: u32,
    /// Playback order.
    frames: Vec<Frame>,
    selected_frame: Option<usize>,

    /// True if the frames came from an imported animation
    pub was_animated: bool,

    /// Playback speed used when encoding; replaced by the average delay of an
    /// imported animation
    pub animation_fps: f32,

    /// Per-layer history limit handed to every new layer (0 = unbounded)
    max_history: usize,
}

impl Project {
    /// A project with one frame holding one transparent layer.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_settings(width, height, &EditorSettings::default())
    }

    pub fn with_settings(width: u32, height: u32, settings: &EditorSettings) -> Self {
        let mut project = Self::without_frames(width, height, settings);
        project.new_frame();
        project
    }

    fn without_frames(width: u32, height: u32, settings: &EditorSettings) -> Self {
        let (width, height) = PixelBuffer::new(width, height).dimensions();
        Self {
            id: Uuid::new_v4(),
            name: "Untitled".to_string(),
            width,
            height,
            frames: Vec::new(),
            selected_frame: None,
            was_animated: false,
            animation_fps: settings.animation_fps,
            max_history: settings.max_undo_steps,
        }
    }

    /// Build a project sized to the first frame of a decoded animation.
    pub fn from_animation(codec: &dyn AnimationCodec, bytes: &[u8], settings: &EditorSettings) -> Result<Self> {
        let decoded = decode_nonempty(codec, bytes)?;
        let (w, h) = decoded[0].image.dimensions();
        let mut project = Self::without_frames(w, h, settings);
        project.install_frames(decoded, true);
        Ok(project)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    // ---- frame access --------------------------------------------------------

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> impl Iterator<Item = &mut Frame> {
        self.frames.iter_mut()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.frames.len() {
            Ok(())
        } else {
            Err(EditorError::NoSuchFrame {
                index,
                len: self.frames.len(),
            })
        }
    }

    pub fn frame(&self, index: usize) -> Result<&Frame> {
        self.check_index(index)?;
        Ok(&self.frames[index])
    }

    pub fn frame_mut(&mut self, index: usize) -> Result<&mut Frame> {
        self.check_index(index)?;
        Ok(&mut self.frames[index])
    }

    pub fn select_frame(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.selected_frame = Some(index);
        Ok(())
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_frame
    }

    pub fn selected_frame(&self) -> Option<&Frame> {
        self.selected_frame.and_then(|i| self.frames.get(i))
    }

    pub fn selected_frame_mut(&mut self) -> Option<&mut Frame> {
        self.selected_frame.and_then(|i| self.frames.get_mut(i))
    }

    // ---- structural edits ----------------------------------------------------

    fn push_selected(&mut self, frame: Frame) -> &mut Frame {
        self.frames.push(frame);
        let idx = self.frames.len() - 1;
        self.selected_frame = Some(idx);
        &mut self.frames[idx]
    }

    /// Append a frame with one transparent layer and select it.
    pub fn new_frame(&mut self) -> &mut Frame {
        let frame = Frame::with_history_limit(DEFAULT_FRAME_NAME, self.width, self.height, self.max_history);
        self.push_selected(frame)
    }

    /// Append a frame whose single layer holds `image`, and select it.
    pub fn new_frame_from_image(&mut self, image: &RgbaImage, id: &str) -> &mut Frame {
        let frame = self.frame_from_image(image, id);
        self.push_selected(frame)
    }

    fn frame_from_image(&self, image: &RgbaImage, id: &str) -> Frame {
        let mut frame = Frame::empty_with_limit(id, self.width, self.height, self.max_history);
        frame.new_layer_from_image(image);
        frame
    }

    /// Append a deep copy of the frame at `index` ("Copy of <id>") and select it.
    pub fn copy_frame(&mut self, index: usize) -> Result<&mut Frame> {
        self.check_index(index)?;
        let source = &self.frames[index];
        let copy = source.copy_with_id(format!("Copy of {}", source.id));
        Ok(self.push_selected(copy))
    }

    /// Remove and return the frame at `index`.
    pub fn delete_frame(&mut self, index: usize) -> Result<Frame> {
        self.check_index(index)?;
        let removed = self.frames.remove(index);
        self.selected_frame = match self.selected_frame {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        Ok(removed)
    }

    /// Move the frame one step earlier in playback. No-op for the first frame.
    pub fn promote_frame(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index == 0 {
            return Ok(());
        }
        self.swap_frames(index, index - 1);
        Ok(())
    }

    /// Move the frame one step later in playback. No-op for the last frame.
    pub fn demote_frame(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index + 1 == self.frames.len() {
            return Ok(());
        }
        self.swap_frames(index, index + 1);
        Ok(())
    }

    fn swap_frames(&mut self, a: usize, b: usize) {
        self.frames.swap(a, b);
        self.selected_frame = match self.selected_frame {
            Some(sel) if sel == a => Some(b),
            Some(sel) if sel == b => Some(a),
            other => other,
        };
    }

    // ---- animation -----------------------------------------------------------

    /// One composite image per frame, in playback order.
    pub fn export_animation_frames(&self) -> Result<Vec<RgbaImage>> {
        if self.frames.is_empty() {
            log_warn!("Project '{}': animation export with no frames", self.name);
            return Err(EditorError::EmptyProject);
        }
        self.frames.iter().map(Frame::export_composite_image).collect()
    }

    /// Encode every frame's composite with `codec` at `animation_fps`.
    pub fn export_animation(&self, codec: &dyn AnimationCodec) -> Result<Vec<u8>> {
        let frames = self.export_animation_frames()?;
        codec.encode_sequence(&frames, self.animation_fps)
    }

    /// Replace every frame with the decoded frames of `bytes`.
    ///
    /// The whole resource is decoded first, so a decode error leaves the
    /// project untouched. Returns the number of frames imported.
    pub fn import_animation(&mut self, codec: &dyn AnimationCodec, bytes: &[u8]) -> Result<usize> {
        let decoded = decode_nonempty(codec, bytes)?;
        self.frames.clear();
        self.selected_frame = None;
        Ok(self.install_frames(decoded, true))
    }

    /// Append the decoded frames of `bytes` after the existing ones.
    pub fn append_animation(&mut self, codec: &dyn AnimationCodec, bytes: &[u8]) -> Result<usize> {
        let decoded = decode_nonempty(codec, bytes)?;
        Ok(self.install_frames(decoded, false))
    }

    fn install_frames(&mut self, decoded: Vec<AnimationFrame>, select_first: bool) -> usize {
        let first_new = self.frames.len();
        let count = decoded.len();
        let total_delay: u64 = decoded.iter().map(|f| f.delay_ms as u64).sum();
        for anim_frame in &decoded {
            self.new_frame_from_image(&anim_frame.image, DEFAULT_FRAME_NAME);
        }
        if select_first {
            self.selected_frame = Some(first_new);
        }
        if total_delay > 0 {
            let avg_delay_ms = total_delay as f32 / count as f32;
            self.animation_fps = 1000.0 / avg_delay_ms;
        }
        self.was_animated = true;
        log_info!(
            "Project '{}': imported {} frame(s) at {:.1} fps",
            self.name,
            count,
            self.animation_fps
        );
        count
    }
}

/// Decode a sequence, treating "no frames at all" as a decode failure.
fn decode_nonempty(codec: &dyn AnimationCodec, bytes: &[u8]) -> Result<Vec<AnimationFrame>> {
    let decoded = codec.decode_sequence(bytes)?;
    if decoded.is_empty() {
        return Err(EditorError::Decode("animation contains no frames".to_string()));
    }
    Ok(decoded)
}
