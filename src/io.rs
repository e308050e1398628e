use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat, Rgba, RgbaImage};

use crate::canvas::blend_pixel;
use crate::error::{EditorError, Result};
use crate::{log_info, log_warn};

/// Shortest delay a decoded frame may carry.
pub const MIN_FRAME_DELAY_MS: u16 = 10;
/// Delay given to frames of sources with no timing information.
pub const DEFAULT_FRAME_DELAY_MS: u16 = 100;
/// Alpha below which a pixel is written as the GIF transparent index.
const GIF_ALPHA_THRESHOLD: u8 = 128;

/// Single-image byte codec.
pub trait ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage>;
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>>;
}

/// One decoded animation frame, already composited onto the full canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationFrame {
    pub image: RgbaImage,
    pub delay_ms: u16,
}

/// Multi-frame byte codec.
pub trait AnimationCodec {
    /// Decode every frame until end of stream.
    fn decode_sequence(&self, bytes: &[u8]) -> Result<Vec<AnimationFrame>>;
    /// Encode equally sized frames played back at `fps`.
    fn encode_sequence(&self, frames: &[RgbaImage], fps: f32) -> Result<Vec<u8>>;
}

fn frame_delay_ms(fps: f32) -> u16 {
    if fps.is_finite() && fps > 0.0 {
        (1000.0 / fps).round().clamp(1.0, 65535.0) as u16
    } else {
        DEFAULT_FRAME_DELAY_MS
    }
}

fn check_same_size(frames: &[RgbaImage]) -> Result<(u32, u32)> {
    let Some(first) = frames.first() else {
        return Err(EditorError::Encode("no frames to encode".to_string()));
    };
    let dims = first.dimensions();
    if let Some(bad) = frames.iter().find(|f| f.dimensions() != dims) {
        return Err(EditorError::Encode(format!(
            "frame size {}x{} differs from {}x{}",
            bad.width(),
            bad.height(),
            dims.0,
            dims.1
        )));
    }
    Ok(dims)
}

// ============================================================================
// STILL IMAGES
// ============================================================================

/// PNG through the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage> {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map(|img| img.to_rgba8())
            .map_err(|e| EditorError::Decode(format!("PNG: {}", e)))
    }

    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
            .map_err(|e| EditorError::Encode(format!("PNG: {}", e)))?;
        Ok(out)
    }
}

/// Any single-frame format the `image` crate handles, seen as a
/// one-frame animation.
#[derive(Clone, Copy, Debug)]
pub struct StillCodec {
    pub format: ImageFormat,
}

impl ImageCodec for StillCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage> {
        image::load_from_memory_with_format(bytes, self.format)
            .map(|img| img.to_rgba8())
            .map_err(|e| EditorError::Decode(format!("{:?}: {}", self.format, e)))
    }

    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        let rgba = DynamicImage::ImageRgba8(image.clone());
        // JPEG and BMP writers in `image` reject an alpha channel.
        let img = match self.format {
            ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(rgba.to_rgb8()),
            _ => rgba,
        };
        img.write_to(&mut out, self.format)
            .map_err(|e| EditorError::Encode(format!("{:?}: {}", self.format, e)))?;
        Ok(out.into_inner())
    }
}

impl AnimationCodec for StillCodec {
    fn decode_sequence(&self, bytes: &[u8]) -> Result<Vec<AnimationFrame>> {
        Ok(vec![AnimationFrame {
            image: self.decode(bytes)?,
            delay_ms: DEFAULT_FRAME_DELAY_MS,
        }])
    }

    fn encode_sequence(&self, frames: &[RgbaImage], _fps: f32) -> Result<Vec<u8>> {
        check_same_size(frames)?;
        if frames.len() > 1 {
            log_warn!("{:?} holds one frame; dropping {} more", self.format, frames.len() - 1);
        }
        self.encode(&frames[0])
    }
}

// ============================================================================
// GIF
// ============================================================================

#[derive(Clone, Copy, Debug)]
pub struct GifCodec {
    /// Palette size per frame (clamped to 2..=256).
    pub max_colors: u16,
}

impl Default for GifCodec {
    fn default() -> Self {
        Self { max_colors: 256 }
    }
}

impl GifCodec {
    pub fn new(max_colors: u16) -> Self {
        Self { max_colors }
    }
}

impl AnimationCodec for GifCodec {
    /// Frames are composited onto a running canvas honouring each frame's
    /// disposal method, since GIF frames may only cover part of the image.
    fn decode_sequence(&self, bytes: &[u8]) -> Result<Vec<AnimationFrame>> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options
            .read_info(Cursor::new(bytes))
            .map_err(|e| EditorError::Decode(format!("GIF header: {}", e)))?;

        let width = decoder.width() as u32;
        let height = decoder.height() as u32;

        let mut frames = Vec::new();
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        let mut prev_canvas = canvas.clone();

        while let Some(frame) = decoder
            .read_next_frame()
            .map_err(|e| EditorError::Decode(format!("GIF frame {}: {}", frames.len(), e)))?
        {
            let (fx0, fy0) = (frame.left as u32, frame.top as u32);
            let (fw, fh) = (frame.width as u32, frame.height as u32);
            // GIF delays are in centiseconds.
            let delay_ms = ((frame.delay as u32) * 10).min(65535) as u16;
            let disposal = frame.dispose;

            if disposal == gif::DisposalMethod::Previous {
                prev_canvas = canvas.clone();
            }

            for (i, px) in frame.buffer.chunks_exact(4).enumerate() {
                let cx = fx0 + i as u32 % fw.max(1);
                let cy = fy0 + i as u32 / fw.max(1);
                if px[3] > 0 && cx < width && cy < height {
                    canvas.put_pixel(cx, cy, Rgba([px[0], px[1], px[2], px[3]]));
                }
            }

            frames.push(AnimationFrame {
                image: canvas.clone(),
                delay_ms: delay_ms.max(MIN_FRAME_DELAY_MS),
            });

            match disposal {
                gif::DisposalMethod::Background => {
                    for cy in fy0..(fy0 + fh).min(height) {
                        for cx in fx0..(fx0 + fw).min(width) {
                            canvas.put_pixel(cx, cy, Rgba([0, 0, 0, 0]));
                        }
                    }
                }
                gif::DisposalMethod::Previous => canvas = prev_canvas.clone(),
                _ => {}
            }
        }

        if frames.is_empty() {
            return Err(EditorError::Decode("GIF contains no frames".to_string()));
        }
        Ok(frames)
    }

    fn encode_sequence(&self, frames: &[RgbaImage], fps: f32) -> Result<Vec<u8>> {
        let (w, h) = check_same_size(frames)?;
        if w > u16::MAX as u32 || h > u16::MAX as u32 {
            return Err(EditorError::Encode("image dimensions exceed GIF maximum (65535x65535)".to_string()));
        }
        let (w, h) = (w as u16, h as u16);
        let delay_cs = (frame_delay_ms(fps) / 10).max(1);
        let colors = (self.max_colors as usize).clamp(2, 256);

        let mut out = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut out, w, h, &[])
                .map_err(|e| EditorError::Encode(format!("GIF encoder init: {}", e)))?;
            if frames.len() > 1 {
                encoder
                    .set_repeat(gif::Repeat::Infinite)
                    .map_err(|e| EditorError::Encode(format!("GIF repeat: {}", e)))?;
            }

            for frame_img in frames {
                let quantized = quantize_rgba(frame_img, colors);
                let frame = gif::Frame {
                    width: w,
                    height: h,
                    delay: delay_cs,
                    dispose: gif::DisposalMethod::Background,
                    transparent: quantized.transparent,
                    palette: Some(quantized.palette),
                    buffer: Cow::Owned(quantized.indices),
                    ..Default::default()
                };
                encoder
                    .write_frame(&frame)
                    .map_err(|e| EditorError::Encode(format!("GIF frame write: {}", e)))?;
            }
        }
        Ok(out)
    }
}

/// Indexed-colour form of one RGBA frame.
struct Quantized {
    /// Flat `[R, G, B, R, G, B, ...]`, as the gif crate wants it.
    palette: Vec<u8>,
    indices: Vec<u8>,
    transparent: Option<u8>,
}

/// Reduce an RGBA image to at most `max_colors` palette entries.
///
/// Pixels under [`GIF_ALPHA_THRESHOLD`] map to a dedicated transparent entry.
/// Images that already fit the palette keep their exact colours; anything
/// larger goes through NeuQuant.
fn quantize_rgba(image: &RgbaImage, max_colors: usize) -> Quantized {
    let has_transparency = image.pixels().any(|p| p[3] < GIF_ALPHA_THRESHOLD);
    let opaque_slots = if has_transparency { max_colors - 1 } else { max_colors };

    let (mut palette, mut indices) =
        exact_palette(image, opaque_slots).unwrap_or_else(|| neuquant_palette(image, opaque_slots));

    let transparent = if has_transparency {
        let t = (palette.len() / 3) as u8;
        palette.extend_from_slice(&[0, 0, 0]);
        for (idx, p) in indices.iter_mut().zip(image.pixels()) {
            if p[3] < GIF_ALPHA_THRESHOLD {
                *idx = t;
            }
        }
        Some(t)
    } else {
        None
    };

    Quantized {
        palette,
        indices,
        transparent,
    }
}

/// Palette of the image's own colours, or `None` if there are more than `max_colors`.
fn exact_palette(image: &RgbaImage, max_colors: usize) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut lookup: HashMap<[u8; 3], u8> = HashMap::new();
    let mut palette = Vec::new();
    let mut indices = Vec::with_capacity((image.width() * image.height()) as usize);
    for p in image.pixels() {
        if p[3] < GIF_ALPHA_THRESHOLD {
            indices.push(0);
            continue;
        }
        let rgb = [p[0], p[1], p[2]];
        let idx = match lookup.get(&rgb) {
            Some(&idx) => idx,
            None => {
                if lookup.len() == max_colors {
                    return None;
                }
                let idx = lookup.len() as u8;
                lookup.insert(rgb, idx);
                palette.extend_from_slice(&rgb);
                idx
            }
        };
        indices.push(idx);
    }
    if palette.is_empty() {
        palette.extend_from_slice(&[0, 0, 0]);
    }
    Some((palette, indices))
}

fn neuquant_palette(image: &RgbaImage, max_colors: usize) -> (Vec<u8>, Vec<u8>) {
    let pixels: Vec<u8> = image.pixels().flat_map(|p| [p[0], p[1], p[2], 255]).collect();
    let nq = color_quant::NeuQuant::new(10, max_colors, &pixels);

    let mut palette = Vec::with_capacity(max_colors * 3);
    for i in 0..max_colors {
        match nq.lookup(i) {
            Some(color) => palette.extend_from_slice(&color[..3]),
            None => palette.extend_from_slice(&[0, 0, 0]),
        }
    }
    let indices = image
        .pixels()
        .map(|p| nq.index_of(&[p[0], p[1], p[2], 255]) as u8)
        .collect();
    (palette, indices)
}

// ============================================================================
// APNG
// ============================================================================

/// Animated PNG through the `png` crate. Plain PNGs decode as one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApngCodec;

impl AnimationCodec for ApngCodec {
    fn decode_sequence(&self, bytes: &[u8]) -> Result<Vec<AnimationFrame>> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| EditorError::Decode(format!("PNG header: {}", e)))?;
        let (width, height) = (reader.info().width, reader.info().height);
        let num_frames = reader.info().animation_control().map(|ac| ac.num_frames);

        let Some(num_frames) = num_frames else {
            let mut buf = vec![0u8; reader.output_buffer_size()];
            let out = reader
                .next_frame(&mut buf)
                .map_err(|e| EditorError::Decode(format!("PNG data: {}", e)))?;
            let image = png_buffer_to_rgba(&buf[..out.buffer_size()], width, height, out.color_type)?;
            return Ok(vec![AnimationFrame {
                image,
                delay_ms: DEFAULT_FRAME_DELAY_MS,
            }]);
        };

        let mut frames = Vec::with_capacity(num_frames as usize);
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

        for _ in 0..num_frames {
            let mut buf = vec![0u8; reader.output_buffer_size()];
            let out = reader
                .next_frame(&mut buf)
                .map_err(|e| EditorError::Decode(format!("APNG frame {}: {}", frames.len(), e)))?;

            let fc = reader.info().frame_control().cloned();
            let (fx0, fy0, fw, fh) = match &fc {
                Some(fc) => (fc.x_offset, fc.y_offset, fc.width, fc.height),
                None => (0, 0, width, height),
            };
            let delay_ms = fc.as_ref().map_or(DEFAULT_FRAME_DELAY_MS, |fc| {
                let den = if fc.delay_den == 0 { 100.0 } else { fc.delay_den as f64 };
                ((fc.delay_num as f64 / den) * 1000.0).min(65535.0) as u16
            });
            let blend_over = fc.as_ref().is_some_and(|fc| matches!(fc.blend_op, png::BlendOp::Over));
            let dispose = fc.as_ref().map_or(png::DisposeOp::None, |fc| fc.dispose_op);

            let patch = png_buffer_to_rgba(&buf[..out.buffer_size()], fw, fh, out.color_type)?;
            let before = (dispose == png::DisposeOp::Previous).then(|| canvas.clone());

            for (px, py, pixel) in patch.enumerate_pixels() {
                let (cx, cy) = (fx0 + px, fy0 + py);
                if cx < width && cy < height {
                    let value = if blend_over {
                        blend_pixel(*canvas.get_pixel(cx, cy), *pixel)
                    } else {
                        *pixel
                    };
                    canvas.put_pixel(cx, cy, value);
                }
            }

            frames.push(AnimationFrame {
                image: canvas.clone(),
                delay_ms: delay_ms.max(MIN_FRAME_DELAY_MS),
            });

            match dispose {
                png::DisposeOp::Background => {
                    for cy in fy0..(fy0 + fh).min(height) {
                        for cx in fx0..(fx0 + fw).min(width) {
                            canvas.put_pixel(cx, cy, Rgba([0, 0, 0, 0]));
                        }
                    }
                }
                png::DisposeOp::Previous => {
                    if let Some(before) = before {
                        canvas = before;
                    }
                }
                png::DisposeOp::None => {}
            }
        }

        if frames.is_empty() {
            return Err(EditorError::Decode("APNG contains no frames".to_string()));
        }
        Ok(frames)
    }

    fn encode_sequence(&self, frames: &[RgbaImage], fps: f32) -> Result<Vec<u8>> {
        let (width, height) = check_same_size(frames)?;
        let delay_ms = frame_delay_ms(fps);
        let encode_err = |e: png::EncodingError| EditorError::Encode(format!("APNG: {}", e));

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            if frames.len() > 1 {
                // 0 plays = loop forever
                encoder.set_animated(frames.len() as u32, 0).map_err(encode_err)?;
            }
            let mut writer = encoder.write_header().map_err(encode_err)?;
            for frame_img in frames {
                if frames.len() > 1 {
                    writer.set_frame_delay(delay_ms, 1000).map_err(encode_err)?;
                    writer.set_dispose_op(png::DisposeOp::Background).map_err(encode_err)?;
                }
                writer.write_image_data(frame_img.as_raw()).map_err(encode_err)?;
            }
            writer.finish().map_err(encode_err)?;
        }
        Ok(out)
    }
}

/// Widen an 8-bit PNG output buffer to RGBA.
fn png_buffer_to_rgba(buf: &[u8], width: u32, height: u32, color_type: png::ColorType) -> Result<RgbaImage> {
    let pixels = width as usize * height as usize;
    let channels = match color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb | png::ColorType::Indexed => 3,
        png::ColorType::Rgba => 4,
    };
    if buf.len() < pixels * channels {
        return Err(EditorError::Decode(format!(
            "PNG buffer too small: {} bytes for {}x{} {:?}",
            buf.len(),
            width,
            height,
            color_type
        )));
    }
    let rgba: Vec<u8> = buf[..pixels * channels]
        .chunks_exact(channels)
        .flat_map(|c| match c {
            [g] => [*g, *g, *g, 255],
            [g, a] => [*g, *g, *g, *a],
            [r, g, b] => [*r, *g, *b, 255],
            [r, g, b, a] => [*r, *g, *b, *a],
            _ => [0, 0, 0, 0],
        })
        .collect();
    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| EditorError::Decode("PNG buffer does not match its header".to_string()))
}

// ============================================================================
// FILE HELPERS
// ============================================================================

/// Pick a codec from the file extension, with a 256-colour GIF palette.
pub fn codec_for_path(path: &Path) -> Result<Box<dyn AnimationCodec>> {
    codec_for_path_with_colors(path, 256)
}

pub fn codec_for_path_with_colors(path: &Path, max_colors: u16) -> Result<Box<dyn AnimationCodec>> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let codec: Box<dyn AnimationCodec> = match ext.as_str() {
        "gif" => Box::new(GifCodec::new(max_colors)),
        "png" | "apng" => Box::new(ApngCodec),
        "jpg" | "jpeg" => Box::new(StillCodec {
            format: ImageFormat::Jpeg,
        }),
        "bmp" => Box::new(StillCodec { format: ImageFormat::Bmp }),
        "tga" => Box::new(StillCodec { format: ImageFormat::Tga }),
        "ico" => Box::new(StillCodec { format: ImageFormat::Ico }),
        "webp" => Box::new(StillCodec {
            format: ImageFormat::WebP,
        }),
        _ => return Err(EditorError::UnsupportedFormat(path.to_path_buf())),
    };
    Ok(codec)
}

/// Read every frame of the file at `path`.
pub fn read_animation(path: &Path) -> Result<Vec<AnimationFrame>> {
    let codec = codec_for_path(path)?;
    let bytes = std::fs::read(path)?;
    let frames = codec.decode_sequence(&bytes)?;
    log_info!("Read {} frame(s) from {}", frames.len(), path.display());
    Ok(frames)
}

/// Encode `frames` with the codec matching `path` and write the file.
pub fn write_animation(path: &Path, frames: &[RgbaImage], fps: f32) -> Result<()> {
    write_animation_with(codec_for_path(path)?.as_ref(), path, frames, fps)
}

pub fn write_animation_with(codec: &dyn AnimationCodec, path: &Path, frames: &[RgbaImage], fps: f32) -> Result<()> {
    let bytes = codec.encode_sequence(frames, fps)?;
    std::fs::write(path, bytes)?;
    log_info!("Wrote {} frame(s) to {}", frames.len(), path.display());
    Ok(())
}
