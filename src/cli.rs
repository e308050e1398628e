// ============================================================================
// PixelFrame CLI: headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   pixelframe -i walk.gif --op flip-h -o walk_mirrored.gif
//   pixelframe -i sprite.png --op invert --op rotate-right -o out.png
//   pixelframe -i "frames/*.gif" --op grayscale --output-dir gray/ --fps 12
//   pixelframe -i walk.gif -o walk.png            (re-encode as APNG)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use crate::error::{EditorError, Result};
use crate::io::{codec_for_path_with_colors, write_animation_with};
use crate::ops::Transform;
use crate::project::Project;
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

/// PixelFrame headless animation processor.
#[derive(Parser, Debug)]
#[command(
    name = "pixelframe",
    about = "PixelFrame headless batch processor for images and animations",
    long_about = "Apply pixel transforms to every layer of every frame of an image or\n\
                  animation and write the result. Reads and writes GIF and PNG/APNG;\n\
                  JPEG, WEBP, BMP, TGA and ICO load and save as single frames.\n\n\
                  Example:\n  \
                  pixelframe -i walk.gif --op flip-h -o walk_mirrored.gif\n  \
                  pixelframe -i \"*.gif\" --op grayscale --output-dir gray/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.gif", "sprites/*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Files keep their stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format extension (gif, png, jpg, webp, bmp, tga, ico).
    /// When omitted it comes from --output, else from the input file.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Transform to apply, in order. Repeatable.
    #[arg(long = "op", value_enum, value_name = "OP")]
    pub ops: Vec<CliOp>,

    /// Playback speed of the written animation. Defaults to the input's own.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// GIF palette size (2-256). Defaults to the settings file value.
    #[arg(long, value_name = "2-256")]
    pub max_colors: Option<u16>,

    /// Echo the session log to stderr and print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Whole-layer transforms reachable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CliOp {
    FlipH,
    FlipV,
    Invert,
    Grayscale,
    RotateLeft,
    RotateRight,
}

impl CliOp {
    pub fn transform(self) -> Transform {
        match self {
            CliOp::FlipH => Transform::FlipHorizontal,
            CliOp::FlipV => Transform::FlipVertical,
            CliOp::Invert => Transform::Invert,
            CliOp::Grayscale => Transform::Grayscale,
            CliOp::RotateLeft => Transform::RotateLeft,
            CliOp::RotateRight => Transform::RotateRight,
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = EditorSettings::load();

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let max_colors = args.max_colors.unwrap_or(settings.gif_max_colors).clamp(2, 256);
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            args.format.as_deref(),
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        let job = Job {
            input: input_path,
            output: &output_path,
            ops: &args.ops,
            fps: args.fps,
            max_colors,
            settings: &settings,
        };
        match job.run() {
            Ok(frames) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({} frame(s), {:.0}ms)",
                        output_path.display(),
                        frames,
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

struct Job<'a> {
    input: &'a Path,
    output: &'a Path,
    ops: &'a [CliOp],
    fps: Option<f32>,
    max_colors: u16,
    settings: &'a EditorSettings,
}

impl Job<'_> {
    /// Load, transform, and write one file. Returns the frame count written.
    fn run(&self) -> Result<usize> {
        let in_codec = codec_for_path_with_colors(self.input, self.max_colors)?;
        let bytes = std::fs::read(self.input)?;
        let mut project = Project::from_animation(in_codec.as_ref(), &bytes, self.settings)?;
        project.name = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| project.name.clone());

        for frame in project.frames_mut() {
            for layer in frame.layers_mut() {
                for op in self.ops {
                    layer.apply_transform(op.transform())?;
                }
            }
        }

        if let Some(fps) = self.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(EditorError::Encode(format!("invalid --fps value {}", fps)));
            }
            project.animation_fps = fps;
        }

        let frames = project.export_animation_frames()?;
        let out_codec = codec_for_path_with_colors(self.output, self.max_colors)?;
        write_animation_with(out_codec.as_ref(), self.output, &frames, project.animation_fps)?;
        log_info!(
            "{} -> {}: {} frame(s), {} op(s)",
            self.input.display(),
            self.output.display(),
            frames.len(),
            self.ops.len()
        );
        Ok(frames.len())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: next to the input, with `_out` appended to the stem when the
///    name would collide with the input itself
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: Option<&str>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = match format {
        Some(f) => f.trim_start_matches('.').to_lowercase(),
        None => input.extension()?.to_string_lossy().to_lowercase(),
    };
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
