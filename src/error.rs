use std::path::PathBuf;

/// Errors raised by the document model and its codec collaborators.
///
/// Boundary operations (promote the topmost layer, undo at the first entry,
/// merge down the bottommost layer, ...) are silent no-ops and never show up
/// here.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("coordinate ({x}, {y}) is outside the {width}×{height} buffer")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("cannot compose image: frame has no layers")]
    EmptyFrame,
    #[error("cannot compose animation: project has no frames")]
    EmptyProject,
    #[error("no layer at index {index} (frame has {len})")]
    NoSuchLayer { index: usize, len: usize },
    #[error("no frame at index {index} (project has {len})")]
    NoSuchFrame { index: usize, len: usize },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;
