//! In-memory pixel-art document model: a [`Project`] holds ordered
//! [`Frame`]s, each frame an ordered stack of [`Layer`]s, each layer a
//! fixed-size RGBA [`PixelBuffer`] with its own undo history.

pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod frame;
pub mod io;
pub mod layer;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{PixelBuffer, Pos, SelectionRect};
pub use error::{EditorError, Result};
pub use frame::Frame;
pub use layer::Layer;
pub use project::Project;
pub use settings::EditorSettings;
