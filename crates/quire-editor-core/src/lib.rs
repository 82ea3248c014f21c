//! quire-editor-core: editor-side document storage without framework dependencies.
//!
//! This crate provides:
//! - `TextBuffer` trait for text storage abstraction
//! - `EditorRope` - ropey-backed implementation
//! - `DocumentStore` - whole-text access consumed by the sync layer
//! - `PlainEditor<T>` - field-backed editor document
//! - `CommandRegistry` - named selection commands (formatting hooks)

pub mod commands;
pub mod document;
pub mod text;
pub mod types;

pub use commands::{CommandError, CommandRegistry, SelectionCommand};
pub use document::{DocumentStore, PlainEditor};
pub use smol_str::SmolStr;
pub use text::{EditorRope, TextBuffer};
pub use types::Selection;
