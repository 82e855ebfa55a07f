//! Interactive editing session for a mind map.
//!
//! [`Session`] owns the entity store and turns pointer, keyboard and
//! clipboard input into graph changes, recording each one in a bounded
//! undo history and persisting it through an optional [`LocalStore`].
//!
//! [`LocalStore`]: mindmap_storage::LocalStore

pub mod clipboard;
pub mod decode;
pub mod frame;
pub mod history;
pub mod input;
pub mod session;
pub mod settings;

pub use clipboard::{TextIntake, classify_text};
pub use decode::{DecodeError, ImageDecoder};
pub use frame::{RenderFrame, RubberBand};
pub use history::{History, HistoryEntry};
pub use input::{ClipboardContent, Key, Modifiers, PointerButton};
pub use session::{Mode, Session};
pub use settings::{AdjustSettings, LayoutSettings, NodeDefaults, SessionSettings};
