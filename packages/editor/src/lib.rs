//! # Letterpress Editor
//!
//! Editing engine for a mail composer body that can be rich (HTML) or plain
//! text with hard wrapping and `> ` quoting.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ session: commands, keys, undo/redo, modes   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ context + operations: one edit at a time    │
//! │  - Selection as points, before and after    │
//! │  - Payload recorded into the history log    │
//! │  - Plain text paragraphs re-wrapped/quoted  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ wrap, quote, markers, formatting, convert   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ letterpress-dom: content tree + selection   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The tree is the source of truth**: plain text is a tree too, with
//!    soft breaks and quote marks as recognizable inline nodes
//! 2. **Every edit is undoable**: operations return a payload, the session
//!    records it, and undo replays it backwards
//! 3. **Only the outermost operation records**: nested work is part of the
//!    caller's event
//!
//! ## Usage
//!
//! ```rust,ignore
//! use letterpress_editor::{EditorSession, EditorSettings, EditorMode, Key};
//!
//! let settings = EditorSettings::default().with_mode(EditorMode::Plain);
//! let mut session = EditorSession::from_html("<div>Hello</div>", settings)?;
//!
//! session.type_text(" world");
//! session.key(Key::Return);
//! session.undo();
//!
//! let text = session.export_plain();
//! ```

pub mod classify;
pub mod context;
pub mod convert;
pub mod editing;
pub mod emoticons;
pub mod errors;
pub mod export;
pub mod formatting;
pub mod geometry;
pub mod history;
pub mod linkify;
pub mod markers;
mod operations;
pub mod quote;
pub mod session;
pub mod settings;
pub mod wrap;

pub use context::EditContext;
pub use convert::{html_to_text, to_html, to_plain};
pub use errors::{EditorError, EditorResult};
pub use export::{export_html, export_plain};
pub use formatting::{Alignment, BlockFormat, StyleProperty, StyleValue};
pub use geometry::{CaretGeometry, Point, PointRange, TextGrid};
pub use history::{HistoryEntry, HistoryEvent, HistoryKind, HistoryLog, HistoryPayload, OperationTracker};
pub use session::{EditorCommand, EditorSession, Key};
pub use settings::{EditorMode, EditorSettings};

pub use letterpress_dom::{Document, Markup, NodeId, Position, Selection};
