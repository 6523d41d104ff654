//! # Letterpress DOM
//!
//! The content tree the editing engine works on: an arena of element and text
//! nodes, boundary positions and the live selection, structural split/join
//! primitives, and an HTML fragment parser and serializer.

pub mod document;
pub mod errors;
pub mod lexer;
pub mod markup;
pub mod parser;
pub mod position;
pub mod serializer;
pub mod structure;

pub use document::{Document, NodeData, NodeId};
pub use errors::{DomError, DomResult};
pub use markup::Markup;
pub use parser::{is_void_element, parse_fragment};
pub use position::{PathPosition, Position, Selection, TreePath};
pub use serializer::{escape_text, to_html};
pub use structure::{Extraction, SplitPoint};
