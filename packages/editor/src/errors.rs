//! Error types for the editor

use crate::geometry::Point;
use letterpress_dom::{DomError, TreePath};
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("No node at path {0}")]
    InvalidPath(TreePath),

    #[error("Nothing is selected")]
    NoSelection,

    #[error("Selection markers are missing")]
    MissingMarkers,

    #[error("Caret point ({x}, {y}) does not map to a position")]
    UnmappedPoint { x: i32, y: i32 },

    #[error("Unknown emoticon: {0}")]
    UnknownEmoticon(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} is not available in plain text mode")]
    NotInPlainText(&'static str),

    #[error("Invalid settings: {0}")]
    Settings(String),
}

impl EditorError {
    pub fn unmapped(point: Point) -> Self {
        Self::UnmappedPoint {
            x: point.x,
            y: point.y,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
