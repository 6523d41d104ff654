use crate::document::NodeId;
use thiserror::Error;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("Node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("Node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("Node {0:?} is not a text node")]
    NotText(NodeId),

    #[error("Node {0:?} is not attached to a parent")]
    Detached(NodeId),

    #[error("Offset {offset} is out of range for node {node:?}")]
    OffsetOutOfRange { node: NodeId, offset: usize },

    #[error("Node {ancestor:?} is not an ancestor of {node:?}")]
    NotAnAncestor { ancestor: NodeId, node: NodeId },

    #[error("Cannot insert {0:?} into its own subtree")]
    HierarchyViolation(NodeId),

    #[error("Parse error at {pos}: {message}")]
    Parse { pos: usize, message: String },
}

impl DomError {
    pub fn out_of_range(node: NodeId, offset: usize) -> Self {
        Self::OffsetOutOfRange { node, offset }
    }

    pub fn parse(pos: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            pos,
            message: message.into(),
        }
    }
}
