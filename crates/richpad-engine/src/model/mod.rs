//! The document tree: immutable typed nodes, position addressing and the
//! slice/replace algebra every edit is built on.

pub mod node;
pub mod replace;
pub mod resolve;
pub mod slice;

pub use node::{Fragment, Node};
pub use resolve::ResolvedPos;
pub use slice::Slice;

use crate::schema::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("position {pos} outside document of size {size}")]
    OutOfRange { pos: usize, size: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplaceError {
    #[error("inserted content reaches deeper than the insertion position")]
    InsertTooDeep,
    #[error("slice ends have inconsistent open depths")]
    InconsistentOpenDepths,
    #[error("cannot join {0:?} content onto {1:?}")]
    CannotJoin(NodeKind, NodeKind),
    #[error("content not allowed in {0:?}")]
    InvalidContent(NodeKind),
    #[error(transparent)]
    Position(#[from] PositionError),
}
