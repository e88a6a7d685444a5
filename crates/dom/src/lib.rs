#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]
#![allow(
    clippy::min_ident_chars,
    reason = "Short variable names acceptable in tree-walking context"
)]

pub mod parser;
pub mod query;
pub mod tree;

pub use indextree::NodeId;
pub use query::Selector;
pub use tree::{Document, NodeData, NodeKind};
