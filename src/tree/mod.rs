//! Filesystem scan tree
//!
//! An owned tree of file and directory nodes built in a single walk, then
//! annotated post-order with content and structure digests.

pub mod hasher;
pub mod node;
pub mod path;
pub mod walker;

pub use node::{DirectoryNode, FileNode, Node};
pub use walker::{Walker, WalkerConfig};
