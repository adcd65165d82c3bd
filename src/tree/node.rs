//! In-memory filesystem tree nodes
//!
//! The walker builds this tree in a single pass; digests are filled in
//! afterwards, each slot written exactly once (file content digests by the
//! scheduler merge, directory digests by the aggregator).

use crate::error::NodeError;
use crate::types::Digest;
use std::path::PathBuf;

/// A file leaf with its stat metadata and (eventually) a content digest.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Absolute path, unique within a scan.
    pub path: PathBuf,
    /// Final path segment, used for deterministic ordering.
    pub name: String,
    /// Byte length at stat time; 0 when the stat failed.
    pub size: u64,
    /// Modification time, whole seconds since the Unix epoch; 0 on failure.
    pub modified: i64,
    /// SHA-256 of the file bytes, set once by the scheduler merge.
    pub content_digest: Option<Digest>,
    /// Set when the file could not be statted or read.
    pub error: Option<NodeError>,
}

/// A directory with its immediate children, sorted by name.
#[derive(Debug, Clone)]
pub struct DirectoryNode {
    pub path: PathBuf,
    pub name: String,
    pub modified: i64,
    /// Sorted byte-wise by name before any digest is computed.
    pub children: Vec<Node>,
    /// Digest over descendant content, set once by the aggregator.
    pub content_digest: Option<Digest>,
    /// Digest over immediate-child descriptors, set once by the aggregator.
    pub structure_digest: Option<Digest>,
    /// Set when enumeration failed; such a node has no children.
    pub error: Option<NodeError>,
}

/// A node in the scan tree.
#[derive(Debug, Clone)]
pub enum Node {
    File(FileNode),
    Directory(DirectoryNode),
}

impl Node {
    pub fn path(&self) -> &PathBuf {
        match self {
            Node::File(f) => &f.path,
            Node::Directory(d) => &d.path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::File(f) => &f.name,
            Node::Directory(d) => &d.name,
        }
    }

    pub fn modified(&self) -> i64 {
        match self {
            Node::File(f) => f.modified,
            Node::Directory(d) => d.modified,
        }
    }

    pub fn error(&self) -> Option<NodeError> {
        match self {
            Node::File(f) => f.error,
            Node::Directory(d) => d.error,
        }
    }

    pub fn content_digest(&self) -> Option<Digest> {
        match self {
            Node::File(f) => f.content_digest,
            Node::Directory(d) => d.content_digest,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    /// Count all nodes in this subtree, including self.
    pub fn node_count(&self) -> usize {
        match self {
            Node::File(_) => 1,
            Node::Directory(d) => 1 + d.children.iter().map(Node::node_count).sum::<usize>(),
        }
    }

    /// Visit every node in this subtree, parents before children.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        if let Node::Directory(d) = self {
            for child in &d.children {
                child.visit(f);
            }
        }
    }
}

impl DirectoryNode {
    /// Restore the sorted-children invariant. Byte-wise name ordering keeps
    /// results independent of platform and readdir order.
    pub fn sort_children(&mut self) {
        self.children
            .sort_by(|a, b| a.name().as_bytes().cmp(b.name().as_bytes()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> Node {
        Node::File(FileNode {
            path: PathBuf::from(format!("/r/{}", name)),
            name: name.to_string(),
            size: 0,
            modified: 0,
            content_digest: None,
            error: None,
        })
    }

    #[test]
    fn test_sort_children_is_bytewise() {
        let mut dir = DirectoryNode {
            path: PathBuf::from("/r"),
            name: "r".to_string(),
            modified: 0,
            children: vec![file("b"), file("A"), file("a"), file("Z")],
            content_digest: None,
            structure_digest: None,
            error: None,
        };
        dir.sort_children();

        let names: Vec<&str> = dir.children.iter().map(|c| c.name()).collect();
        // ASCII uppercase sorts before lowercase in byte order.
        assert_eq!(names, vec!["A", "Z", "a", "b"]);
    }

    #[test]
    fn test_node_count() {
        let dir = Node::Directory(DirectoryNode {
            path: PathBuf::from("/r"),
            name: "r".to_string(),
            modified: 0,
            children: vec![file("a"), file("b")],
            content_digest: None,
            structure_digest: None,
            error: None,
        });
        assert_eq!(dir.node_count(), 3);
    }
}
