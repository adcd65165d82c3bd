//! Single-pass filesystem walker
//!
//! Builds the complete owned [`Node`] tree in one traversal. Each
//! directory is enumerated exactly once and nothing is re-statted during
//! aggregation. Failures never abort the walk: an unreadable directory
//! becomes a Directory node with an error marker and no children, a file
//! that vanished between enumeration and stat becomes a File node with an
//! error marker and zeroed metadata.
//!
//! Symbolic links are followed when their canonical target lies inside the
//! scan root; cross-root and dangling links are recorded as error nodes.
//! Loop detection tracks only the canonical directories on the active
//! recursion stack, so a link to a sibling or already-enumerated directory
//! is still followed — only a link back into an ancestor is refused.

use crate::error::{NodeError, ScanError};
use crate::tree::node::{DirectoryNode, FileNode, Node};
use crate::tree::path;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, instrument, warn};

/// Walker configuration
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Entry names to skip entirely (exact final-segment match).
    pub ignore_names: Vec<String>,
}

/// Filesystem walker producing the scan tree for one root.
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
}

impl Walker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            config: WalkerConfig::default(),
        }
    }

    pub fn with_config(root: PathBuf, config: WalkerConfig) -> Self {
        Self { root, config }
    }

    /// Walk the root and build its tree.
    ///
    /// The root itself must be an existing directory; everything below it
    /// degrades to error nodes instead of failing the walk.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn walk(&self) -> Result<Node, ScanError> {
        let canonical_root = path::canonicalize(&self.root)?;
        let meta = fs::metadata(&canonical_root)?;
        if !meta.is_dir() {
            return Err(ScanError::InvalidPath(format!(
                "scan root is not a directory: {}",
                canonical_root.display()
            )));
        }

        let name = root_name(&canonical_root);
        let mut ancestors = HashSet::new();

        let tree = self.walk_dir(
            canonical_root.clone(),
            canonical_root.clone(),
            name,
            mtime_secs(&meta),
            &canonical_root,
            &mut ancestors,
        );
        debug!(node_count = tree.node_count(), "walk complete");
        Ok(tree)
    }

    /// Enumerate one directory. `canonical` is its link-free identity,
    /// held in `ancestors` for exactly the duration of this recursion so
    /// that descendants can detect links pointing back up the chain.
    fn walk_dir(
        &self,
        dir_path: PathBuf,
        canonical: PathBuf,
        name: String,
        modified: i64,
        canonical_root: &Path,
        ancestors: &mut HashSet<PathBuf>,
    ) -> Node {
        ancestors.insert(canonical.clone());

        let mut dir = DirectoryNode {
            path: dir_path.clone(),
            name,
            modified,
            children: Vec::new(),
            content_digest: None,
            structure_digest: None,
            error: None,
        };

        match fs::read_dir(&dir_path) {
            Ok(entries) => {
                for entry in entries {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            warn!(path = %dir_path.display(), error = %e, "directory entry unreadable");
                            continue;
                        }
                    };
                    let entry_name = entry.file_name().to_string_lossy().to_string();
                    if self.config.ignore_names.iter().any(|n| n == &entry_name) {
                        continue;
                    }
                    let child = self.visit_entry(&entry, entry_name, canonical_root, ancestors);
                    dir.children.push(child);
                }
                dir.sort_children();
            }
            Err(e) => {
                warn!(path = %dir_path.display(), error = %e, "directory enumeration failed");
                dir.error = Some(NodeError::from_io(&e));
            }
        }

        ancestors.remove(&canonical);
        Node::Directory(dir)
    }

    fn visit_entry(
        &self,
        entry: &fs::DirEntry,
        name: String,
        canonical_root: &Path,
        ancestors: &mut HashSet<PathBuf>,
    ) -> Node {
        let entry_path = entry.path();

        // DirEntry::metadata does not traverse symlinks, so links are
        // visible here and subject to the containment policy.
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %entry_path.display(), error = %e, "stat failed");
                return error_file(entry_path, name, NodeError::from_io(&e));
            }
        };

        if meta.file_type().is_symlink() {
            return self.visit_symlink(entry_path, name, canonical_root, ancestors);
        }

        if meta.is_dir() {
            let canonical =
                path::canonicalize(&entry_path).unwrap_or_else(|_| entry_path.clone());
            let modified = mtime_secs(&meta);
            self.walk_dir(
                entry_path,
                canonical,
                name,
                modified,
                canonical_root,
                ancestors,
            )
        } else {
            Node::File(FileNode {
                path: entry_path,
                name,
                size: meta.len(),
                modified: mtime_secs(&meta),
                content_digest: None,
                error: None,
            })
        }
    }

    fn visit_symlink(
        &self,
        link_path: PathBuf,
        name: String,
        canonical_root: &Path,
        ancestors: &mut HashSet<PathBuf>,
    ) -> Node {
        let target = match path::resolve_within(&link_path, canonical_root) {
            Some(target) => target,
            None => {
                warn!(path = %link_path.display(), "symlink dangling or escapes scan root");
                return error_file(link_path, name, NodeError::IoFailure);
            }
        };

        let meta = match fs::metadata(&target) {
            Ok(meta) => meta,
            Err(e) => return error_file(link_path, name, NodeError::from_io(&e)),
        };

        if meta.is_dir() {
            // A link back into the chain currently being walked would
            // recurse forever; links to anything else are fair game.
            if ancestors.contains(&target) {
                warn!(path = %link_path.display(), "symlink cycle detected");
                return error_file(link_path, name, NodeError::IoFailure);
            }
            let modified = mtime_secs(&meta);
            self.walk_dir(link_path, target, name, modified, canonical_root, ancestors)
        } else {
            Node::File(FileNode {
                path: link_path,
                name,
                size: meta.len(),
                modified: mtime_secs(&meta),
                content_digest: None,
                error: None,
            })
        }
    }
}

fn error_file(path: PathBuf, name: String, error: NodeError) -> Node {
    Node::File(FileNode {
        path,
        name,
        size: 0,
        modified: 0,
        content_digest: None,
        error: Some(error),
    })
}

fn root_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

pub(crate) fn mtime_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn child_names(node: &Node) -> Vec<String> {
        match node {
            Node::Directory(d) => d.children.iter().map(|c| c.name().to_string()).collect(),
            _ => panic!("expected directory"),
        }
    }

    #[test]
    fn test_walk_collects_files_and_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("file1.txt"), "content1").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("file2.txt"), "content2").unwrap();

        let tree = Walker::new(root.to_path_buf()).walk().unwrap();
        assert_eq!(tree.node_count(), 4);
        assert_eq!(child_names(&tree), vec!["file1.txt", "sub"]);
    }

    #[test]
    fn test_children_sorted_regardless_of_creation_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("zeta"), "z").unwrap();
        fs::write(root.join("alpha"), "a").unwrap();
        fs::write(root.join("mid"), "m").unwrap();

        let tree = Walker::new(root.to_path_buf()).walk().unwrap();
        assert_eq!(child_names(&tree), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_file_metadata_captured() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("data.bin"), vec![0u8; 42]).unwrap();

        let tree = Walker::new(root.to_path_buf()).walk().unwrap();
        match &tree {
            Node::Directory(d) => match &d.children[0] {
                Node::File(f) => {
                    assert_eq!(f.size, 42);
                    assert!(f.modified > 0);
                    assert!(f.error.is_none());
                }
                _ => panic!("expected file"),
            },
            _ => panic!("expected directory"),
        }
    }

    #[test]
    fn test_ignore_names() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("keep.txt"), "k").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git").join("config"), "c").unwrap();

        let config = WalkerConfig {
            ignore_names: vec![".git".to_string()],
        };
        let tree = Walker::with_config(root.to_path_buf(), config).walk().unwrap();
        assert_eq!(child_names(&tree), vec!["keep.txt"]);
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file_root = temp_dir.path().join("plain.txt");
        fs::write(&file_root, "x").unwrap();

        assert!(Walker::new(file_root).walk().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_becomes_error_node() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::os::unix::fs::symlink(root.join("missing"), root.join("broken")).unwrap();

        let tree = Walker::new(root.to_path_buf()).walk().unwrap();
        match &tree {
            Node::Directory(d) => {
                assert_eq!(d.children.len(), 1);
                let child = &d.children[0];
                assert!(child.error().is_some());
                assert_eq!(child.name(), "broken");
            }
            _ => panic!("expected directory"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_does_not_hang() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        // sub/loop -> root: would recurse forever if followed.
        std::os::unix::fs::symlink(root, root.join("sub").join("loop")).unwrap();

        let tree = Walker::new(root.to_path_buf()).walk().unwrap();
        let mut error_nodes = 0;
        tree.visit(&mut |n| {
            if n.error().is_some() {
                error_nodes += 1;
            }
        });
        assert_eq!(error_nodes, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_sibling_directory_symlink_is_followed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("real")).unwrap();
        fs::write(root.join("real").join("f.txt"), "payload").unwrap();
        // Whether `real` is enumerated before or after the link must not
        // matter: a sibling is never part of the active ancestor chain.
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

        let tree = Walker::new(root.to_path_buf()).walk().unwrap();
        let mut error_nodes = 0;
        tree.visit(&mut |n| {
            if n.error().is_some() {
                error_nodes += 1;
            }
        });
        assert_eq!(error_nodes, 0);

        match &tree {
            Node::Directory(d) => {
                let link = d.children.iter().find(|c| c.name() == "link").unwrap();
                match link {
                    Node::Directory(linked) => {
                        assert_eq!(linked.children.len(), 1);
                        assert_eq!(linked.children[0].name(), "f.txt");
                    }
                    _ => panic!("expected followed link to be a directory node"),
                }
            }
            _ => panic!("expected directory"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_mutual_sibling_links_terminate() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("a")).unwrap();
        fs::create_dir(root.join("b")).unwrap();
        std::os::unix::fs::symlink(root.join("b"), root.join("a").join("to_b")).unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("b").join("to_a")).unwrap();

        // a -> b -> a closes the chain (and vice versa); each direction is
        // cut exactly where it would revisit an ancestor.
        let tree = Walker::new(root.to_path_buf()).walk().unwrap();
        let mut error_nodes = 0;
        tree.visit(&mut |n| {
            if n.error().is_some() {
                error_nodes += 1;
            }
        });
        assert_eq!(error_nodes, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_internal_file_symlink_is_hashed_as_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("real.txt"), "payload").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("alias")).unwrap();

        let tree = Walker::new(root.to_path_buf()).walk().unwrap();
        match &tree {
            Node::Directory(d) => {
                let alias = d.children.iter().find(|c| c.name() == "alias").unwrap();
                match alias {
                    Node::File(f) => {
                        assert!(f.error.is_none());
                        assert_eq!(f.size, 7);
                    }
                    _ => panic!("expected file"),
                }
            }
            _ => panic!("expected directory"),
        }
    }
}
