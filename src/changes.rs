//! Cross-run change detection
//!
//! After each scan the per-root digests are saved as a JSON snapshot of
//! relative paths. The next run diffs against it and reports what changed,
//! ordered by the logical time the events must have happened: deletions
//! first, then content modifications, then additions, then folder-level
//! digest movements.

use crate::error::ScanError;
use crate::tree::Node;
use crate::types::to_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Digest snapshot of one scanned root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Relative file path -> hex content digest.
    pub files: BTreeMap<String, String>,
    /// Relative folder path ("." for the root) -> (hex content, hex structure).
    pub folders: BTreeMap<String, (String, String)>,
}

impl Snapshot {
    /// Record every successfully digested node, keyed relative to `root`.
    pub fn capture(root: &Path, tree: &Node) -> Self {
        let mut snapshot = Snapshot::default();
        tree.visit(&mut |node| {
            if node.error().is_some() {
                return;
            }
            let rel = relative_key(root, node.path());
            match node {
                Node::File(f) => {
                    if let Some(digest) = &f.content_digest {
                        snapshot.files.insert(rel, to_hex(digest));
                    }
                }
                Node::Directory(d) => {
                    if let (Some(content), Some(structure)) =
                        (&d.content_digest, &d.structure_digest)
                    {
                        snapshot
                            .folders
                            .insert(rel, (to_hex(content), to_hex(structure)));
                    }
                }
            }
        });
        snapshot
    }

    /// Load a previous snapshot. Missing or corrupt files yield an empty
    /// snapshot; change detection then reports everything as new.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return Snapshot::default(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt snapshot, treating as empty");
                Snapshot::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ScanError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ScanError::Config(format!("failed to encode snapshot: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Change kinds in logical time order; the discriminant is the sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    DeletedFile = 1,
    DeletedFolder = 2,
    ModifiedFile = 3,
    NewFolder = 4,
    NewFile = 5,
    FolderContentsChanged = 6,
    FolderStructureChanged = 7,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: String,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChangeKind::DeletedFile => write!(f, "DELETED_FILE: {}", self.path),
            ChangeKind::DeletedFolder => write!(f, "DELETED_FOLDER: {}", self.path),
            ChangeKind::ModifiedFile => write!(f, "MODIFIED_FILE: {}", self.path),
            ChangeKind::NewFolder => write!(f, "NEW_FOLDER: {}", self.path),
            ChangeKind::NewFile => write!(f, "NEW_FILE: {}", self.path),
            ChangeKind::FolderContentsChanged => write!(
                f,
                "FOLDER_CONTENTS_CHANGED: {} (files/folders added/removed)",
                self.path
            ),
            ChangeKind::FolderStructureChanged => write!(
                f,
                "FOLDER_STRUCTURE_CHANGED: {} (metadata/structure modified)",
                self.path
            ),
        }
    }
}

/// Diff two snapshots into an ordered change list.
pub fn detect(previous: &Snapshot, current: &Snapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    for path in previous.files.keys() {
        if !current.files.contains_key(path) {
            changes.push(Change {
                kind: ChangeKind::DeletedFile,
                path: path.clone(),
            });
        }
    }
    for path in previous.folders.keys() {
        if !current.folders.contains_key(path) {
            changes.push(Change {
                kind: ChangeKind::DeletedFolder,
                path: path.clone(),
            });
        }
    }
    for (path, digest) in &current.files {
        match previous.files.get(path) {
            Some(old) if old != digest => changes.push(Change {
                kind: ChangeKind::ModifiedFile,
                path: path.clone(),
            }),
            Some(_) => {}
            None => changes.push(Change {
                kind: ChangeKind::NewFile,
                path: path.clone(),
            }),
        }
    }
    for (path, (content, structure)) in &current.folders {
        match previous.folders.get(path) {
            Some((old_content, old_structure)) => {
                if old_content != content {
                    changes.push(Change {
                        kind: ChangeKind::FolderContentsChanged,
                        path: path.clone(),
                    });
                }
                if old_structure != structure {
                    changes.push(Change {
                        kind: ChangeKind::FolderStructureChanged,
                        path: path.clone(),
                    });
                }
            }
            None => changes.push(Change {
                kind: ChangeKind::NewFolder,
                path: path.clone(),
            }),
        }
    }

    changes.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.path.cmp(&b.path)));
    changes
}

/// Snapshot file for a root: `<dir>/<root with separators flattened>.json`.
pub fn snapshot_path(snapshot_dir: &Path, root: &Path) -> PathBuf {
    let flattened: String = root
        .to_string_lossy()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
        .collect();
    snapshot_dir.join(format!("{}.json", flattened.trim_start_matches('_')))
}

fn relative_key(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().to_string(),
        Err(_) => path.to_string_lossy().to_string(),
    }
}
