//! Dual-digest computation for the scan tree
//!
//! Every directory gets two SHA-256 digests, computed post-order (children
//! before parents):
//!
//! - **content digest**: over its children's content digests, ordered as
//!   fixed-length byte sequences. It reflects the bytes of every file
//!   beneath the directory and nothing else: renaming a file without
//!   touching its bytes leaves every ancestor's content digest intact.
//! - **structure digest**: over per-child descriptors (name, kind, size or
//!   child structure digest, modified time), sorted byte-wise by name. A
//!   directory child contributes its own structure digest, so a rename or
//!   metadata change anywhere in a subtree trips every ancestor's
//!   structure digest.
//!
//! Empty and errored nodes contribute fixed, reserved sentinel digests,
//! all pairwise distinct and domain-separated from real content.

use crate::error::NodeError;
use crate::tree::node::{DirectoryNode, Node};
use crate::types::Digest;
use sha2::{Digest as _, Sha256};
use tracing::warn;

// Domain tags. Changing any of these changes every digest this crate emits.
const TAG_DIR_CONTENT: &[u8] = b"syntegrity/v1/dir/content";
const TAG_DIR_STRUCTURE: &[u8] = b"syntegrity/v1/dir/structure";
const TAG_FILE_UNREADABLE: &[u8] = b"syntegrity/v1/sentinel/file-unreadable";
const TAG_DIR_EMPTY: &[u8] = b"syntegrity/v1/sentinel/dir-empty";
const TAG_DIR_ERROR: &[u8] = b"syntegrity/v1/sentinel/dir-error";
const TAG_STRUCTURE_EMPTY: &[u8] = b"syntegrity/v1/sentinel/structure-empty";
const TAG_STRUCTURE_ERROR: &[u8] = b"syntegrity/v1/sentinel/structure-error";

fn tag_digest(tag: &[u8]) -> Digest {
    Sha256::digest(tag).into()
}

/// Sentinel standing in for a file that could not be read.
pub fn unreadable_file_sentinel() -> Digest {
    tag_digest(TAG_FILE_UNREADABLE)
}

/// Content sentinel for a directory with zero children.
pub fn empty_directory_sentinel() -> Digest {
    tag_digest(TAG_DIR_EMPTY)
}

/// Content sentinel for a directory whose enumeration failed.
pub fn errored_directory_sentinel() -> Digest {
    tag_digest(TAG_DIR_ERROR)
}

/// Structure sentinel for a directory with zero children.
pub fn empty_structure_sentinel() -> Digest {
    tag_digest(TAG_STRUCTURE_EMPTY)
}

/// Structure sentinel for a directory whose enumeration failed.
pub fn errored_structure_sentinel() -> Digest {
    tag_digest(TAG_STRUCTURE_ERROR)
}

/// Content digest over a directory's child content digests.
///
/// The input order is irrelevant: digests are sorted here as raw byte
/// sequences, which is what makes the result independent of both readdir
/// order and child names.
pub fn directory_content_digest(mut child_digests: Vec<Digest>) -> Digest {
    child_digests.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(TAG_DIR_CONTENT);
    hasher.update((child_digests.len() as u64).to_be_bytes());
    for digest in &child_digests {
        hasher.update(digest);
    }
    hasher.finalize().into()
}

/// Frame a name into the hash stream: big-endian length prefix then bytes.
/// Length prefixes keep `("ab", "c")` and `("a", "bc")` distinct.
fn update_name(hasher: &mut Sha256, name: &str) {
    hasher.update((name.len() as u64).to_be_bytes());
    hasher.update(name.as_bytes());
}

/// Structure digest over the name-sorted immediate children of a directory.
fn directory_structure_digest(children: &[Node]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(TAG_DIR_STRUCTURE);
    hasher.update((children.len() as u64).to_be_bytes());
    for child in children {
        match child {
            Node::File(f) => {
                hasher.update(b"f");
                update_name(&mut hasher, &f.name);
                hasher.update(f.size.to_be_bytes());
                hasher.update(f.modified.to_be_bytes());
            }
            Node::Directory(d) => {
                hasher.update(b"d");
                update_name(&mut hasher, &d.name);
                // Set by the post-order recursion before the parent is hashed.
                let structure = d.structure_digest.unwrap_or_else(errored_structure_sentinel);
                hasher.update(structure);
                hasher.update(d.modified.to_be_bytes());
            }
        }
    }
    hasher.finalize().into()
}

/// The content digest a node contributes to its parent's aggregation.
fn child_content_digest(node: &Node) -> Digest {
    match node.content_digest() {
        Some(digest) => digest,
        // Post-order recursion fills every directory; only unreadable
        // files reach here.
        None => unreadable_file_sentinel(),
    }
}

/// Compute both digests for every directory in the subtree, post-order.
///
/// File nodes must already carry a content digest unless they are marked
/// with an error; errored files get the unreadable-file sentinel here so
/// ancestors always aggregate.
pub fn aggregate(node: &mut Node) {
    match node {
        Node::File(file) => {
            if file.content_digest.is_none() {
                if file.error.is_none() {
                    // A file the scheduler never hashed is a scan defect;
                    // record it rather than poisoning the whole run.
                    warn!(path = %file.path.display(), "file reached aggregation without a digest");
                    file.error = Some(NodeError::IoFailure);
                }
                file.content_digest = Some(unreadable_file_sentinel());
            }
        }
        Node::Directory(dir) => {
            for child in &mut dir.children {
                aggregate(child);
            }
            dir.content_digest = Some(compute_content(dir));
            dir.structure_digest = Some(compute_structure(dir));
        }
    }
}

fn compute_content(dir: &DirectoryNode) -> Digest {
    if dir.error.is_some() {
        return errored_directory_sentinel();
    }
    if dir.children.is_empty() {
        return empty_directory_sentinel();
    }
    let digests: Vec<Digest> = dir.children.iter().map(child_content_digest).collect();
    directory_content_digest(digests)
}

fn compute_structure(dir: &DirectoryNode) -> Digest {
    if dir.error.is_some() {
        return errored_structure_sentinel();
    }
    if dir.children.is_empty() {
        return empty_structure_sentinel();
    }
    directory_structure_digest(&dir.children)
}
