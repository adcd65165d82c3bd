//! Report rendering
//!
//! Turns an aggregated tree into the three user-facing outputs: the files
//! phase (one line per hashed file), the folders phase (one line per
//! directory with both digests), and the nested structure rendering.
//! Nodes that errored are omitted here; their diagnostics went to the log
//! stream during the scan.

use crate::tree::Node;
use crate::types::{to_hex, Digest};
use std::path::Path;

/// Files-phase line: `<absolute path>: <64-hex digest>`.
pub fn file_line(path: &Path, digest: &Digest) -> String {
    format!("{}: {}", path.display(), to_hex(digest))
}

/// Folders-phase line: `<basename>:[<hex content>];[<hex structure>]`.
pub fn folder_line(name: &str, content: &Digest, structure: &Digest) -> String {
    format!("{}:[{}];[{}]", name, to_hex(content), to_hex(structure))
}

/// One line per successfully hashed file, sorted by path.
pub fn file_lines(tree: &Node) -> Vec<String> {
    let mut files = Vec::new();
    tree.visit(&mut |node| {
        if let Node::File(f) = node {
            if f.error.is_none() {
                if let Some(digest) = &f.content_digest {
                    files.push((f.path.clone(), *digest));
                }
            }
        }
    });
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
        .iter()
        .map(|(path, digest)| file_line(path, digest))
        .collect()
}

/// One line per directory, parents before children.
pub fn folder_lines(tree: &Node) -> Vec<String> {
    let mut lines = Vec::new();
    tree.visit(&mut |node| {
        if let Node::Directory(d) = node {
            if let (Some(content), Some(structure)) = (&d.content_digest, &d.structure_digest) {
                lines.push(folder_line(&d.name, content, structure));
            }
        }
    });
    lines
}

/// Nested structure rendering.
///
/// Files contribute their hex digest, directories contribute
/// `<hex content>[<children>]` with siblings joined by `/`, files before
/// subdirectories at each level. The root is wrapped once more:
/// `[<root hex>[<children>]]`. An empty directory renders as `<hex>[]`.
pub fn render_structure(tree: &Node) -> String {
    match tree {
        Node::Directory(d) => {
            let content = d.content_digest.map(|h| to_hex(&h)).unwrap_or_default();
            format!("[{}[{}]]", content, level_structure(tree))
        }
        Node::File(f) => f.content_digest.map(|h| to_hex(&h)).unwrap_or_default(),
    }
}

fn level_structure(node: &Node) -> String {
    let Node::Directory(dir) = node else {
        return String::new();
    };

    let mut parts = Vec::new();
    for child in &dir.children {
        if let Node::File(f) = child {
            if f.error.is_none() {
                if let Some(digest) = &f.content_digest {
                    parts.push(to_hex(digest));
                }
            }
        }
    }
    for child in &dir.children {
        if let Node::Directory(d) = child {
            if let Some(content) = &d.content_digest {
                parts.push(format!("{}[{}]", to_hex(content), level_structure(child)));
            }
        }
    }
    parts.join("/")
}
