//! Concurrency coordinator for file hashing
//!
//! Collects every file lacking a valid cache entry into a work queue,
//! hashes them across a bounded pool of homogeneous workers, and merges
//! the results back into the tree on the coordinating thread. Workers
//! never touch the tree or the cache; each file's digest slot is written
//! exactly once, either here during cache assignment or during the merge.
//! Aggregation only runs after this function returns, so every descendant
//! digest a directory needs is in place by then.

use crate::cache::DigestCache;
use crate::content;
use crate::error::{is_fatal, NodeError, ScanError};
use crate::tree::node::Node;
use crate::types::Digest;
use std::collections::HashMap;
use std::path::PathBuf;
use std::thread;
use tracing::{debug, warn};

/// Counters for one root's hashing phase.
///
/// `files_hashed` is the observable that proves cache correctness: a
/// second scan of an unchanged tree must report zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Files whose bytes were actually read and hashed this run.
    pub files_hashed: usize,
    /// Files whose digest came from the cache.
    pub cache_hits: usize,
    /// Nodes that ended the run with an error marker.
    pub errors: usize,
}

struct FileJob {
    path: PathBuf,
    size: u64,
    modified: i64,
}

type JobResult = (FileJob, Result<Digest, std::io::Error>);

/// Hash every pending file in the tree using at most
/// `min(available parallelism, max_workers)` worker threads.
pub fn hash_tree(
    tree: &mut Node,
    cache: &DigestCache,
    max_workers: usize,
) -> Result<ScanStats, ScanError> {
    let mut stats = ScanStats::default();
    let mut jobs = Vec::new();
    collect_jobs(tree, cache, &mut jobs, &mut stats);

    if jobs.is_empty() {
        debug!(cache_hits = stats.cache_hits, "no files to hash");
        return Ok(stats);
    }

    let workers = num_cpus::get().min(max_workers).max(1).min(jobs.len());
    debug!(jobs = jobs.len(), workers, "dispatching hash work");

    let results = run_pool(jobs, workers);
    let mut by_path: HashMap<PathBuf, Result<Digest, std::io::Error>> = HashMap::new();
    for (job, result) in results {
        if let Ok(digest) = &result {
            cache.insert(job.path.clone(), job.size, job.modified, *digest);
        }
        by_path.insert(job.path, result);
    }

    merge_results(tree, &mut by_path, &mut stats)?;
    Ok(stats)
}

/// Assign cache hits immediately; queue everything else.
fn collect_jobs(
    node: &mut Node,
    cache: &DigestCache,
    jobs: &mut Vec<FileJob>,
    stats: &mut ScanStats,
) {
    match node {
        Node::File(file) => {
            if file.error.is_some() {
                stats.errors += 1;
                return;
            }
            if let Some(digest) = cache.lookup(&file.path, file.size, file.modified) {
                file.content_digest = Some(digest);
                stats.cache_hits += 1;
            } else {
                jobs.push(FileJob {
                    path: file.path.clone(),
                    size: file.size,
                    modified: file.modified,
                });
            }
        }
        Node::Directory(dir) => {
            if dir.error.is_some() {
                stats.errors += 1;
            }
            for child in &mut dir.children {
                collect_jobs(child, cache, jobs, stats);
            }
        }
    }
}

/// Run the fixed pool to completion and gather every result.
///
/// Jobs flow through one MPMC channel, results through another; closing
/// the job sender is what terminates the workers. All results are drained
/// before returning so no mapping or handle outlives the pool.
fn run_pool(jobs: Vec<FileJob>, workers: usize) -> Vec<JobResult> {
    let (job_tx, job_rx) = flume::unbounded::<FileJob>();
    let (result_tx, result_rx) = flume::unbounded::<JobResult>();

    for job in jobs {
        // Receiver outlives this loop; an unbounded channel cannot refuse.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let result = content::hash_file(&job.path, job.size);
                    if result_tx.send((job, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);
        result_rx.iter().collect()
    })
}

/// Fold worker results into the tree on the coordinating thread.
fn merge_results(
    node: &mut Node,
    results: &mut HashMap<PathBuf, Result<Digest, std::io::Error>>,
    stats: &mut ScanStats,
) -> Result<(), ScanError> {
    match node {
        Node::File(file) => {
            if file.error.is_some() || file.content_digest.is_some() {
                return Ok(());
            }
            match results.remove(&file.path) {
                Some(Ok(digest)) => {
                    file.content_digest = Some(digest);
                    stats.files_hashed += 1;
                }
                Some(Err(e)) if is_fatal(&e) => {
                    return Err(ScanError::Fatal {
                        path: file.path.clone(),
                        reason: e.to_string(),
                    });
                }
                Some(Err(e)) => {
                    warn!(path = %file.path.display(), error = %e, "file hashing failed");
                    file.error = Some(NodeError::from_io(&e));
                    stats.errors += 1;
                }
                None => {
                    // Every pending file was queued; a missing result
                    // means the job was lost, which must not go unnoticed.
                    warn!(path = %file.path.display(), "no hash result for pending file");
                    file.error = Some(NodeError::IoFailure);
                    stats.errors += 1;
                }
            }
            Ok(())
        }
        Node::Directory(dir) => {
            for child in &mut dir.children {
                merge_results(child, results, stats)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::{DirectoryNode, FileNode};
    use crate::tree::Walker;
    use sha2::{Digest as _, Sha256};
    use std::fs;
    use tempfile::TempDir;

    fn scan_tree(root: &std::path::Path) -> Node {
        Walker::new(root.to_path_buf()).walk().unwrap()
    }

    #[test]
    fn test_hashes_all_files_on_cold_cache() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("b.txt"), "beta").unwrap();

        let cache = DigestCache::in_memory();
        let mut tree = scan_tree(root);
        let stats = hash_tree(&mut tree, &cache, 4).unwrap();

        assert_eq!(stats.files_hashed, 2);
        assert_eq!(stats.cache_hits, 0);

        let mut digests = Vec::new();
        tree.visit(&mut |n| {
            if let Node::File(f) = n {
                digests.push(f.content_digest);
            }
        });
        assert!(digests.iter().all(Option::is_some));
    }

    #[test]
    fn test_warm_cache_skips_hashing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "alpha").unwrap();

        let cache = DigestCache::in_memory();
        let mut first = scan_tree(root);
        let stats1 = hash_tree(&mut first, &cache, 4).unwrap();
        assert_eq!(stats1.files_hashed, 1);

        let mut second = scan_tree(root);
        let stats2 = hash_tree(&mut second, &cache, 4).unwrap();
        assert_eq!(stats2.files_hashed, 0);
        assert_eq!(stats2.cache_hits, 1);

        assert_eq!(first.content_digest().is_some(), second.content_digest().is_some());
    }

    #[test]
    fn test_digest_matches_direct_sha256() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "known bytes").unwrap();

        let cache = DigestCache::in_memory();
        let mut tree = scan_tree(root);
        hash_tree(&mut tree, &cache, 1).unwrap();

        let expected: Digest = Sha256::digest(b"known bytes").into();
        match &tree {
            Node::Directory(d) => match &d.children[0] {
                Node::File(f) => assert_eq!(f.content_digest, Some(expected)),
                _ => panic!("expected file"),
            },
            _ => panic!("expected directory"),
        }
    }

    #[test]
    fn test_vanished_file_becomes_error_node() {
        // A tree built by hand with a path that no longer exists models a
        // file deleted between enumeration and hashing.
        let mut tree = Node::Directory(DirectoryNode {
            path: PathBuf::from("/nonexistent-root"),
            name: "root".to_string(),
            modified: 0,
            children: vec![Node::File(FileNode {
                path: PathBuf::from("/nonexistent-root/ghost.txt"),
                name: "ghost.txt".to_string(),
                size: 4,
                modified: 1,
                content_digest: None,
                error: None,
            })],
            content_digest: None,
            structure_digest: None,
            error: None,
        });

        let cache = DigestCache::in_memory();
        let stats = hash_tree(&mut tree, &cache, 2).unwrap();
        assert_eq!(stats.files_hashed, 0);
        assert_eq!(stats.errors, 1);

        match &tree {
            Node::Directory(d) => match &d.children[0] {
                Node::File(f) => assert_eq!(f.error, Some(NodeError::Vanished)),
                _ => panic!("expected file"),
            },
            _ => panic!("expected directory"),
        }
    }

    #[test]
    fn test_worker_cap_of_one_still_completes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for i in 0..20 {
            fs::write(root.join(format!("f{:02}", i)), format!("payload {}", i)).unwrap();
        }

        let cache = DigestCache::in_memory();
        let mut tree = scan_tree(root);
        let stats = hash_tree(&mut tree, &cache, 1).unwrap();
        assert_eq!(stats.files_hashed, 20);
    }

    #[test]
    fn test_stages_cache_inserts_for_hashed_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "alpha").unwrap();

        let cache = DigestCache::in_memory();
        let mut tree = scan_tree(root);
        hash_tree(&mut tree, &cache, 2).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
