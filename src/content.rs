//! Tiered file content hashing
//!
//! All tiers produce the identical SHA-256 of the file bytes; the split is
//! purely an I/O strategy:
//!
//! - under 1 MiB: buffered 64 KiB chunk reads
//! - 1 MiB to 10 MiB: one whole-file memory map
//! - over 10 MiB: sequential 8 MiB map windows, each unmapped before the
//!   next is mapped, bounding peak memory
//!
//! Mappings and file handles never outlive the call.

use crate::types::Digest;
use memmap2::MmapOptions;
use sha2::{Digest as _, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

const CHUNK_SIZE: usize = 64 * 1024;
const MMAP_THRESHOLD: u64 = 1024 * 1024;
const WHOLE_MAP_LIMIT: u64 = 10 * 1024 * 1024;
const WINDOW_SIZE: u64 = 8 * 1024 * 1024;

/// Hash a file's bytes with the size-appropriate strategy.
///
/// The `size` hint comes from the walker's stat; the length is re-checked
/// on the opened handle so a file that grew or shrank since enumeration is
/// still hashed over exactly the bytes present now. I/O errors are
/// returned raw; the caller classifies them (per-node marker or fatal).
pub fn hash_file(path: &Path, size: u64) -> Result<Digest, std::io::Error> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len != size {
        trace!(path = %path.display(), stat = size, open = len, "size changed since enumeration");
    }

    if len < MMAP_THRESHOLD {
        hash_chunked(file)
    } else if len <= WHOLE_MAP_LIMIT {
        hash_mapped_whole(&file)
    } else {
        hash_mapped_windows(&file, len)
    }
}

fn hash_chunked(mut file: File) -> Result<Digest, std::io::Error> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

fn hash_mapped_whole(file: &File) -> Result<Digest, std::io::Error> {
    // Safety: the map is read-only and dropped before return; concurrent
    // modification of the file would change the digest but not soundness
    // of the read.
    let mmap = unsafe { MmapOptions::new().map(file)? };
    let mut hasher = Sha256::new();
    hasher.update(&mmap[..]);
    Ok(hasher.finalize().into())
}

fn hash_mapped_windows(file: &File, len: u64) -> Result<Digest, std::io::Error> {
    let mut hasher = Sha256::new();
    let mut offset = 0u64;
    while offset < len {
        let window = (len - offset).min(WINDOW_SIZE) as usize;
        // Safety: as above; each window is unmapped at the end of the
        // iteration, before the next one is mapped.
        let mmap = unsafe { MmapOptions::new().offset(offset).len(window).map(file)? };
        hasher.update(&mmap[..]);
        offset += window as u64;
    }
    Ok(hasher.finalize().into())
}
