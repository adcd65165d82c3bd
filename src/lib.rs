//! Syntegrity: dual-hash directory integrity scanning
//!
//! Computes two complementary SHA-256 fingerprints for every directory in
//! a tree: a content hash over the bytes of everything beneath it, and a
//! structure hash over the names, kinds, sizes, and modification times of
//! its children. Unchanged trees hash identically across runs; any
//! relevant change trips the affected ancestors.

pub mod cache;
pub mod changes;
pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod report;
pub mod scan;
pub mod scheduler;
pub mod tree;
pub mod types;
