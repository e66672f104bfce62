// src/cache/mod.rs

//! Content-addressed incremental build state.

pub mod hash;
pub mod store;

pub use hash::compute_task_hash;
pub use store::{should_rebuild, ChecksumEntry, ChecksumStore, Checksums, CHECKSUM_FILE_NAME};
