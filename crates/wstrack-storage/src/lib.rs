//! Durable storage for snapshots.
//!
//! The default implementation ([`log_store::LogStore`]) keeps a month-
//! partitioned, append-only CSV log. The partition a row lands in is chosen
//! from the snapshot's own timestamp, so late or skewed samples never end up
//! in the wrong month.

pub mod error;
pub mod log_store;
pub mod partition;


use std::path::PathBuf;
use wstrack_common::Snapshot;

pub use error::StoreError;
pub use log_store::LogStore;
pub use partition::{PartitionKey, PartitionLayout};

/// A partition file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub key: PartitionKey,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Persistence backend for snapshots.
///
/// Appends take `&mut self`: there is exactly one writer, the sampler.
pub trait SnapshotStore: Send {
    /// Persists one snapshot in the partition of its timestamp.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the row could not be durably written.
    /// Rows written by earlier appends are never modified.
    fn append(&mut self, snapshot: &Snapshot) -> error::Result<()>;
}
