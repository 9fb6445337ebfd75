//! Metrics and details of a restore operation.

use std::fmt;

use bytesize::ByteSize;
use derive_more::Add;
use log::warn;
use serde_derive::{Deserialize, Serialize};

use crate::path::Category;

/// Counters of a collection, merged into the totals of the operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Add, Serialize, Deserialize)]
pub struct CollectionMetrics {
    /// Items seen
    pub objects: u64,
    /// Items restored
    pub successes: u64,
    /// Bytes of the restored items
    pub bytes: u64,
}

impl CollectionMetrics {
    /// Count a restored item of `size` bytes.
    pub fn add_success(&mut self, size: u64) {
        self.successes += 1;
        self.bytes += size;
    }
}

/// The details record of one restored item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsEntry {
    /// Path of the item within the backup
    pub repo_ref: String,
    /// Human readable location of the restored item
    pub location_ref: String,
    /// Category of the item
    pub category: Category,
    /// Name of the restored item
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Whether an existing item was replaced
    pub updated: bool,
}

/// Receiver of the details of restored items.
pub trait DetailsSink {
    /// Record the details of a restored item.
    ///
    /// # Errors
    ///
    /// If the entry could not be recorded.
    fn add(&mut self, entry: DetailsEntry) -> anyhow::Result<()>;
}

/// Record an entry, only logging if the sink fails.
pub(crate) fn record(sink: &mut (dyn DetailsSink + '_), entry: DetailsEntry) {
    let repo_ref = entry.repo_ref.clone();
    if let Err(err) = sink.add(entry) {
        warn!("adding details of {repo_ref} failed: {err}");
    }
}

/// A [`DetailsSink`] keeping all entries in memory.
#[derive(Debug, Clone, Default)]
pub struct DetailsBuilder {
    entries: Vec<DetailsEntry>,
}

impl DetailsBuilder {
    /// Create an empty [`DetailsBuilder`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded entries.
    #[must_use]
    pub fn entries(&self) -> &[DetailsEntry] {
        &self.entries
    }

    /// Take the recorded entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<DetailsEntry> {
        self.entries
    }
}

impl DetailsSink for DetailsBuilder {
    fn add(&mut self, entry: DetailsEntry) -> anyhow::Result<()> {
        self.entries.push(entry);
        Ok(())
    }
}

/// The status report of a restore operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    /// Number of collections handled
    pub folders: usize,
    /// Totals of all collections
    pub metrics: CollectionMetrics,
    /// Where the data was restored to
    pub destination: String,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Restore: {} of {} objects ({}) in {} folders ({})",
            self.metrics.successes,
            self.metrics.objects,
            ByteSize(self.metrics.bytes).display().iec(),
            self.folders,
            self.destination
        )
    }
}
