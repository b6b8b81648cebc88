//! Reconciler: merges name-keyed value updates into the stored placeholder list.
//!
//! Rules:
//! - every record sharing the update's `name` receives the value (fan-out)
//! - updates naming nothing are dropped silently
//! - updates apply in the given order, so the last write for a name wins
//! - records are never inserted, removed or reordered

use std::collections::HashMap;

use tracing::debug;

use crate::placeholders::models::{PlaceholderRecord, ValueUpdate};

/// Maps each placeholder name to the indices of the records carrying it.
/// Rebuilt from the current list on every call; never cached.
pub fn name_index(records: &[PlaceholderRecord]) -> HashMap<&str, Vec<usize>> {
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        if record.name.is_empty() {
            continue;
        }
        index.entry(record.name.as_str()).or_default().push(i);
    }
    index
}

/// Outcome counts for logging and responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub applied: usize,
    pub dropped: usize,
    pub records_written: usize,
}

/// Applies `updates` to `records` in place.
pub fn reconcile(records: &mut [PlaceholderRecord], updates: &[ValueUpdate]) -> ReconcileSummary {
    let index: HashMap<String, Vec<usize>> = name_index(records)
        .into_iter()
        .map(|(name, indices)| (name.to_string(), indices))
        .collect();

    let mut summary = ReconcileSummary::default();
    for update in updates {
        match index.get(update.name.as_str()) {
            Some(indices) => {
                for &i in indices {
                    records[i].value = Some(update.value.clone());
                }
                summary.applied += 1;
                summary.records_written += indices.len();
            }
            None => {
                debug!("Dropping update for unknown placeholder '{}'", update.name);
                summary.dropped += 1;
            }
        }
    }
    summary
}
