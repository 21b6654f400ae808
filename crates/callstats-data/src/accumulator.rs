//! Run-wide counts built by folding batch results together.

use std::collections::BTreeMap;

use callstats_core::models::GroupKey;
use tracing::trace;

use crate::aggregator::{Diagnostics, PartialAggregate};

/// Counts per group key, kept in natural key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateTable {
    counts: BTreeMap<GroupKey, u64>,
}

impl AggregateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment(&mut self, key: GroupKey) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Count for `key`; zero when the key was never seen.
    pub fn get(&self, key: &GroupKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Add every count of `partial` into this table.
    pub fn merge(&mut self, partial: AggregateTable) {
        for (key, count) in partial.counts {
            *self.counts.entry(key).or_insert(0) += count;
        }
    }
}

/// Running totals for one job.
///
/// Threaded through the batch loop by value: each [`fold`](Self::fold)
/// consumes the accumulator and returns the updated one, so nothing else can
/// touch the totals mid-run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    table: AggregateTable,
    diagnostics: Diagnostics,
    batches: u64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one batch result into the totals.
    pub fn fold(mut self, partial: PartialAggregate) -> Self {
        self.batches += 1;
        trace!(
            batch = self.batches,
            keys = partial.table.len(),
            "Folding batch"
        );
        self.table.merge(partial.table);
        self.diagnostics.merge(partial.diagnostics);
        self
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Hand back the final table and diagnostics.
    pub fn finalize(self) -> (AggregateTable, Diagnostics) {
        (self.table, self.diagnostics)
    }
}
