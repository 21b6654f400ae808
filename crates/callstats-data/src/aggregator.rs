//! Per-batch filtering, classification and counting.
//!
//! [`ChunkAggregator`] turns one [`Batch`] into a batch-local
//! [`AggregateTable`] plus [`Diagnostics`]. It performs no I/O and keeps no
//! state between batches; folding the partial results together is the
//! accumulator's job.

use std::collections::{BTreeMap, HashSet};

use callstats_core::job::JobConfig;
use callstats_core::models::{
    ClassifiedEvent, DropReason, LogicalField, RowClassificationFailure,
};
use callstats_core::shifts::TimestampClassifier;
use chrono::{Datelike, NaiveDateTime};
use tracing::debug;

use crate::accumulator::AggregateTable;
use crate::reader::{Batch, RawRow};
use crate::resolver::ResolvedSchema;

/// How many offending raw timestamps are kept for the end-of-run report.
pub const INVALID_SAMPLE_LIMIT: usize = 10;

// ── Diagnostics ───────────────────────────────────────────────────────────────

/// Row accounting for a batch or a whole run.
///
/// Every row read is either counted or dropped for exactly one reason, so
/// `rows_read == rows_counted + rows_dropped()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub rows_read: u64,
    pub rows_counted: u64,
    pub dropped: BTreeMap<DropReason, u64>,
    /// First few raw timestamps that failed to parse.
    pub invalid_samples: Vec<String>,
    /// Earliest timestamp among counted events.
    pub earliest: Option<NaiveDateTime>,
    /// Latest timestamp among counted events.
    pub latest: Option<NaiveDateTime>,
}

impl Diagnostics {
    pub fn rows_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    pub fn dropped_for(&self, reason: DropReason) -> u64 {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    /// Rows dropped as invalid input (malformed, empty field, bad timestamp),
    /// as opposed to rows filtered out by the job.
    pub fn classification_failures(&self) -> u64 {
        self.dropped
            .iter()
            .filter(|(reason, _)| reason.is_classification_failure())
            .map(|(_, n)| n)
            .sum()
    }

    fn record_drop(&mut self, reason: DropReason, count: u64) {
        if count > 0 {
            *self.dropped.entry(reason).or_insert(0) += count;
        }
    }

    fn record_failure(&mut self, failure: RowClassificationFailure) {
        self.record_drop(failure.reason, 1);
        if failure.reason == DropReason::InvalidTimestamp
            && self.invalid_samples.len() < INVALID_SAMPLE_LIMIT
        {
            if let Some(raw) = failure.raw {
                self.invalid_samples.push(raw);
            }
        }
    }

    fn record_event(&mut self, timestamp: NaiveDateTime) {
        self.rows_counted += 1;
        self.earliest = Some(self.earliest.map_or(timestamp, |t| t.min(timestamp)));
        self.latest = Some(self.latest.map_or(timestamp, |t| t.max(timestamp)));
    }

    /// Fold another set of diagnostics into this one.
    ///
    /// Counts add, the date range widens; only the invalid sample list depends
    /// on merge order.
    pub fn merge(&mut self, other: Diagnostics) {
        self.rows_read += other.rows_read;
        self.rows_counted += other.rows_counted;
        for (reason, n) in other.dropped {
            self.record_drop(reason, n);
        }
        let room = INVALID_SAMPLE_LIMIT.saturating_sub(self.invalid_samples.len());
        self.invalid_samples
            .extend(other.invalid_samples.into_iter().take(room));
        self.earliest = match (self.earliest, other.earliest) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.latest = match (self.latest, other.latest) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

// ── PartialAggregate ──────────────────────────────────────────────────────────

/// Output of one batch: its local table and its row accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialAggregate {
    pub table: AggregateTable,
    pub diagnostics: Diagnostics,
}

// ── ChunkAggregator ───────────────────────────────────────────────────────────

/// Trimmed, lowercased form used by the equality filters.
fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Applies one job's filters and grouping to batches of rows.
pub struct ChunkAggregator<'a> {
    job: &'a JobConfig,
    classifier: TimestampClassifier<'a>,
    required: Vec<LogicalField>,
    drop_origin: Option<String>,
    exclude_disposition: Option<String>,
    allowed_agents: Option<HashSet<&'a str>>,
}

impl<'a> ChunkAggregator<'a> {
    pub fn new(job: &'a JobConfig, schema: &ResolvedSchema) -> Self {
        let required = job
            .columns
            .iter()
            .filter(|rule| rule.required && schema.contains(rule.field))
            .map(|rule| rule.field)
            .collect();

        Self {
            job,
            classifier: TimestampClassifier::new(&job.scheme),
            required,
            drop_origin: job.filters.drop_origin.as_deref().map(normalize),
            exclude_disposition: job.filters.exclude_disposition.as_deref().map(normalize),
            allowed_agents: job
                .filters
                .allowed_agents
                .as_ref()
                .map(|agents| agents.iter().map(|a| a.trim()).collect()),
        }
    }

    /// Run one row through the filters, in order, stopping at the first
    /// failure.
    pub fn classify_row(
        &self,
        row: &RawRow,
    ) -> std::result::Result<ClassifiedEvent, RowClassificationFailure> {
        let field = |f: LogicalField| row.get(f).unwrap_or("");

        for required in &self.required {
            if field(*required).trim().is_empty() {
                return Err(RowClassificationFailure::new(DropReason::MissingField(
                    *required,
                )));
            }
        }

        let drop_origin = field(LogicalField::DropOrigin).trim();
        if let Some(expected) = &self.drop_origin {
            if normalize(drop_origin) != *expected {
                return Err(RowClassificationFailure::new(DropReason::DropOriginMismatch));
            }
        }

        let disposition = field(LogicalField::Disposition).trim();
        if let Some(excluded) = &self.exclude_disposition {
            if normalize(disposition) == *excluded {
                return Err(RowClassificationFailure::new(DropReason::ExcludedDisposition));
            }
        }

        if let Some(threshold) = self.job.filters.min_talking_time {
            let talking = field(LogicalField::TalkingTime).trim().parse::<f64>();
            if !matches!(talking, Ok(seconds) if seconds > threshold) {
                return Err(RowClassificationFailure::new(DropReason::BelowTalkingTime));
            }
        }

        let agent = field(LogicalField::AgentName).trim();
        if let Some(allowed) = &self.allowed_agents {
            if !allowed.contains(agent) {
                return Err(RowClassificationFailure::new(DropReason::AgentNotAllowed));
            }
        }

        let shifted = self
            .classifier
            .classify(field(LogicalField::EventTimestamp))?;

        if let Some(month) = self.job.filters.month {
            if shifted.timestamp.month() != month {
                return Err(RowClassificationFailure::new(DropReason::MonthMismatch));
            }
        }

        if !self.job.scheme.retains(shifted.shift) {
            return Err(RowClassificationFailure::new(DropReason::ShiftNotRetained(
                shifted.shift,
            )));
        }

        Ok(ClassifiedEvent {
            agent_name: agent.to_string(),
            timestamp: shifted.timestamp,
            shift: shifted.shift,
            drop_origin: drop_origin.to_string(),
            disposition: disposition.to_string(),
        })
    }

    /// Count one batch into a fresh, batch-local table.
    pub fn aggregate(&self, batch: &Batch) -> PartialAggregate {
        let mut partial = PartialAggregate::default();
        partial.diagnostics.rows_read = batch.len() as u64;
        partial
            .diagnostics
            .record_drop(DropReason::MalformedRecord, batch.malformed);

        for row in &batch.rows {
            match self.classify_row(row) {
                Ok(event) => {
                    partial
                        .table
                        .increment(event.group_key(&self.job.dimensions));
                    partial.diagnostics.record_event(event.timestamp);
                }
                Err(failure) => {
                    if failure.reason == DropReason::InvalidTimestamp {
                        debug!(line = row.line, raw = ?failure.raw, "Invalid timestamp");
                    }
                    partial.diagnostics.record_failure(failure);
                }
            }
        }

        debug!(
            rows = partial.diagnostics.rows_read,
            counted = partial.diagnostics.rows_counted,
            dropped = partial.diagnostics.rows_dropped(),
            keys = partial.table.len(),
            "Batch aggregated"
        );

        partial
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
