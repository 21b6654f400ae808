//! Top-level aggregation pipeline.
//!
//! Resolves the header, streams the input in batches through the chunk
//! aggregator, folds every partial result into one accumulator and reshapes
//! the final table into a [`Report`].

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use callstats_core::error::Result;
use callstats_core::job::JobConfig;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::accumulator::{Accumulator, AggregateTable};
use crate::aggregator::{ChunkAggregator, Diagnostics};
use crate::reader::BatchReader;
use crate::reshaper::{reshape, Report};
use crate::resolver::resolve_schema;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the report.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// Name of the job that ran.
    pub job: String,
    /// Input headers as detected.
    pub headers: Vec<String>,
    /// Number of batches read.
    pub batches: u64,
    /// Wall-clock seconds spent reading and aggregating.
    pub aggregate_time_seconds: f64,
}

/// The complete output of one run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub report: Report,
    /// The unshaped counts the report was built from.
    pub table: AggregateTable,
    pub diagnostics: Diagnostics,
    pub metadata: RunMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run `job` over the delimited file at `input`.
pub fn run_pipeline(input: &Path, job: &JobConfig) -> Result<PipelineResult> {
    job.validate()?;
    let reader = BatchReader::open(input, job.delimiter_byte()?)?;
    run_batches(reader, job)
}

/// Run `job` over any byte source. `source` only labels errors and logs.
pub fn run_from_reader<R: Read>(reader: R, source: &Path, job: &JobConfig) -> Result<PipelineResult> {
    job.validate()?;
    let reader = BatchReader::from_reader(reader, job.delimiter_byte()?, source);
    run_batches(reader, job)
}

/// 1. Resolve the header into a schema; no row is read before this succeeds.
/// 2. Read bounded batches and aggregate each into a partial table.
/// 3. Fold every partial into the accumulator.
/// 4. Reshape the finalized table.
fn run_batches<R: Read>(mut reader: BatchReader<R>, job: &JobConfig) -> Result<PipelineResult> {
    // ── Step 1: Schema ────────────────────────────────────────────────────────
    let headers = reader.headers()?;
    let schema = resolve_schema(&headers, &job.columns)?;
    info!(job = %job.name, columns = schema.columns().len(), "Schema resolved");

    // ── Step 2/3: Batches ─────────────────────────────────────────────────────
    let start = Instant::now();
    let aggregator = ChunkAggregator::new(job, &schema);
    let mut acc = Accumulator::new();
    while let Some(batch) = reader.next_batch(&schema, job.batch_size)? {
        debug!(batch = acc.batches() + 1, rows = batch.len(), "Read batch");
        acc = acc.fold(aggregator.aggregate(&batch));
    }
    let batches = acc.batches();
    let (table, diagnostics) = acc.finalize();
    let aggregate_time = start.elapsed().as_secs_f64();

    // ── Step 4: Reshape ───────────────────────────────────────────────────────
    let report = reshape(&table, job)?;

    log_summary(&diagnostics);
    info!(
        job = %job.name,
        batches,
        rows_read = diagnostics.rows_read,
        rows_counted = diagnostics.rows_counted,
        keys = table.len(),
        elapsed_s = aggregate_time,
        "Aggregation finished"
    );

    let metadata = RunMetadata {
        generated_at: Utc::now().to_rfc3339(),
        job: job.name.clone(),
        headers: schema.headers().to_vec(),
        batches,
        aggregate_time_seconds: aggregate_time,
    };

    Ok(PipelineResult {
        report,
        table,
        diagnostics,
        metadata,
    })
}

fn log_summary(diagnostics: &Diagnostics) {
    for (reason, count) in &diagnostics.dropped {
        debug!(%reason, count, "Rows dropped");
    }
    let failures = diagnostics.classification_failures();
    if failures > 0 {
        warn!(
            failures,
            samples = ?diagnostics.invalid_samples,
            "Rows could not be classified"
        );
    }
}
