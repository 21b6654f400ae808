//! Streaming aggregation of call-center logs.
//!
//! Resolves input columns, reads the log in bounded batches, filters and
//! classifies each row, folds per-batch counts into one table and reshapes it
//! into a report.

pub mod accumulator;
pub mod aggregator;
pub mod pipeline;
pub mod reader;
pub mod reshaper;
pub mod resolver;
pub mod writer;

pub use pipeline::{run_from_reader, run_pipeline, PipelineResult};
pub use reshaper::Report;
