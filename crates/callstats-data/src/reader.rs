//! Bounded batch reading of delimited call logs.
//!
//! The reader walks the input once, reusing a single byte record buffer, and
//! decodes only the columns named by the [`ResolvedSchema`]. Bytes in other
//! columns are never inspected, so a stray Latin-1 comment cannot cost a row.
//! Resident memory is one batch of pruned rows regardless of input width.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use callstats_core::error::{CallStatsError, Result};
use callstats_core::models::LogicalField;
use csv::{ByteRecord, ErrorKind, ReaderBuilder};
use tracing::{debug, warn};

use crate::resolver::ResolvedSchema;

// ── RawRow / Batch ────────────────────────────────────────────────────────────

/// One input record pruned to the resolved columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the input, when known.
    pub line: u64,
    values: Vec<(LogicalField, String)>,
}

impl RawRow {
    pub fn new(line: u64, values: Vec<(LogicalField, String)>) -> Self {
        Self { line, values }
    }

    /// Raw value for `field`; `None` when the field is not in the schema.
    pub fn get(&self, field: LogicalField) -> Option<&str> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }
}

/// A bounded group of rows read together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub rows: Vec<RawRow>,
    /// Records in this batch whose resolved cells could not be decoded.
    pub malformed: u64,
}

impl Batch {
    /// Number of input records this batch covers, malformed ones included.
    pub fn len(&self) -> usize {
        self.rows.len() + self.malformed as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── BatchReader ───────────────────────────────────────────────────────────────

/// Streaming reader yielding [`Batch`]es of at most `batch_size` records.
pub struct BatchReader<R: Read> {
    reader: csv::Reader<R>,
    source: PathBuf,
    record: ByteRecord,
    records_read: u64,
}

impl BatchReader<File> {
    /// Open `path` for reading. Failure is fatal for the run.
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|source| CallStatsError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Opened input");
        Ok(Self::from_reader(file, delimiter, path))
    }
}

impl<R: Read> BatchReader<R> {
    /// Wrap any byte source. `source` only labels errors.
    pub fn from_reader(reader: R, delimiter: u8, source: impl Into<PathBuf>) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Self {
            reader,
            source: source.into(),
            record: ByteRecord::new(),
            records_read: 0,
        }
    }

    /// The header line, as read. Empty when the input is empty. Bytes that are
    /// not UTF-8 are replaced, so only matching headers need to be clean.
    pub fn headers(&mut self) -> Result<Vec<String>> {
        let source = &self.source;
        let headers = self
            .reader
            .byte_headers()
            .map_err(|e| CallStatsError::SourceUnavailable {
                path: source.clone(),
                source: e.into(),
            })?;
        Ok(headers
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect())
    }

    /// Total records consumed so far, malformed ones included.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read up to `batch_size` records, keeping only the schema's columns.
    ///
    /// Returns `Ok(None)` once the input is exhausted. Records with a resolved
    /// cell that is not valid UTF-8 are counted in [`Batch::malformed`]; any
    /// other read failure aborts the run.
    pub fn next_batch(
        &mut self,
        schema: &ResolvedSchema,
        batch_size: usize,
    ) -> Result<Option<Batch>> {
        let mut batch = Batch::default();

        while batch.len() < batch_size {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {
                    self.records_read += 1;
                    match self.project(schema) {
                        Some(row) => batch.rows.push(row),
                        None => {
                            batch.malformed += 1;
                            warn!(
                                record = self.records_read,
                                "Skipping record with undecodable field"
                            );
                        }
                    }
                }
                Ok(false) => break,
                Err(e) => {
                    if !matches!(e.kind(), ErrorKind::UnequalLengths { .. }) {
                        return Err(CallStatsError::SourceUnavailable {
                            path: self.source.clone(),
                            source: e.into(),
                        });
                    }
                    self.records_read += 1;
                    batch.malformed += 1;
                    warn!(record = self.records_read, error = %e, "Skipping malformed record");
                }
            }
        }

        if batch.is_empty() {
            debug!(records = self.records_read, "Input exhausted");
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    /// Decode the resolved cells of the current record. `None` when one of
    /// them is not valid UTF-8.
    fn project(&self, schema: &ResolvedSchema) -> Option<RawRow> {
        let line = self
            .record
            .position()
            .map(|p| p.line())
            .unwrap_or(self.records_read + 1);
        let values = schema
            .columns()
            .iter()
            .map(|c| {
                let bytes = self.record.get(c.index).unwrap_or_default();
                std::str::from_utf8(bytes)
                    .ok()
                    .map(|v| (c.field, v.to_string()))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(RawRow::new(line, values))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
