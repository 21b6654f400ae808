//! Report persistence: delimited text and a JSON copy for chart rendering.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use callstats_core::error::{CallStatsError, Result};
use csv::WriterBuilder;
use tracing::{debug, info};

use crate::reshaper::Report;

fn write_records<W: Write>(out: W, report: &Report, delimiter: u8) -> csv::Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(out);

    writer.write_record(report.header())?;
    for row in report.rows.iter().chain(report.total_row.iter()) {
        let values = row.values.iter().map(u64::to_string);
        writer.write_record(row.key.iter().cloned().chain(values))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `report` to any byte sink: header line, data rows, Total row.
pub fn write_report_to<W: Write>(out: W, report: &Report, delimiter: u8) -> Result<()> {
    write_records(out, report, delimiter).map_err(|e| CallStatsError::Io(e.into()))
}

/// Write `report` to `path`, replacing any existing file.
pub fn write_report(path: &Path, report: &Report, delimiter: u8) -> Result<()> {
    let write = || -> io::Result<()> {
        let file = File::create(path)?;
        write_records(BufWriter::new(file), report, delimiter)?;
        Ok(())
    };
    write().map_err(|source| CallStatsError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        rows = report.rows.len(),
        "Report written"
    );
    Ok(())
}

/// Dump `report` unmodified as pretty JSON.
pub fn write_report_json(path: &Path, report: &Report) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).map_err(|source| CallStatsError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Report JSON written");
    Ok(())
}
