use std::fmt::Write as _;
use std::path::Path;

use callstats_core::formatting::{format_count, percentage};
use callstats_data::PipelineResult;

/// Plain-text end-of-run summary.
pub fn render_summary(
    result: &PipelineResult,
    report_path: Option<&Path>,
    json_path: Option<&Path>,
) -> String {
    let d = &result.diagnostics;
    let mut out = String::new();

    let _ = writeln!(out, "Job:            {}", result.metadata.job);
    let _ = writeln!(out, "Rows read:      {}", format_count(d.rows_read));
    let _ = writeln!(
        out,
        "Rows counted:   {} ({}%)",
        format_count(d.rows_counted),
        percentage(d.rows_counted, d.rows_read, 1)
    );

    if !d.dropped.is_empty() {
        let _ = writeln!(out, "Rows dropped:   {}", format_count(d.rows_dropped()));
        for (reason, count) in &d.dropped {
            let _ = writeln!(out, "  {:<30} {}", reason.to_string(), format_count(*count));
        }
    }
    if !d.invalid_samples.is_empty() {
        let _ = writeln!(out, "Invalid timestamps (sample):");
        for raw in &d.invalid_samples {
            let _ = writeln!(out, "  {raw:?}");
        }
    }

    match (d.earliest, d.latest) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                out,
                "Date range:     {} - {}",
                first.format("%d/%m/%Y %H:%M"),
                last.format("%d/%m/%Y %H:%M")
            );
        }
        _ => {
            let _ = writeln!(out, "Date range:     no events counted");
        }
    }

    if let Some(path) = report_path {
        let _ = writeln!(out, "Report:         {}", path.display());
    }
    if let Some(path) = json_path {
        let _ = writeln!(out, "Report JSON:    {}", path.display());
    }
    out
}
