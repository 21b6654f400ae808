mod bootstrap;
mod summary;

use anyhow::{Context, Result};
use callstats_core::settings::Settings;
use callstats_data::run_pipeline;
use callstats_data::writer::{write_report, write_report_json, write_report_to};

fn main() -> Result<()> {
    let settings = Settings::load();

    let _log_guard = bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("callstats v{} starting", env!("CARGO_PKG_VERSION"));

    let job = settings.job_config().context("could not build the job")?;
    tracing::info!(
        job = %job.name,
        input = %settings.input.display(),
        batch_size = job.batch_size,
        "Running job"
    );

    let result = run_pipeline(&settings.input, &job)?;
    let delimiter = job.delimiter_byte()?;

    match &settings.output {
        Some(path) => write_report(path, &result.report, delimiter)?,
        None => write_report_to(std::io::stdout().lock(), &result.report, delimiter)?,
    }
    if let Some(path) = &settings.json_output {
        write_report_json(path, &result.report)?;
    }

    let text = summary::render_summary(
        &result,
        settings.output.as_deref(),
        settings.json_output.as_deref(),
    );
    // Keep stdout clean when it carries the report itself.
    if settings.output.is_some() {
        print!("{text}");
    } else {
        eprint!("{text}");
    }

    Ok(())
}
