use clap::builder::PossibleValuesParser;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use crate::error::Result;
use crate::job::{load_agent_list, JobConfig, PRESET_NAMES};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Shift-classified call statistics from delimited call-center logs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "callstats",
    about = "Shift-classified call statistics from delimited call-center logs",
    version
)]
pub struct Settings {
    /// Delimited input file, header on the first line
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Built-in report to produce
    #[arg(
        long,
        default_value = "agent-shift",
        value_parser = PossibleValuesParser::new(PRESET_NAMES.iter().copied())
    )]
    pub report: String,

    /// JSON job file; replaces the built-in report
    #[arg(long, value_name = "FILE")]
    pub job: Option<PathBuf>,

    /// Field delimiter of the input and report files
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Rows per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Report file (written to stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write the report as JSON for chart rendering
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,

    /// Agent allow-list, one name per line
    #[arg(long, value_name = "FILE")]
    pub agents: Option<PathBuf>,

    /// Morning window lower bound in fractional hours (fixed-window schemes)
    #[arg(long)]
    pub morning_start: Option<f64>,

    /// Only count events in this calendar month (1-12)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and apply the `--debug` flag.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`load`](Self::load) with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::resolve(Settings::parse_from(args))
    }

    fn resolve(mut settings: Settings) -> Settings {
        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Build the job for this run: the job file when given, otherwise the
    /// named preset, with command-line overrides applied on top. The result is
    /// validated.
    pub fn job_config(&self) -> Result<JobConfig> {
        let mut job = match &self.job {
            Some(path) => JobConfig::load_from(path)?,
            None => JobConfig::preset(&self.report)?,
        };

        if let Some(delimiter) = self.delimiter {
            job.delimiter = delimiter;
        }
        if let Some(batch_size) = self.batch_size {
            job.batch_size = batch_size;
        }
        if let Some(start) = self.morning_start {
            job.scheme.set_morning_start(start)?;
        }
        if let Some(month) = self.month {
            job.filters.month = Some(month);
        }
        if let Some(path) = &self.agents {
            let agents = load_agent_list(path)?;
            debug!(count = agents.len(), path = %path.display(), "Loaded agent allow-list");
            job.filters.allowed_agents = Some(agents);
        }

        job.validate()?;
        Ok(job)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallStatsError;
    use crate::models::Dimension;
    use crate::shifts::ShiftScheme;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::load_from_args(["callstats", "datos.csv"]);

        assert_eq!(settings.input, PathBuf::from("datos.csv"));
        assert_eq!(settings.report, "agent-shift");
        assert!(settings.job.is_none());
        assert!(settings.delimiter.is_none());
        assert!(settings.batch_size.is_none());
        assert!(settings.output.is_none());
        assert!(settings.json_output.is_none());
        assert!(settings.agents.is_none());
        assert!(settings.morning_start.is_none());
        assert!(settings.month.is_none());
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
    }

    #[test]
    fn test_debug_overrides_log_level() {
        let settings =
            Settings::load_from_args(["callstats", "datos.csv", "--log-level", "ERROR", "--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_unknown_report_rejected() {
        let result = Settings::try_parse_from(["callstats", "datos.csv", "--report", "weekly"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_month_out_of_range_rejected() {
        let result = Settings::try_parse_from(["callstats", "datos.csv", "--month", "13"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_job_config_from_preset_with_overrides() {
        let settings = Settings::load_from_args([
            "callstats",
            "datos.csv",
            "--report",
            "shift-monthly",
            "--delimiter",
            ",",
            "--batch-size",
            "500",
            "--morning-start",
            "9.5",
            "--month",
            "12",
        ]);
        let job = settings.job_config().unwrap();

        assert_eq!(job.name, "shift-monthly");
        assert_eq!(job.delimiter, ',');
        assert_eq!(job.batch_size, 500);
        assert_eq!(job.scheme, ShiftScheme::fixed_window(9.5));
        assert_eq!(job.filters.month, Some(12));
        assert_eq!(job.dimensions, vec![Dimension::Month, Dimension::Shift]);
    }

    #[test]
    fn test_job_config_morning_start_on_bins_fails() {
        let settings = Settings::load_from_args([
            "callstats",
            "datos.csv",
            "--report",
            "agent-shift",
            "--morning-start",
            "9.5",
        ]);
        assert!(matches!(
            settings.job_config(),
            Err(CallStatsError::Config(_))
        ));
    }

    #[test]
    fn test_job_config_zero_batch_size_fails() {
        let settings = Settings::load_from_args(["callstats", "datos.csv", "--batch-size", "0"]);
        assert!(settings.job_config().is_err());
    }

    #[test]
    fn test_job_config_loads_agent_list() {
        let tmp = TempDir::new().unwrap();
        let agents = tmp.path().join("agents.txt");
        std::fs::write(&agents, "MZA 33\nMZA 34\n").unwrap();

        let settings = Settings::load_from_args([
            "callstats".into(),
            "datos.csv".into(),
            "--agents".into(),
            agents.clone().into_os_string(),
        ]);
        let job = settings.job_config().unwrap();
        assert_eq!(
            job.filters.allowed_agents,
            Some(vec!["MZA 33".to_string(), "MZA 34".to_string()])
        );
    }

    #[test]
    fn test_job_config_from_job_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("job.json");
        let mut job = JobConfig::preset("agent-daily").unwrap();
        job.name = "custom-daily".to_string();
        std::fs::write(&path, serde_json::to_string(&job).unwrap()).unwrap();

        let settings = Settings::load_from_args([
            "callstats".into(),
            "datos.csv".into(),
            "--job".into(),
            path.into_os_string(),
        ]);
        let loaded = settings.job_config().unwrap();
        assert_eq!(loaded.name, "custom-daily");
    }
}
