use std::path::PathBuf;
use thiserror::Error;

use crate::models::LogicalField;

/// All errors produced by the call statistics pipeline.
///
/// Every variant here is fatal for the run. Per-row problems are never raised
/// as errors; they are recorded as [`DropReason`](crate::models::DropReason)
/// counts instead.
#[derive(Error, Debug)]
pub enum CallStatsError {
    /// A required logical field has no matching header.
    #[error("Required column for {field} not found (keyword \"{keyword}\"). Headers detected: {headers:?}")]
    SchemaResolution {
        field: LogicalField,
        keyword: String,
        headers: Vec<String>,
    },

    /// A field declared unique matched more than one header.
    #[error("Column for {field} is ambiguous (keyword \"{keyword}\" matches {matches:?}). Headers detected: {headers:?}")]
    AmbiguousColumn {
        field: LogicalField,
        keyword: String,
        matches: Vec<String>,
        headers: Vec<String>,
    },

    /// The input table could not be opened or read.
    #[error("Failed to read input {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output artifact could not be written.
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A timestamp string did not match `day/month/year hour:minute[:second]`.
    #[error("Timestamp {0:?} is not day/month/year hour:minute[:second]")]
    TimestampParse(String),

    /// A job configuration value is missing or invalid.
    #[error("Invalid job configuration: {0}")]
    Config(String),

    /// A job file could not be parsed.
    #[error("Invalid job file: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// I/O failure with no path attached, e.g. writing the report to stdout.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything else, wrapped by `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CallStatsError {
    /// `true` for the schema resolution family of errors.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            CallStatsError::SchemaResolution { .. } | CallStatsError::AmbiguousColumn { .. }
        )
    }
}

/// Convenience alias used throughout the callstats crates.
pub type Result<T> = std::result::Result<T, CallStatsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_schema_resolution_lists_headers() {
        let err = CallStatsError::SchemaResolution {
            field: LogicalField::DropOrigin,
            keyword: "Origen Corte".to_string(),
            headers: vec!["Nombre Agente".to_string(), "Inicio".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("DropOrigin"));
        assert!(msg.contains("Origen Corte"));
        assert!(msg.contains("Nombre Agente"));
        assert!(msg.contains("Inicio"));
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_error_display_ambiguous_column() {
        let err = CallStatsError::AmbiguousColumn {
            field: LogicalField::AgentName,
            keyword: "Agente".to_string(),
            matches: vec!["Id Agente".to_string(), "Nombre Agente".to_string()],
            headers: vec!["Id Agente".to_string(), "Nombre Agente".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("ambiguous"));
        assert!(msg.contains("Id Agente"));
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_error_display_source_unavailable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = CallStatsError::SourceUnavailable {
            path: PathBuf::from("/data/datos.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read input"));
        assert!(msg.contains("/data/datos.csv"));
        assert!(msg.contains("no such file"));
        assert!(!err.is_schema_error());
    }

    #[test]
    fn test_error_display_write_failed() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CallStatsError::WriteFailed {
            path: PathBuf::from("/ro/out.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to write /ro/out.csv"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_error_display_timestamp_parse() {
        let err = CallStatsError::TimestampParse("31/02/2024 10:00".to_string());
        assert_eq!(
            err.to_string(),
            "Timestamp \"31/02/2024 10:00\" is not day/month/year hour:minute[:second]"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = CallStatsError::Config("batch_size must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid job configuration: batch_size must be at least 1"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: CallStatsError = io_err.into();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: CallStatsError = json_err.into();
        assert!(err.to_string().starts_with("Invalid job file"));
    }
}
