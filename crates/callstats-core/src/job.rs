//! Declarative description of one aggregation job.
//!
//! A job says which columns to resolve, how to bucket timestamps, which rows to
//! keep, what to group by and how to shape the final report. Jobs come from a
//! built-in preset or from a JSON file, and are validated before any input is
//! read.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CallStatsError, Result};
use crate::models::{Dimension, LogicalField};
use crate::shifts::ShiftScheme;

pub const DEFAULT_BATCH_SIZE: usize = 100_000;
pub const DEFAULT_DELIMITER: char = ';';

/// Names of the built-in presets, in the order they are listed in `--help`.
pub const PRESET_NAMES: &[&str] = &[
    "agent-drops",
    "agent-shift",
    "agent-daily",
    "shift-daily",
    "shift-monthly",
    "long-calls",
    "shift-distribution",
    "daily-agents",
];

// ── ColumnRule ────────────────────────────────────────────────────────────────

/// Maps a logical field to the first header containing `keyword`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub field: LogicalField,
    pub keyword: String,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Fail when more than one header contains the keyword.
    #[serde(default)]
    pub unique: bool,
}

fn default_required() -> bool {
    true
}

impl ColumnRule {
    pub fn required(field: LogicalField, keyword: &str) -> Self {
        Self {
            field,
            keyword: keyword.to_string(),
            required: true,
            unique: false,
        }
    }
}

/// Keyword rules used by the presets.
pub fn default_rule(field: LogicalField) -> ColumnRule {
    let keyword = match field {
        LogicalField::AgentName => "Agente",
        LogicalField::EventTimestamp => "Inicio",
        LogicalField::DropOrigin => "Origen Corte",
        LogicalField::Disposition => "Tipificación",
        LogicalField::TalkingTime => "TalkingTime",
    };
    ColumnRule::required(field, keyword)
}

// ── FilterConfig ──────────────────────────────────────────────────────────────

/// Optional row filters, applied in the order the fields are declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Keep rows whose drop origin equals this value (trimmed, case-insensitive).
    pub drop_origin: Option<String>,
    /// Drop rows whose disposition equals this value (trimmed, case-insensitive).
    pub exclude_disposition: Option<String>,
    /// Keep rows whose talking time is strictly greater than this many seconds.
    pub min_talking_time: Option<f64>,
    /// Keep only these agents (trimmed, exact match).
    pub allowed_agents: Option<Vec<String>>,
    /// Keep only events in this calendar month (1-12).
    pub month: Option<u32>,
}

// ── JobConfig ─────────────────────────────────────────────────────────────────

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_value_label() -> String {
    "Cantidad".to_string()
}

/// Every knob of one aggregation run apart from the input and output paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub columns: Vec<ColumnRule>,
    #[serde(default)]
    pub scheme: ShiftScheme,
    #[serde(default)]
    pub filters: FilterConfig,
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub pivot: Option<Dimension>,
    #[serde(default)]
    pub total_row: bool,
    #[serde(default)]
    pub total_column: bool,
    /// Header of the single value column when the report is not pivoted.
    #[serde(default = "default_value_label")]
    pub value_label: String,
    /// Prepended to every pivoted column label, e.g. `"Cortes Turno "`.
    #[serde(default)]
    pub column_prefix: Option<String>,
}

impl JobConfig {
    fn base(name: &str, fields: &[LogicalField], dimensions: Vec<Dimension>) -> Self {
        Self {
            name: name.to_string(),
            delimiter: DEFAULT_DELIMITER,
            batch_size: DEFAULT_BATCH_SIZE,
            columns: fields.iter().map(|f| default_rule(*f)).collect(),
            scheme: ShiftScheme::default(),
            filters: FilterConfig::default(),
            dimensions,
            pivot: None,
            total_row: false,
            total_column: false,
            value_label: default_value_label(),
            column_prefix: None,
        }
    }

    /// Build one of the built-in jobs by name.
    pub fn preset(name: &str) -> Result<Self> {
        use LogicalField::*;

        let agent_origin = Some("Agente".to_string());
        let job = match name {
            // Agent-initiated drops per agent, with a grand total.
            "agent-drops" => Self {
                filters: FilterConfig {
                    drop_origin: agent_origin,
                    ..Default::default()
                },
                total_row: true,
                value_label: "Cantidad de Cortes".to_string(),
                ..Self::base(
                    name,
                    &[AgentName, DropOrigin, EventTimestamp],
                    vec![Dimension::Agent],
                )
            },
            // Agent-initiated drops per agent and binned shift.
            "agent-shift" => Self {
                scheme: ShiftScheme::four_way_bins(),
                filters: FilterConfig {
                    drop_origin: agent_origin,
                    ..Default::default()
                },
                pivot: Some(Dimension::Shift),
                column_prefix: Some("Cortes Turno ".to_string()),
                ..Self::base(
                    name,
                    &[AgentName, DropOrigin, EventTimestamp],
                    vec![Dimension::Agent, Dimension::Shift],
                )
            },
            // Agent-initiated drops per agent and day, long form.
            "agent-daily" => Self {
                filters: FilterConfig {
                    drop_origin: agent_origin,
                    ..Default::default()
                },
                value_label: "Cantidad de Cortes".to_string(),
                ..Self::base(
                    name,
                    &[AgentName, DropOrigin, EventTimestamp],
                    vec![Dimension::Agent, Dimension::Date],
                )
            },
            // Disposed agent-initiated drops per day and shift window.
            "shift-daily" | "shift-monthly" => {
                let period = if name == "shift-daily" {
                    Dimension::Date
                } else {
                    Dimension::Month
                };
                Self {
                    filters: FilterConfig {
                        drop_origin: agent_origin,
                        exclude_disposition: Some("No Disp.".to_string()),
                        ..Default::default()
                    },
                    pivot: Some(Dimension::Shift),
                    column_prefix: Some("Cantidad ".to_string()),
                    ..Self::base(
                        name,
                        &[EventTimestamp, DropOrigin, Disposition],
                        vec![period, Dimension::Shift],
                    )
                }
            }
            // Calls over one minute per agent and binned shift.
            "long-calls" => Self {
                scheme: ShiftScheme::four_way_bins(),
                filters: FilterConfig {
                    min_talking_time: Some(60.0),
                    ..Default::default()
                },
                pivot: Some(Dimension::Shift),
                column_prefix: Some("Llamadas Largas ".to_string()),
                ..Self::base(
                    name,
                    &[AgentName, TalkingTime, EventTimestamp],
                    vec![Dimension::Agent, Dimension::Shift],
                )
            },
            // Agent-initiated drops per day with one column per agent and a
            // per-day total, the feed for stacked daily charts.
            "daily-agents" => Self {
                filters: FilterConfig {
                    drop_origin: agent_origin,
                    ..Default::default()
                },
                pivot: Some(Dimension::Agent),
                total_column: true,
                value_label: "Cantidad de Cortes".to_string(),
                ..Self::base(
                    name,
                    &[AgentName, DropOrigin, EventTimestamp],
                    vec![Dimension::Date, Dimension::Agent],
                )
            },
            // Every event per shift window, morning starting 9:30.
            "shift-distribution" => Self {
                scheme: ShiftScheme::fixed_window(9.5),
                ..Self::base(name, &[EventTimestamp], vec![Dimension::Shift])
            },
            other => {
                return Err(CallStatsError::Config(format!(
                    "unknown report preset \"{other}\" (expected one of {})",
                    PRESET_NAMES.join(", ")
                )))
            }
        };
        Ok(job)
    }

    /// Load a job from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| CallStatsError::SourceUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The rule for `field`, if the job declares one.
    pub fn rule_for(&self, field: LogicalField) -> Option<&ColumnRule> {
        self.columns.iter().find(|r| r.field == field)
    }

    /// The delimiter as the single byte the reader and writer expect.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                CallStatsError::Config(format!(
                    "delimiter {:?} must be a single ASCII character",
                    self.delimiter
                ))
            })
    }

    /// Index of `dimension` in the grouping key.
    pub fn dimension_index(&self, dimension: Dimension) -> Option<usize> {
        self.dimensions.iter().position(|d| *d == dimension)
    }

    /// Check internal consistency. Called before any input is opened.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CallStatsError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        self.delimiter_byte()?;
        if self.dimensions.is_empty() {
            return Err(CallStatsError::Config(
                "at least one grouping dimension is required".to_string(),
            ));
        }
        let unique: BTreeSet<_> = self.dimensions.iter().collect();
        if unique.len() != self.dimensions.len() {
            return Err(CallStatsError::Config(format!(
                "grouping dimensions repeat: {:?}",
                self.dimensions
            )));
        }
        if let Some(pivot) = self.pivot {
            if !self.dimensions.contains(&pivot) {
                return Err(CallStatsError::Config(format!(
                    "pivot dimension {pivot} is not one of the grouping dimensions"
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for rule in &self.columns {
            if !seen.insert(rule.field) {
                return Err(CallStatsError::Config(format!(
                    "column rule for {} declared twice",
                    rule.field
                )));
            }
            if rule.keyword.is_empty() {
                return Err(CallStatsError::Config(format!(
                    "column rule for {} has an empty keyword",
                    rule.field
                )));
            }
        }

        // Timestamps are always classified; every other field only when used.
        self.require_field(LogicalField::EventTimestamp, "shift classification")?;
        for dimension in &self.dimensions {
            self.require_field(dimension.source_field(), &format!("the {dimension} dimension"))?;
        }
        if self.filters.drop_origin.is_some() {
            self.require_field(LogicalField::DropOrigin, "the drop origin filter")?;
        }
        if self.filters.exclude_disposition.is_some() {
            self.require_field(LogicalField::Disposition, "the disposition filter")?;
        }
        if self.filters.min_talking_time.is_some() {
            self.require_field(LogicalField::TalkingTime, "the talking time filter")?;
        }
        if self.filters.allowed_agents.is_some() {
            self.require_field(LogicalField::AgentName, "the agent allow-list")?;
        }
        if let Some(month) = self.filters.month {
            if !(1..=12).contains(&month) {
                return Err(CallStatsError::Config(format!(
                    "month filter {month} is not between 1 and 12"
                )));
            }
        }

        self.scheme.validate()
    }

    fn require_field(&self, field: LogicalField, used_by: &str) -> Result<()> {
        match self.rule_for(field) {
            Some(rule) if rule.required => Ok(()),
            Some(_) => Err(CallStatsError::Config(format!(
                "column rule for {field} must be required: it is used by {used_by}"
            ))),
            None => Err(CallStatsError::Config(format!(
                "no column rule for {field}, which is used by {used_by}"
            ))),
        }
    }
}

/// Read an agent allow-list: one name per line, blank lines and `#` comments
/// ignored.
pub fn load_agent_list(path: &Path) -> Result<Vec<String>> {
    let content =
        std::fs::read_to_string(path).map_err(|source| CallStatsError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
