use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical input field the pipeline knows how to use.
///
/// The actual header text varies between exports; the column resolver maps
/// each logical field to whatever header matches its keyword rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogicalField {
    /// Name of the agent that handled the call.
    AgentName,
    /// Start of the call, `day/month/year hour:minute[:second]`.
    EventTimestamp,
    /// Who ended the call (`Agente`, `Cliente`, ...).
    DropOrigin,
    /// Call disposition / classification code.
    Disposition,
    /// Talking time in seconds.
    TalkingTime,
}

impl LogicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::AgentName => "AgentName",
            LogicalField::EventTimestamp => "EventTimestamp",
            LogicalField::DropOrigin => "DropOrigin",
            LogicalField::Disposition => "Disposition",
            LogicalField::TalkingTime => "TalkingTime",
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse time-of-day bucket.
///
/// Variant order is the natural day order and drives both key ordering and
/// report column ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Shift {
    Madrugada,
    #[serde(rename = "Mañana", alias = "Manana")]
    Manana,
    Tarde,
    Noche,
    OutOfRange,
}

impl Shift {
    /// Every shift, in day order.
    pub const ALL: [Shift; 5] = [
        Shift::Madrugada,
        Shift::Manana,
        Shift::Tarde,
        Shift::Noche,
        Shift::OutOfRange,
    ];

    /// Label used in report headers and key cells.
    pub fn label(&self) -> &'static str {
        match self {
            Shift::Madrugada => "Madrugada",
            Shift::Manana => "Mañana",
            Shift::Tarde => "Tarde",
            Shift::Noche => "Noche",
            Shift::OutOfRange => "Fuera de Rango",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A dimension rows can be grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Agent,
    Date,
    Shift,
    Month,
}

impl Dimension {
    /// Header used for this dimension when it is part of a report row key.
    pub fn header(&self) -> &'static str {
        match self {
            Dimension::Agent => "Nombre Agente",
            Dimension::Date => "Fecha",
            Dimension::Shift => "Turno",
            Dimension::Month => "Mes",
        }
    }

    /// The input field this dimension is derived from.
    pub fn source_field(&self) -> LogicalField {
        match self {
            Dimension::Agent => LogicalField::AgentName,
            Dimension::Date | Dimension::Shift | Dimension::Month => LogicalField::EventTimestamp,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Agent => "agent",
            Dimension::Date => "date",
            Dimension::Shift => "shift",
            Dimension::Month => "month",
        };
        f.write_str(name)
    }
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One component of a [`GroupKey`].
///
/// All keys in one table are built from the same dimension list, so parts at
/// the same position always share a variant and compare by value: agents
/// lexically, dates and months chronologically, shifts in day order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum KeyPart {
    Agent(String),
    Date(NaiveDate),
    Shift(Shift),
    Month(YearMonth),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Agent(name) => f.write_str(name),
            KeyPart::Date(date) => write!(f, "{}", date.format("%d/%m/%Y")),
            KeyPart::Shift(shift) => f.write_str(shift.label()),
            KeyPart::Month(month) => write!(f, "{}", month),
        }
    }
}

/// Tuple of grouping dimension values a row is counted under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey(pub Vec<KeyPart>);

impl GroupKey {
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Split off the part at `index`, returning the remaining key and the
    /// removed part. Used by the pivot step.
    pub fn split_at_dimension(&self, index: usize) -> Option<(GroupKey, KeyPart)> {
        let removed = self.0.get(index)?.clone();
        let rest = self
            .0
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, part)| part.clone())
            .collect();
        Some((GroupKey(rest), removed))
    }
}

/// A row that survived parsing, reduced to the fields the pipeline groups on.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    pub agent_name: String,
    pub timestamp: NaiveDateTime,
    pub shift: Shift,
    pub drop_origin: String,
    pub disposition: String,
}

impl ClassifiedEvent {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn key_part(&self, dimension: Dimension) -> KeyPart {
        match dimension {
            Dimension::Agent => KeyPart::Agent(self.agent_name.clone()),
            Dimension::Date => KeyPart::Date(self.date()),
            Dimension::Shift => KeyPart::Shift(self.shift),
            Dimension::Month => KeyPart::Month(YearMonth::of(self.date())),
        }
    }

    /// Build the group key for `dimensions`, in the order given.
    pub fn group_key(&self, dimensions: &[Dimension]) -> GroupKey {
        GroupKey(dimensions.iter().map(|d| self.key_part(*d)).collect())
    }
}

/// Why a row did not contribute to the aggregate table.
///
/// Declaration order follows the order filters are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DropReason {
    /// The record could not be decoded (e.g. invalid UTF-8).
    MalformedRecord,
    /// A required field was empty or missing.
    MissingField(LogicalField),
    /// Drop origin did not match the configured value.
    DropOriginMismatch,
    /// Disposition equals the excluded sentinel.
    ExcludedDisposition,
    /// Talking time missing, unparseable, or not above the threshold.
    BelowTalkingTime,
    /// Agent not in the allow-list.
    AgentNotAllowed,
    /// Timestamp did not parse.
    InvalidTimestamp,
    /// Event falls outside the selected calendar month.
    MonthMismatch,
    /// Shift classified but not retained by the scheme.
    ShiftNotRetained(Shift),
}

impl DropReason {
    /// `true` for rows that are invalid input rather than filtered out.
    pub fn is_classification_failure(&self) -> bool {
        matches!(
            self,
            DropReason::MalformedRecord | DropReason::MissingField(_) | DropReason::InvalidTimestamp
        )
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MalformedRecord => f.write_str("malformed record"),
            DropReason::MissingField(field) => write!(f, "empty {}", field),
            DropReason::DropOriginMismatch => f.write_str("drop origin mismatch"),
            DropReason::ExcludedDisposition => f.write_str("excluded disposition"),
            DropReason::BelowTalkingTime => f.write_str("talking time below threshold"),
            DropReason::AgentNotAllowed => f.write_str("agent not in allow-list"),
            DropReason::InvalidTimestamp => f.write_str("invalid timestamp"),
            DropReason::MonthMismatch => f.write_str("outside selected month"),
            DropReason::ShiftNotRetained(shift) => write!(f, "shift {} not retained", shift),
        }
    }
}

/// Per-row failure outcome: the reason plus the offending raw value, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowClassificationFailure {
    pub reason: DropReason,
    pub raw: Option<String>,
}

impl RowClassificationFailure {
    pub fn new(reason: DropReason) -> Self {
        Self { reason, raw: None }
    }

    pub fn with_raw(reason: DropReason, raw: impl Into<String>) -> Self {
        Self {
            reason,
            raw: Some(raw.into()),
        }
    }
}
