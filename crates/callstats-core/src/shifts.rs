use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{CallStatsError, Result};
use crate::models::{DropReason, RowClassificationFailure, Shift};

// ── Timestamp parsing ─────────────────────────────────────────────────────────

/// Day-first formats accepted for event timestamps, most specific first.
const TIMESTAMP_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

/// Parse a `day/month/year hour:minute[:second]` timestamp (24-hour clock).
///
/// Surrounding whitespace is ignored. Impossible calendar values such as
/// `31/02/2024` are rejected.
pub fn parse_event_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CallStatsError::TimestampParse(raw.to_string()));
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| CallStatsError::TimestampParse(raw.to_string()))
}

/// `hour + minute / 60`, seconds ignored. 14:30 → 14.5.
pub fn fractional_hour(time: NaiveTime) -> f64 {
    time.hour() as f64 + time.minute() as f64 / 60.0
}

// ── HourRange ─────────────────────────────────────────────────────────────────

/// A closed range of fractional hours, `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: f64,
    pub end: f64,
}

impl HourRange {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.start <= value && value <= self.end
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(0.0..=24.0).contains(&self.start) || !(0.0..=24.0).contains(&self.end) {
            return Err(CallStatsError::Config(format!(
                "{name} window [{}, {}] must lie within [0, 24]",
                self.start, self.end
            )));
        }
        if self.start > self.end {
            return Err(CallStatsError::Config(format!(
                "{name} window start {} is after its end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

// ── ShiftScheme ───────────────────────────────────────────────────────────────

pub const DEFAULT_MORNING: HourRange = HourRange::new(9.0, 14.5);
pub const DEFAULT_AFTERNOON: HourRange = HourRange::new(15.0, 20.0);
pub const DEFAULT_BIN_EDGES: [f64; 5] = [0.0, 9.0, 15.0, 21.0, 24.0];

fn default_true() -> bool {
    true
}

/// How a fractional hour is turned into a [`Shift`].
///
/// The two variants are alternative configurations selected per job; they are
/// never combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShiftScheme {
    /// Closed morning and afternoon windows, checked in that order. Anything
    /// else is [`Shift::OutOfRange`].
    FixedWindow {
        morning: HourRange,
        afternoon: HourRange,
        /// Whether `OutOfRange` events are counted (as their own category).
        #[serde(default = "default_true")]
        keep_out_of_range: bool,
    },
    /// Half-open bins `[edges[i], edges[i + 1])` labelled by `labels[i]`.
    /// Only shifts in `retained` are counted.
    Binned {
        edges: Vec<f64>,
        labels: Vec<Shift>,
        retained: Vec<Shift>,
    },
}

impl Default for ShiftScheme {
    fn default() -> Self {
        Self::fixed_window(DEFAULT_MORNING.start)
    }
}

impl ShiftScheme {
    /// Morning `[morning_start, 14.5]`, afternoon `[15, 20]`, out-of-range kept.
    pub fn fixed_window(morning_start: f64) -> Self {
        ShiftScheme::FixedWindow {
            morning: HourRange::new(morning_start, DEFAULT_MORNING.end),
            afternoon: DEFAULT_AFTERNOON,
            keep_out_of_range: true,
        }
    }

    /// Four-way split `[0,9) [9,15) [15,21) [21,24)` keeping Mañana and Tarde.
    pub fn four_way_bins() -> Self {
        ShiftScheme::Binned {
            edges: DEFAULT_BIN_EDGES.to_vec(),
            labels: vec![Shift::Madrugada, Shift::Manana, Shift::Tarde, Shift::Noche],
            retained: vec![Shift::Manana, Shift::Tarde],
        }
    }

    /// Replace the morning lower bound of a fixed-window scheme.
    pub fn set_morning_start(&mut self, start: f64) -> Result<()> {
        match self {
            ShiftScheme::FixedWindow { morning, .. } => {
                morning.start = start;
                Ok(())
            }
            ShiftScheme::Binned { .. } => Err(CallStatsError::Config(
                "morning start can only be set on a fixed_window shift scheme".to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ShiftScheme::FixedWindow {
                morning, afternoon, ..
            } => {
                morning.validate("morning")?;
                afternoon.validate("afternoon")
            }
            ShiftScheme::Binned {
                edges,
                labels,
                retained,
            } => {
                if edges.len() < 2 {
                    return Err(CallStatsError::Config(
                        "binned shift scheme needs at least two edges".to_string(),
                    ));
                }
                if edges.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(CallStatsError::Config(format!(
                        "bin edges must be strictly increasing: {edges:?}"
                    )));
                }
                if labels.len() != edges.len() - 1 {
                    return Err(CallStatsError::Config(format!(
                        "{} bin edges need {} labels, got {}",
                        edges.len(),
                        edges.len() - 1,
                        labels.len()
                    )));
                }
                if retained.is_empty() {
                    return Err(CallStatsError::Config(
                        "binned shift scheme retains no shift".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Classify a fractional hour.
    pub fn classify_value(&self, value: f64) -> Shift {
        match self {
            ShiftScheme::FixedWindow {
                morning, afternoon, ..
            } => {
                if morning.contains(value) {
                    Shift::Manana
                } else if afternoon.contains(value) {
                    Shift::Tarde
                } else {
                    Shift::OutOfRange
                }
            }
            ShiftScheme::Binned { edges, labels, .. } => edges
                .windows(2)
                .zip(labels)
                .find(|(bin, _)| bin[0] <= value && value < bin[1])
                .map(|(_, label)| *label)
                .unwrap_or(Shift::OutOfRange),
        }
    }

    pub fn classify_time(&self, time: NaiveTime) -> Shift {
        self.classify_value(fractional_hour(time))
    }

    /// Whether events in `shift` are counted under this scheme.
    pub fn retains(&self, shift: Shift) -> bool {
        match self {
            ShiftScheme::FixedWindow {
                keep_out_of_range, ..
            } => shift != Shift::OutOfRange || *keep_out_of_range,
            ShiftScheme::Binned { retained, .. } => retained.contains(&shift),
        }
    }

    /// The retained shifts, in day order. These are the declared columns of a
    /// shift pivot.
    pub fn categories(&self) -> Vec<Shift> {
        Shift::ALL
            .iter()
            .copied()
            .filter(|s| self.can_produce(*s) && self.retains(*s))
            .collect()
    }

    fn can_produce(&self, shift: Shift) -> bool {
        match self {
            ShiftScheme::FixedWindow { .. } => {
                matches!(shift, Shift::Manana | Shift::Tarde | Shift::OutOfRange)
            }
            // A retained shift is always declared, even if no bin carries it.
            ShiftScheme::Binned { .. } => true,
        }
    }
}

// ── TimestampClassifier ───────────────────────────────────────────────────────

/// A parsed timestamp together with its shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftedTimestamp {
    pub timestamp: NaiveDateTime,
    pub shift: Shift,
}

impl ShiftedTimestamp {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Parses raw timestamps and assigns shifts under one scheme.
pub struct TimestampClassifier<'a> {
    scheme: &'a ShiftScheme,
}

impl<'a> TimestampClassifier<'a> {
    pub fn new(scheme: &'a ShiftScheme) -> Self {
        Self { scheme }
    }

    /// Parse and classify `raw`. A parse failure is returned as an
    /// [`InvalidTimestamp`](DropReason::InvalidTimestamp) outcome carrying
    /// the raw string.
    pub fn classify(
        &self,
        raw: &str,
    ) -> std::result::Result<ShiftedTimestamp, RowClassificationFailure> {
        let timestamp = parse_event_timestamp(raw)
            .map_err(|_| RowClassificationFailure::with_raw(DropReason::InvalidTimestamp, raw))?;
        Ok(ShiftedTimestamp {
            timestamp,
            shift: self.scheme.classify_time(timestamp.time()),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
