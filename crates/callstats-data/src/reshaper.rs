//! Aggregate table → report layout.
//!
//! Pivots one grouping dimension into columns, zero-fills missing cells and
//! appends the optional Total column and Total row.

use std::collections::{BTreeMap, BTreeSet};

use callstats_core::error::{CallStatsError, Result};
use callstats_core::job::JobConfig;
use callstats_core::models::{Dimension, GroupKey, KeyPart};
use serde::Serialize;

use crate::accumulator::AggregateTable;

pub const TOTAL_LABEL: &str = "Total";

/// One output line: rendered key cells followed by counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub key: Vec<String>,
    pub values: Vec<u64>,
}

/// Final tabular output, ready for the writer or for JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Headers of the row-key cells, one per non-pivoted dimension. A fully
    /// pivoted report gets a single blank-headed label column instead.
    pub key_headers: Vec<String>,
    /// Value column labels, Total column last when present.
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub total_row: Option<ReportRow>,
}

impl Report {
    /// Full header line: key headers then value columns.
    pub fn header(&self) -> Vec<String> {
        self.key_headers
            .iter()
            .chain(self.columns.iter())
            .cloned()
            .collect()
    }

    /// Value of `column` in the row whose key cells equal `key`.
    pub fn value(&self, key: &[&str], column: &str) -> Option<u64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|r| r.key.iter().map(String::as_str).eq(key.iter().copied()))
            .map(|r| r.values[col])
    }
}

fn render_key(key: &GroupKey) -> Vec<String> {
    key.parts().iter().map(ToString::to_string).collect()
}

/// Shape `table` according to the job's pivot, totals and labels.
pub fn reshape(table: &AggregateTable, job: &JobConfig) -> Result<Report> {
    let mut report = match job.pivot {
        None => long_form(table, job),
        Some(pivot) => {
            let index = job.dimension_index(pivot).ok_or_else(|| {
                CallStatsError::Config(format!(
                    "pivot dimension {pivot} is not one of the grouping dimensions"
                ))
            })?;
            pivoted(table, job, pivot, index)?
        }
    };

    if job.total_column {
        report.columns.push(TOTAL_LABEL.to_string());
        for row in &mut report.rows {
            let sum = row.values.iter().sum();
            row.values.push(sum);
        }
    }

    if job.total_row {
        let mut sums = vec![0u64; report.columns.len()];
        for row in &report.rows {
            for (sum, value) in sums.iter_mut().zip(&row.values) {
                *sum += value;
            }
        }
        let mut key = vec![String::new(); report.key_headers.len()];
        if let Some(first) = key.first_mut() {
            *first = TOTAL_LABEL.to_string();
        }
        report.total_row = Some(ReportRow { key, values: sums });
    }

    Ok(report)
}

fn long_form(table: &AggregateTable, job: &JobConfig) -> Report {
    Report {
        key_headers: job
            .dimensions
            .iter()
            .map(|d| d.header().to_string())
            .collect(),
        columns: vec![job.value_label.clone()],
        rows: table
            .iter()
            .map(|(key, count)| ReportRow {
                key: render_key(key),
                values: vec![count],
            })
            .collect(),
        total_row: None,
    }
}

fn pivoted(
    table: &AggregateTable,
    job: &JobConfig,
    pivot: Dimension,
    index: usize,
) -> Result<Report> {
    let mut columns: BTreeSet<KeyPart> = BTreeSet::new();
    if pivot == Dimension::Shift {
        columns.extend(job.scheme.categories().into_iter().map(KeyPart::Shift));
    }

    let mut grouped: BTreeMap<GroupKey, BTreeMap<KeyPart, u64>> = BTreeMap::new();
    for (key, count) in table.iter() {
        let (rest, part) = key.split_at_dimension(index).ok_or_else(|| {
            CallStatsError::Config(format!(
                "group key {:?} has no {pivot} component",
                key.parts()
            ))
        })?;
        columns.insert(part.clone());
        *grouped.entry(rest).or_default().entry(part).or_insert(0) += count;
    }

    let mut key_headers: Vec<String> = job
        .dimensions
        .iter()
        .filter(|d| **d != pivot)
        .map(|d| d.header().to_string())
        .collect();

    // With every dimension pivoted there is at most one data row. Give it a
    // label column so it stays distinguishable from the Total row.
    let label_row = key_headers.is_empty();
    if label_row {
        key_headers.push(String::new());
    }

    let prefix = job.column_prefix.as_deref().unwrap_or("");
    let rows = grouped
        .into_iter()
        .map(|(key, cells)| ReportRow {
            key: if label_row {
                vec![job.value_label.clone()]
            } else {
                render_key(&key)
            },
            values: columns
                .iter()
                .map(|c| cells.get(c).copied().unwrap_or(0))
                .collect(),
        })
        .collect();

    Ok(Report {
        key_headers,
        columns: columns.iter().map(|c| format!("{prefix}{c}")).collect(),
        rows,
        total_row: None,
    })
}
