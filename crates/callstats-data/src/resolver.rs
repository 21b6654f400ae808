//! Header → logical field resolution.
//!
//! Runs once per input, before any row is read. The resulting
//! [`ResolvedSchema`] is immutable and drives column pruning in the reader.

use callstats_core::error::{CallStatsError, Result};
use callstats_core::job::ColumnRule;
use callstats_core::models::LogicalField;
use tracing::debug;

const BOM: char = '\u{feff}';

/// One logical field bound to a concrete input column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub field: LogicalField,
    pub header: String,
    pub index: usize,
}

/// Logical field → input column mapping for one input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    columns: Vec<ResolvedColumn>,
    headers: Vec<String>,
}

impl ResolvedSchema {
    /// Resolved columns, in rule order.
    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    pub fn column(&self, field: LogicalField) -> Option<&ResolvedColumn> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn contains(&self, field: LogicalField) -> bool {
        self.column(field).is_some()
    }

    /// Full header list as detected (BOM removed).
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

/// Bind every rule to the first header containing its keyword.
///
/// Matching is a case-sensitive substring test in header order. A required
/// rule without a match fails with [`CallStatsError::SchemaResolution`]; a
/// `unique` rule with several matches fails with
/// [`CallStatsError::AmbiguousColumn`]. Optional rules without a match are
/// left out of the schema.
pub fn resolve_schema<S: AsRef<str>>(headers: &[S], rules: &[ColumnRule]) -> Result<ResolvedSchema> {
    let headers: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.as_ref();
            if i == 0 {
                h.trim_start_matches(BOM).to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut columns = Vec::with_capacity(rules.len());

    for rule in rules {
        let matches: Vec<(usize, &String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.contains(rule.keyword.as_str()))
            .collect();

        let Some(&(index, header)) = matches.first() else {
            if rule.required {
                return Err(CallStatsError::SchemaResolution {
                    field: rule.field,
                    keyword: rule.keyword.clone(),
                    headers: headers.clone(),
                });
            }
            debug!(field = %rule.field, keyword = %rule.keyword, "Optional column not present");
            continue;
        };

        if rule.unique && matches.len() > 1 {
            return Err(CallStatsError::AmbiguousColumn {
                field: rule.field,
                keyword: rule.keyword.clone(),
                matches: matches.iter().map(|(_, h)| (*h).clone()).collect(),
                headers: headers.clone(),
            });
        }

        debug!(field = %rule.field, header = %header, index, "Resolved column");
        columns.push(ResolvedColumn {
            field: rule.field,
            header: header.clone(),
            index,
        });
    }

    Ok(ResolvedSchema { columns, headers })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
