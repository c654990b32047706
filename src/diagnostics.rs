// 🩺 Run Diagnostics - non-fatal degradations and coercions
//
// Nothing recorded here fails a run. Every warning carries a deterministic
// fallback that was already applied; the counts are reported at the end.

use crate::table::Table;
use serde::Serialize;
use tracing::{info, warn};

// ============================================================================
// WARNINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// Expected-but-optional column absent, fallback applied
    DegradedInput,
    /// Field failed numeric/date parsing, coerced to a default
    ValueCoercion,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::DegradedInput => "degraded_input",
            WarningKind::ValueCoercion => "value_coercion",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Stage that raised it (sanitize, dim_region, fact_sales, ...)
    pub stage: String,
    pub field: String,
    pub message: String,
    /// Number of affected values (1 for schema-level degradations)
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it. Zero counts are ignored.
    pub fn record(
        &mut self,
        kind: WarningKind,
        stage: &str,
        field: &str,
        message: impl Into<String>,
        count: usize,
    ) {
        if count == 0 {
            return;
        }
        let message = message.into();
        warn!(kind = kind.as_str(), stage, field, count, "{}", message);
        self.warnings.push(Warning {
            kind,
            stage: stage.to_string(),
            field: field.to_string(),
            message,
            count,
        });
    }

    /// Total affected values for a kind
    pub fn count_of(&self, kind: WarningKind) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.kind == kind)
            .map(|w| w.count)
            .sum()
    }

    /// Affected values for a kind on one field
    pub fn count_for(&self, kind: WarningKind, field: &str) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.kind == kind && w.field == field)
            .map(|w| w.count)
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} warnings: {} degraded inputs, {} coerced values",
            self.warnings.len(),
            self.warnings
                .iter()
                .filter(|w| w.kind == WarningKind::DegradedInput)
                .count(),
            self.count_of(WarningKind::ValueCoercion)
        )
    }
}

// ============================================================================
// COLUMN PROFILE (null percentages)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    pub nulls: usize,
    pub null_pct: f64,
}

/// Null percentage per column; only columns with at least one missing value
pub fn profile_table(table: &Table) -> Vec<ColumnProfile> {
    if table.is_empty() {
        return Vec::new();
    }
    let total = table.len() as f64;

    table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(idx, column)| {
            let nulls = table.column_values(idx).filter(|v| v.is_missing()).count();
            (nulls > 0).then(|| ColumnProfile {
                column: column.clone(),
                nulls,
                null_pct: nulls as f64 / total * 100.0,
            })
        })
        .collect()
}

/// Log the shape and null profile of a table at a checkpoint
pub fn log_quality_metrics(table: &Table, checkpoint: &str) {
    info!(
        checkpoint,
        rows = table.len(),
        columns = table.columns.len(),
        "quality metrics"
    );
    for profile in profile_table(table) {
        warn!(
            checkpoint,
            column = %profile.column,
            "{:.2}% nulls",
            profile.null_pct
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
