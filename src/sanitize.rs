// 🧹 Row Sanitizer - clean a normalized table without losing records
//
// The only rows ever removed are rows with every field empty. Everything else
// is repaired in place: critical nulls become UNKNOWN, bad volumes become 0,
// bad dates become the default date.

use crate::config::RunContext;
use crate::diagnostics::{log_quality_metrics, Diagnostics, WarningKind};
use crate::table::{Table, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::info;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Sentinel for nulls in critical columns and unparseable names
pub const UNKNOWN: &str = "UNKNOWN";

/// Any column whose name contains this is a volume source
pub const VOLUME_KEYWORD: &str = "VOLUME";

/// Cleaned numeric volume column
pub const USD_VOLUME: &str = "USD_VOLUME";

pub const DATE_COLUMN: &str = "DATE";
pub const LOADED_AT: &str = "LOADED_AT";
pub const SOURCE_FILE: &str = "SOURCE_FILE";

/// Critical sales columns: date, brand code, distributor, trade channel
pub const SALES_CRITICAL_COLUMNS: [&str; 4] = [
    "DATE",
    "CE_BRAND_FLVR",
    "BTLR_ORG_LVL_C_DESC",
    "TRADE_CHNL_DESC",
];

/// Volume strings that mean "no value" (→ 0, not a coercion failure)
pub const NULL_SPELLINGS: [&str; 5] = ["", "nan", "None", "NaN", "NULL"];

/// Substitute for dates that cannot be parsed
pub fn default_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).expect("2000-01-01 is a valid date")
}

// ============================================================================
// FIELD PARSERS
// ============================================================================

/// Outcome of volume coercion for one value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeParse {
    Parsed(f64),
    /// Null, empty, or a null spelling like "NaN"
    NullSpelling,
    /// Not a number after stripping; coerced to 0
    Invalid,
}

impl VolumeParse {
    pub fn value(&self) -> f64 {
        match self {
            VolumeParse::Parsed(v) => *v,
            VolumeParse::NullSpelling | VolumeParse::Invalid => 0.0,
        }
    }
}

/// Coerce a raw volume value. Never fails.
///
/// `"$1,234.50"` → 1234.5, `""` → 0, `"abc"` → 0 (invalid).
pub fn parse_volume(value: &Value) -> VolumeParse {
    match value {
        Value::Null => VolumeParse::NullSpelling,
        Value::Number(n) if n.is_nan() => VolumeParse::NullSpelling,
        Value::Number(n) if n.is_finite() => VolumeParse::Parsed(*n),
        Value::Number(_) => VolumeParse::Invalid,
        Value::Text(s) => {
            let stripped = s.replace(['$', ','], "");
            let stripped = stripped.trim();
            if NULL_SPELLINGS.contains(&stripped) {
                return VolumeParse::NullSpelling;
            }
            match stripped.parse::<f64>() {
                Ok(n) if n.is_finite() => VolumeParse::Parsed(n),
                _ => VolumeParse::Invalid,
            }
        }
        Value::Date(_) | Value::Timestamp(_) => VolumeParse::Invalid,
    }
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Parse a date string in any of the accepted layouts
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // YYYYMMDD
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s[0..4].parse().ok()?;
        let month = s[4..6].parse().ok()?;
        let day = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Date from any value representation
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Null => None,
        Value::Date(_) | Value::Timestamp(_) => value.as_date(),
        Value::Text(s) => parse_date(s),
        Value::Number(_) => parse_date(&value.key_text()),
    }
}

// ============================================================================
// CONFIG & STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CriticalColumns {
    /// Only these columns (when present)
    Named(Vec<String>),
    /// Every column of the table
    All,
}

#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    /// Written to SOURCE_FILE on every row
    pub source_id: String,
    pub critical: CriticalColumns,
    pub coerce_volume: bool,
    pub coerce_dates: bool,
}

impl SanitizerConfig {
    /// Sales extract profile: critical fills + volume + date coercion
    pub fn sales(source_id: &str) -> Self {
        SanitizerConfig {
            source_id: source_id.to_string(),
            critical: CriticalColumns::Named(
                SALES_CRITICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            ),
            coerce_volume: true,
            coerce_dates: true,
        }
    }

    /// Channel extract profile: every null becomes UNKNOWN, no coercions
    pub fn channel(source_id: &str) -> Self {
        SanitizerConfig {
            source_id: source_id.to_string(),
            critical: CriticalColumns::All,
            coerce_volume: false,
            coerce_dates: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SanitizeStats {
    pub input_rows: usize,
    pub empty_rows_removed: usize,
    /// (column, nulls replaced with UNKNOWN)
    pub filled: Vec<(String, usize)>,
    pub volume_column: Option<String>,
    pub volume_nulls: usize,
    pub volume_coerced: usize,
    pub dates_coerced: usize,
    pub output_rows: usize,
}

impl SanitizeStats {
    pub fn summary(&self) -> String {
        let preserved = if self.input_rows == 0 {
            100.0
        } else {
            self.output_rows as f64 / self.input_rows as f64 * 100.0
        };
        format!(
            "{}/{} rows preserved ({:.1}%), {} empty removed, {} volumes and {} dates coerced",
            self.output_rows,
            self.input_rows,
            preserved,
            self.empty_rows_removed,
            self.volume_coerced,
            self.dates_coerced
        )
    }
}

// ============================================================================
// ROW SANITIZER
// ============================================================================

pub struct RowSanitizer {
    config: SanitizerConfig,
}

impl RowSanitizer {
    pub fn new(config: SanitizerConfig) -> Self {
        RowSanitizer { config }
    }

    /// Run every step in order on a normalized table
    pub fn sanitize(
        &self,
        table: Table,
        ctx: &RunContext,
        diagnostics: &mut Diagnostics,
    ) -> (Table, SanitizeStats) {
        let mut stats = SanitizeStats {
            input_rows: table.len(),
            ..SanitizeStats::default()
        };
        log_quality_metrics(&table, &format!("{}:before", table.name));

        let mut table = table;
        stats.empty_rows_removed = drop_empty_rows(&mut table);
        if stats.empty_rows_removed > 0 {
            info!(table = %table.name, removed = stats.empty_rows_removed, "fully empty rows removed");
        }

        stats.filled = self.fill_critical(&mut table);

        if self.config.coerce_volume {
            self.coerce_volume(&mut table, &mut stats, diagnostics);
        }
        if self.config.coerce_dates {
            self.coerce_dates(&mut table, &mut stats, diagnostics);
        }

        attach_metadata(&mut table, ctx, &self.config.source_id);

        stats.output_rows = table.len();
        info!(table = %table.name, "{}", stats.summary());
        log_quality_metrics(&table, &format!("{}:after", table.name));

        (table, stats)
    }

    /// Replace missing values in critical columns with UNKNOWN
    fn fill_critical(&self, table: &mut Table) -> Vec<(String, usize)> {
        let targets: Vec<usize> = match &self.config.critical {
            CriticalColumns::All => (0..table.columns.len()).collect(),
            CriticalColumns::Named(names) => names
                .iter()
                .filter_map(|name| table.column_index(name))
                .collect(),
        };

        let mut filled = Vec::new();
        for idx in targets {
            let mut count = 0;
            for row in table.rows.iter_mut() {
                if row[idx].is_missing() {
                    row[idx] = Value::text(UNKNOWN);
                    count += 1;
                }
            }
            if count > 0 {
                info!(column = %table.columns[idx], count, "nulls filled with '{}'", UNKNOWN);
                filled.push((table.columns[idx].clone(), count));
            }
        }
        filled
    }

    /// Write USD_VOLUME from the first volume-like column
    fn coerce_volume(
        &self,
        table: &mut Table,
        stats: &mut SanitizeStats,
        diagnostics: &mut Diagnostics,
    ) {
        let source = table
            .columns
            .iter()
            .position(|c| c.to_ascii_uppercase().contains(VOLUME_KEYWORD));

        let Some(source_idx) = source else {
            diagnostics.record(
                WarningKind::DegradedInput,
                "sanitize",
                USD_VOLUME,
                format!("no column containing '{}'; volume left unset", VOLUME_KEYWORD),
                1,
            );
            return;
        };

        let source_name = table.columns[source_idx].clone();
        info!(column = %source_name, "processing volume column");

        let mut values = Vec::with_capacity(table.len());
        for value in table.column_values(source_idx) {
            let parsed = parse_volume(value);
            match parsed {
                VolumeParse::NullSpelling => stats.volume_nulls += 1,
                VolumeParse::Invalid => stats.volume_coerced += 1,
                VolumeParse::Parsed(_) => {}
            }
            values.push(parsed.value());
        }

        diagnostics.record(
            WarningKind::ValueCoercion,
            "sanitize",
            USD_VOLUME,
            format!("unparseable values in {} set to 0", source_name),
            stats.volume_coerced,
        );

        if !values.is_empty() {
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            info!("{} stats: min={:.2}, max={:.2}, mean={:.2}", USD_VOLUME, min, max, mean);
        }

        table.set_column(USD_VOLUME, values.into_iter().map(Value::Number).collect());
        stats.volume_column = Some(source_name);
    }

    /// Parse DATE in place; failures become the default date
    fn coerce_dates(
        &self,
        table: &mut Table,
        stats: &mut SanitizeStats,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(idx) = table.column_index(DATE_COLUMN) else {
            diagnostics.record(
                WarningKind::DegradedInput,
                "sanitize",
                DATE_COLUMN,
                "no DATE column; dates are resolved at fact assembly",
                1,
            );
            return;
        };

        let fallback = default_date();
        for row in table.rows.iter_mut() {
            let parsed = match parse_date_value(&row[idx]) {
                Some(date) => date,
                None => {
                    stats.dates_coerced += 1;
                    fallback
                }
            };
            row[idx] = Value::Date(parsed);
        }

        diagnostics.record(
            WarningKind::ValueCoercion,
            "sanitize",
            DATE_COLUMN,
            format!("invalid dates replaced with {}", fallback),
            stats.dates_coerced,
        );
    }
}

/// Remove rows whose fields are all missing; returns how many were removed
pub fn drop_empty_rows(table: &mut Table) -> usize {
    let before = table.len();
    table.rows.retain(|row| row.iter().any(|v| !v.is_missing()));
    before - table.len()
}

/// LOADED_AT (run start) and SOURCE_FILE (source identifier) on every row
pub fn attach_metadata(table: &mut Table, ctx: &RunContext, source_id: &str) {
    table.set_constant_column(LOADED_AT, Value::Timestamp(ctx.started_at));
    table.set_constant_column(SOURCE_FILE, Value::text(source_id));
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use proptest::prelude::*;

    fn ctx() -> RunContext {
        RunContext::new(RunConfig::default())
    }

    fn sales_table(rows: Vec<Vec<Value>>) -> Table {
        Table::new(
            "sales_raw",
            vec![
                "DATE".to_string(),
                "CE_BRAND_FLVR".to_string(),
                "BTLR_ORG_LVL_C_DESC".to_string(),
                "TRADE_CHNL_DESC".to_string(),
                "DOLLAR_VOLUME".to_string(),
            ],
        )
        .with_rows(rows)
    }

    #[test]
    fn test_volume_parsing_examples() {
        assert_eq!(parse_volume(&Value::text("$1,234.50")), VolumeParse::Parsed(1234.50));
        assert_eq!(parse_volume(&Value::text("")), VolumeParse::NullSpelling);
        assert_eq!(parse_volume(&Value::text("abc")), VolumeParse::Invalid);
        assert_eq!(parse_volume(&Value::text("abc")).value(), 0.0);
        assert_eq!(parse_volume(&Value::text("NULL")).value(), 0.0);
        assert_eq!(parse_volume(&Value::text("$")), VolumeParse::NullSpelling);
        assert_eq!(parse_volume(&Value::text(" 12 ")), VolumeParse::Parsed(12.0));
        assert_eq!(parse_volume(&Value::Number(7.5)), VolumeParse::Parsed(7.5));
        assert_eq!(parse_volume(&Value::Null).value(), 0.0);
        assert_eq!(parse_volume(&Value::text("inf")), VolumeParse::Invalid);
    }

    #[test]
    fn test_date_parsing() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("2024/01/15"), Some(expected));
        assert_eq!(parse_date("01/15/2024"), Some(expected));
        assert_eq!(parse_date("1/15/2024"), Some(expected));
        assert_eq!(parse_date("20240115"), Some(expected));
        assert_eq!(parse_date("15.01.2024"), Some(expected));
        assert_eq!(parse_date("2024-01-15 08:30:00"), Some(expected));
        assert_eq!(parse_date("2024-01-15T08:30:00Z"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-45"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_only_fully_empty_rows_removed() {
        let table = sales_table(vec![
            vec![Value::Null, Value::Null, Value::Null, Value::Null, Value::Null],
            vec![Value::Null, Value::Null, Value::Null, Value::Null, Value::text("5")],
            vec![Value::text(""), Value::Null, Value::Null, Value::Null, Value::Null],
            vec![Value::text(" "), Value::Null, Value::Null, Value::Null, Value::Null],
        ]);
        let mut diagnostics = Diagnostics::new();

        let (clean, stats) =
            RowSanitizer::new(SanitizerConfig::sales("sales_raw")).sanitize(table, &ctx(), &mut diagnostics);

        assert_eq!(stats.empty_rows_removed, 2);
        assert_eq!(clean.len(), 2);
        assert_eq!(stats.output_rows, 2);
    }

    #[test]
    fn test_empty_batch_yields_empty_output() {
        let mut diagnostics = Diagnostics::new();
        let (clean, stats) = RowSanitizer::new(SanitizerConfig::sales("sales_raw")).sanitize(
            sales_table(vec![]),
            &ctx(),
            &mut diagnostics,
        );
        assert!(clean.is_empty());
        assert_eq!(stats.input_rows, 0);
        assert!(clean.has_column(USD_VOLUME));
        assert!(clean.has_column(LOADED_AT));
    }

    #[test]
    fn test_critical_fill_volume_and_date_coercion() {
        let table = sales_table(vec![
            vec![
                Value::text("2024-02-01"),
                Value::Null,
                Value::text("Dist A"),
                Value::text("GROCERY"),
                Value::text("$1,000.25"),
            ],
            vec![
                Value::text("garbage"),
                Value::text("B1"),
                Value::Null,
                Value::text("GROCERY"),
                Value::text("n/a"),
            ],
            vec![
                Value::Null,
                Value::text("B2"),
                Value::text("Dist B"),
                Value::Null,
                Value::text("NaN"),
            ],
        ]);
        let context = ctx();
        let mut diagnostics = Diagnostics::new();

        let (clean, stats) = RowSanitizer::new(SanitizerConfig::sales("sales_raw"))
            .sanitize(table, &context, &mut diagnostics);

        let brand = clean.column_index("CE_BRAND_FLVR").unwrap();
        assert_eq!(clean.rows[0][brand], Value::text(UNKNOWN));
        assert_eq!(stats.filled.len(), 4);

        let volume = clean.column_index(USD_VOLUME).unwrap();
        assert_eq!(clean.rows[0][volume], Value::Number(1000.25));
        assert_eq!(clean.rows[1][volume], Value::Number(0.0));
        assert_eq!(clean.rows[2][volume], Value::Number(0.0));
        assert_eq!(stats.volume_coerced, 1);
        assert_eq!(stats.volume_nulls, 1);
        assert_eq!(stats.volume_column.as_deref(), Some("DOLLAR_VOLUME"));

        let date = clean.column_index(DATE_COLUMN).unwrap();
        assert_eq!(
            clean.rows[0][date],
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
        );
        assert_eq!(clean.rows[1][date], Value::Date(default_date()));
        // null DATE is filled with UNKNOWN first, then coerced
        assert_eq!(clean.rows[2][date], Value::Date(default_date()));
        assert_eq!(stats.dates_coerced, 2);

        assert_eq!(diagnostics.count_for(WarningKind::ValueCoercion, USD_VOLUME), 1);
        assert_eq!(diagnostics.count_for(WarningKind::ValueCoercion, DATE_COLUMN), 2);

        let loaded_at = clean.column_index(LOADED_AT).unwrap();
        assert_eq!(clean.rows[1][loaded_at], Value::Timestamp(context.started_at));
        let source = clean.column_index(SOURCE_FILE).unwrap();
        assert_eq!(clean.rows[2][source], Value::text("sales_raw"));
    }

    #[test]
    fn test_missing_volume_column_degrades() {
        let table = Table::new("sales_raw", vec!["DATE".to_string()])
            .with_rows(vec![vec![Value::text("2024-01-01")]]);
        let mut diagnostics = Diagnostics::new();

        let (clean, _) = RowSanitizer::new(SanitizerConfig::sales("sales_raw"))
            .sanitize(table, &ctx(), &mut diagnostics);

        assert!(!clean.has_column(USD_VOLUME));
        assert_eq!(diagnostics.count_for(WarningKind::DegradedInput, USD_VOLUME), 1);
    }

    #[test]
    fn test_channel_profile_fills_every_column() {
        let table = Table::new(
            "channel_raw",
            vec!["TRADE_CHNL_DESC".to_string(), "TRADE_GROUP_DESC".to_string()],
        )
        .with_rows(vec![
            vec![Value::text("GROCERY"), Value::Null],
            vec![Value::Null, Value::text("RETAIL")],
        ]);
        let mut diagnostics = Diagnostics::new();

        let (clean, stats) = RowSanitizer::new(SanitizerConfig::channel("channel_raw"))
            .sanitize(table, &ctx(), &mut diagnostics);

        assert_eq!(clean.rows[0][1], Value::text(UNKNOWN));
        assert_eq!(clean.rows[1][0], Value::text(UNKNOWN));
        assert_eq!(stats.filled.len(), 2);
        assert!(!clean.has_column(USD_VOLUME));
        assert!(diagnostics.is_clean());
    }

    fn cell() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            Just(Value::text("")),
            "[ a-zA-Z0-9$,.]{1,8}".prop_map(Value::text),
        ]
    }

    proptest! {
        #[test]
        fn rows_with_any_value_survive(
            rows in prop::collection::vec(prop::collection::vec(cell(), 5), 0..24),
        ) {
            let with_values = rows
                .iter()
                .filter(|row| row.iter().any(|v| !v.is_missing()))
                .count();
            let mut diagnostics = Diagnostics::new();

            let (clean, stats) = RowSanitizer::new(SanitizerConfig::sales("sales_raw"))
                .sanitize(sales_table(rows.clone()), &ctx(), &mut diagnostics);

            prop_assert_eq!(clean.len(), with_values);
            prop_assert_eq!(stats.empty_rows_removed, rows.len() - with_values);
        }
    }
}
