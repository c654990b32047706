// 🔤 Column Normalizer - canonical, warehouse-safe column identifiers

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::table::Table;
use tracing::{debug, info};

/// Prefix for identifiers that would otherwise start with a digit
pub const DIGIT_PREFIX: &str = "COL_";

/// What an empty identifier resolves to: the prefix without its separator,
/// so the result stays a fixed point of `normalize_column_name`
pub const EMPTY_COLUMN_NAME: &str = "COL";

/// Canonicalize a raw header.
///
/// trim → non `[A-Za-z0-9_]` chars become `_` → collapse `_` runs →
/// strip outer `_` → prefix `COL_` when it starts with a digit → uppercase.
///
/// # Examples:
/// ```
/// use medallion_etl::normalize::normalize_column_name;
/// assert_eq!(normalize_column_name(" Brand Name "), "BRAND_NAME");
/// assert_eq!(normalize_column_name("2024 $ Volume"), "COL_2024_VOLUME");
/// ```
pub fn normalize_column_name(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
        if c == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(c);
    }

    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        return EMPTY_COLUMN_NAME.to_string();
    }

    let prefixed = if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", DIGIT_PREFIX, cleaned)
    } else {
        cleaned.to_string()
    };

    prefixed.to_ascii_uppercase()
}

/// Rename every header of a table. Rows are untouched (1:1 with the input).
///
/// Headers that collide after normalization are all kept; column lookups
/// resolve to the first one, and the collision is reported.
pub fn normalize_table(mut table: Table, diagnostics: &mut Diagnostics) -> Table {
    let mut renamed = Vec::with_capacity(table.columns.len());

    for raw in &table.columns {
        let canonical = normalize_column_name(raw);
        if canonical != *raw {
            debug!(table = %table.name, from = %raw, to = %canonical, "column renamed");
        }
        if renamed.contains(&canonical) {
            diagnostics.record(
                WarningKind::DegradedInput,
                "normalize",
                &canonical,
                format!(
                    "header '{}' collides with an earlier column; the first one wins",
                    raw
                ),
                1,
            );
        }
        renamed.push(canonical);
    }

    info!(table = %table.name, columns = renamed.len(), "columns normalized");
    table.columns = renamed;
    table
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use proptest::prelude::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize_column_name("CE_BRAND_FLVR"), "CE_BRAND_FLVR");
        assert_eq!(normalize_column_name("  trade chnl desc "), "TRADE_CHNL_DESC");
        assert_eq!(normalize_column_name("$ Volume (USD)"), "VOLUME_USD");
        assert_eq!(normalize_column_name("a--b__c"), "A_B_C");
        assert_eq!(normalize_column_name("Região"), "REGI_O");
    }

    #[test]
    fn test_digit_prefix() {
        assert_eq!(normalize_column_name("1st Month"), "COL_1ST_MONTH");
        assert_eq!(normalize_column_name("_9"), "COL_9");
    }

    #[test]
    fn test_empty_input_resolves_to_prefix_literal() {
        assert_eq!(normalize_column_name(""), EMPTY_COLUMN_NAME);
        assert_eq!(normalize_column_name("  "), EMPTY_COLUMN_NAME);
        assert_eq!(normalize_column_name("$%&"), EMPTY_COLUMN_NAME);
    }

    #[test]
    fn test_idempotent() {
        let headers = [
            "",
            "   ",
            "___",
            "DATE",
            "date",
            "1",
            "9 lives",
            "Bottler Org Level C Desc",
            "$$ 2023 $$",
            "Preço Médio",
            "col_1",
            "_x_",
            "COL_",
        ];
        for h in headers {
            let once = normalize_column_name(h);
            let twice = normalize_column_name(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", h);
            assert!(!once.is_empty());
        }
    }

    #[test]
    fn test_normalize_table_keeps_rows_and_reports_collisions() {
        let table = Table::new("sales", vec!["Date".to_string(), "DATE ".to_string()])
            .with_rows(vec![vec![Value::text("a"), Value::text("b")]]);
        let mut diagnostics = Diagnostics::new();

        let normalized = normalize_table(table, &mut diagnostics);

        assert_eq!(normalized.columns, vec!["DATE", "DATE"]);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized.column_index("DATE"), Some(0));
        assert_eq!(diagnostics.count_of(WarningKind::DegradedInput), 1);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(header in ".*") {
            let once = normalize_column_name(&header);
            prop_assert_eq!(normalize_column_name(&once), once.clone());
            prop_assert!(!once.is_empty());
        }

        #[test]
        fn normalized_names_are_identifiers(header in "[ -~À-ÿ]{0,24}") {
            let name = normalize_column_name(&header);
            prop_assert!(name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
            prop_assert!(!name.starts_with(|c: char| c.is_ascii_digit()));
        }
    }
}
