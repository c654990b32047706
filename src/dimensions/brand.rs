// 🥤 Brand dimension - brand code + brand/flavor split of the display name
//
// "Pepsi Zero Sugar" → brand "Pepsi", flavor "Zero Sugar"
// "Sprite"           → brand "Sprite", flavor "REGULAR"
// "" / null          → "UNKNOWN", "UNKNOWN"
//
// The split is purely positional (first whitespace token). There is no
// reference brand list behind it.

use super::{distinct_keys, DimensionRecord, BRAND_CODE_COLUMN, BRAND_NAME_COLUMN};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::keys::surrogate_key;
use crate::sanitize::UNKNOWN;
use crate::table::{Table, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Flavor for single-token brand names
pub const REGULAR_FLAVOR: &str = "REGULAR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandRecord {
    pub brand_id: String,
    /// Raw brand/flavor code
    pub natural_key: String,
    pub brand: String,
    pub flavor: String,
}

impl BrandRecord {
    pub fn new(natural_key: &str, display_name: Option<&str>) -> Self {
        let (brand, flavor) = split_brand_name(display_name);
        BrandRecord {
            brand_id: surrogate_key(natural_key),
            natural_key: natural_key.to_string(),
            brand,
            flavor,
        }
    }
}

impl DimensionRecord for BrandRecord {
    const DIMENSION: &'static str = "dim_brand";

    fn natural_key(&self) -> &str {
        &self.natural_key
    }

    fn surrogate_key(&self) -> &str {
        &self.brand_id
    }
}

/// Split a display name into (brand, flavor)
pub fn split_brand_name(display_name: Option<&str>) -> (String, String) {
    let name = display_name.map(str::trim).unwrap_or("");
    if name.is_empty() || name == "nan" {
        return (UNKNOWN.to_string(), UNKNOWN.to_string());
    }

    let mut parts = name.split_whitespace();
    let brand = parts.next().unwrap_or(name).to_string();
    let rest: Vec<&str> = parts.collect();
    let flavor = if rest.is_empty() {
        REGULAR_FLAVOR.to_string()
    } else {
        rest.join(" ")
    };

    (brand, flavor)
}

fn display_name(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.key_text()),
    }
}

pub fn build_brand_dimension(sales: &Table, diagnostics: &mut Diagnostics) -> Vec<BrandRecord> {
    let Some(code_idx) = sales.column_index(BRAND_CODE_COLUMN) else {
        diagnostics.record(
            WarningKind::DegradedInput,
            BrandRecord::DIMENSION,
            BRAND_CODE_COLUMN,
            "column absent; brand dimension is empty",
            1,
        );
        return Vec::new();
    };

    let name_idx = sales.column_index(BRAND_NAME_COLUMN);
    if name_idx.is_none() {
        diagnostics.record(
            WarningKind::DegradedInput,
            BrandRecord::DIMENSION,
            BRAND_NAME_COLUMN,
            "column absent; brand and flavor set to UNKNOWN",
            1,
        );
    }

    let records: Vec<BrandRecord> = distinct_keys(sales, code_idx)
        .into_iter()
        .map(|(key, row)| {
            let name = name_idx.and_then(|idx| display_name(&sales.rows[row][idx]));
            BrandRecord::new(&key, name.as_deref())
        })
        .collect();

    info!(rows = records.len(), "dim_brand built");
    for record in records.iter().take(5) {
        debug!(
            code = %record.natural_key,
            brand = %record.brand,
            flavor = %record.flavor,
            "brand parsed"
        );
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_brand_name() {
        assert_eq!(
            split_brand_name(Some("Pepsi Zero Sugar")),
            ("Pepsi".to_string(), "Zero Sugar".to_string())
        );
        assert_eq!(
            split_brand_name(Some("Sprite")),
            ("Sprite".to_string(), "REGULAR".to_string())
        );
        assert_eq!(
            split_brand_name(Some("")),
            ("UNKNOWN".to_string(), "UNKNOWN".to_string())
        );
        assert_eq!(
            split_brand_name(None),
            ("UNKNOWN".to_string(), "UNKNOWN".to_string())
        );
        assert_eq!(
            split_brand_name(Some("  Guarana   Antarctica  Zero ")),
            ("Guarana".to_string(), "Antarctica Zero".to_string())
        );
        assert_eq!(
            split_brand_name(Some("nan")),
            ("UNKNOWN".to_string(), "UNKNOWN".to_string())
        );
    }

    #[test]
    fn test_build_dedupes_on_code() {
        let sales = Table::new(
            "sales",
            vec![BRAND_CODE_COLUMN.to_string(), BRAND_NAME_COLUMN.to_string()],
        )
        .with_rows(vec![
            vec![Value::text("P0"), Value::text("Pepsi Zero Sugar")],
            vec![Value::text("S1"), Value::text("Sprite")],
            // same code, different spelling: first occurrence wins
            vec![Value::text("P0"), Value::text("Pepsi Zero")],
            vec![Value::text("X9"), Value::Null],
        ]);
        let mut diagnostics = Diagnostics::new();

        let dim = build_brand_dimension(&sales, &mut diagnostics);

        assert_eq!(dim.len(), 3);
        assert!(super::super::has_unique_keys(&dim));
        assert_eq!(dim[0].flavor, "Zero Sugar");
        assert_eq!(dim[1].flavor, "REGULAR");
        assert_eq!(dim[2].brand, "UNKNOWN");
        assert_eq!(dim[0].brand_id, surrogate_key("P0"));
    }

    #[test]
    fn test_missing_name_column_degrades() {
        let sales = Table::new("sales", vec![BRAND_CODE_COLUMN.to_string()])
            .with_rows(vec![vec![Value::text("P0")]]);
        let mut diagnostics = Diagnostics::new();

        let dim = build_brand_dimension(&sales, &mut diagnostics);

        assert_eq!(dim.len(), 1);
        assert_eq!(dim[0].brand, UNKNOWN);
        assert_eq!(dim[0].flavor, UNKNOWN);
        assert_eq!(diagnostics.count_for(WarningKind::DegradedInput, BRAND_NAME_COLUMN), 1);
    }
}
