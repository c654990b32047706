// 🚚 Distributor dimension - one row per bottler organization

use super::{distinct_keys, DimensionRecord, DISTRIBUTOR_COLUMN};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::keys::surrogate_key;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorRecord {
    pub distributor_id: String,
    /// Organization-level description as found in the extract
    pub natural_key: String,
}

impl DistributorRecord {
    pub fn new(natural_key: &str) -> Self {
        DistributorRecord {
            distributor_id: surrogate_key(natural_key),
            natural_key: natural_key.to_string(),
        }
    }
}

impl DimensionRecord for DistributorRecord {
    const DIMENSION: &'static str = "dim_distributor";

    fn natural_key(&self) -> &str {
        &self.natural_key
    }

    fn surrogate_key(&self) -> &str {
        &self.distributor_id
    }
}

pub fn build_distributor_dimension(
    sales: &Table,
    diagnostics: &mut Diagnostics,
) -> Vec<DistributorRecord> {
    let Some(idx) = sales.column_index(DISTRIBUTOR_COLUMN) else {
        diagnostics.record(
            WarningKind::DegradedInput,
            DistributorRecord::DIMENSION,
            DISTRIBUTOR_COLUMN,
            "column absent; distributor dimension is empty",
            1,
        );
        return Vec::new();
    };

    let records: Vec<DistributorRecord> = distinct_keys(sales, idx)
        .into_iter()
        .map(|(key, _)| DistributorRecord::new(&key))
        .collect();

    info!(rows = records.len(), "dim_distributor built");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    #[test]
    fn test_build_distributor_dimension() {
        let sales = Table::new("sales", vec![DISTRIBUTOR_COLUMN.to_string()]).with_rows(vec![
            vec![Value::text("Bottler A")],
            vec![Value::text("Bottler B")],
            vec![Value::text("Bottler A")],
        ]);
        let mut diagnostics = Diagnostics::new();

        let dim = build_distributor_dimension(&sales, &mut diagnostics);

        assert_eq!(dim.len(), 2);
        assert_eq!(dim[0].natural_key, "Bottler A");
        assert_eq!(dim[0].distributor_id, surrogate_key("Bottler A"));
        assert!(diagnostics.is_clean());
    }

    #[test]
    fn test_missing_column_gives_empty_dimension() {
        let sales = Table::new("sales", vec!["OTHER".to_string()]);
        let mut diagnostics = Diagnostics::new();

        assert!(build_distributor_dimension(&sales, &mut diagnostics).is_empty());
        assert_eq!(diagnostics.count_of(WarningKind::DegradedInput), 1);
    }
}
