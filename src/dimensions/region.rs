// 🗺️ Region dimension - first available geographic column, or one default row
//
// Extracts do not always carry geography. The candidates below are tried in
// order and the first present column wins; with none present the dimension
// is a single DEFAULT_REGION row and every fact points at it.

use super::{distinct_keys, DimensionRecord};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::keys::surrogate_key;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Region-bearing columns, in priority order
pub const REGION_CANDIDATES: [&str; 4] = [
    "REGION",
    "REGIAO",
    "BTLR_ORG_LVL_A_DESC",
    "BTLR_ORG_LVL_B_DESC",
];

pub const DEFAULT_REGION_NAME: &str = "DEFAULT_REGION";
pub const DEFAULT_REGION_CODE: &str = "DEFAULT";

/// Code for blank region names
pub const UNKNOWN_REGION_CODE: &str = "UNK";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub region_id: String,
    pub region_name: String,
    pub region_code: String,
}

impl RegionRecord {
    pub fn new(region_name: &str) -> Self {
        RegionRecord {
            region_id: surrogate_key(region_name),
            region_name: region_name.to_string(),
            region_code: region_code(region_name),
        }
    }

    /// The synthetic row used when no region column exists
    pub fn default_region() -> Self {
        RegionRecord {
            region_id: surrogate_key(DEFAULT_REGION_NAME),
            region_name: DEFAULT_REGION_NAME.to_string(),
            region_code: DEFAULT_REGION_CODE.to_string(),
        }
    }
}

impl DimensionRecord for RegionRecord {
    const DIMENSION: &'static str = "dim_region";

    fn natural_key(&self) -> &str {
        &self.region_name
    }

    fn surrogate_key(&self) -> &str {
        &self.region_id
    }
}

/// First three characters, uppercased; UNK for blank names
pub fn region_code(region_name: &str) -> String {
    if region_name.trim().is_empty() {
        return UNKNOWN_REGION_CODE.to_string();
    }
    region_name.to_uppercase().chars().take(3).collect()
}

/// First candidate column present in the schema
pub fn resolve_region_column(columns: &[String]) -> Option<&'static str> {
    REGION_CANDIDATES
        .iter()
        .copied()
        .find(|candidate| columns.iter().any(|c| c == candidate))
}

pub fn build_region_dimension(sales: &Table, diagnostics: &mut Diagnostics) -> Vec<RegionRecord> {
    let present: Vec<&str> = REGION_CANDIDATES
        .iter()
        .copied()
        .filter(|c| sales.has_column(c))
        .collect();
    for column in &present {
        debug!(column = *column, "region column found");
    }

    let Some(region_column) = resolve_region_column(&sales.columns) else {
        diagnostics.record(
            WarningKind::DegradedInput,
            RegionRecord::DIMENSION,
            "REGION",
            format!(
                "none of {:?} present; using {}",
                REGION_CANDIDATES, DEFAULT_REGION_NAME
            ),
            1,
        );
        return vec![RegionRecord::default_region()];
    };

    // resolved column is guaranteed present
    let idx = sales.column_index(region_column).unwrap_or_default();
    let records: Vec<RegionRecord> = distinct_keys(sales, idx)
        .into_iter()
        .map(|(name, _)| RegionRecord::new(&name))
        .collect();

    info!(
        rows = records.len(),
        column = region_column,
        candidates_present = present.len(),
        "dim_region built"
    );
    records
}
