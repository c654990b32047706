// Dimension Builders - star schema dimensions from sanitized extracts
//
// Every builder follows the same pattern:
// - select the relevant columns
// - dedupe on the natural key (first occurrence wins, order kept)
// - derive the surrogate key from the natural key
// - derive secondary attributes
//
// None of them fail: missing optional columns degrade to documented defaults.

pub mod brand;
pub mod channel;
pub mod date;
pub mod distributor;
pub mod region;

pub use brand::{build_brand_dimension, split_brand_name, BrandRecord};
pub use channel::{build_channel_dimension, ChannelRecord};
pub use date::{build_date_dimension, DateRecord};
pub use distributor::{build_distributor_dimension, DistributorRecord};
pub use region::{
    build_region_dimension, region_code, resolve_region_column, RegionRecord,
    DEFAULT_REGION_CODE, DEFAULT_REGION_NAME, REGION_CANDIDATES,
};

use crate::error::{EtlError, Result};
use crate::table::Table;
use std::collections::{HashMap, HashSet};

// Source column names (normalized)
pub const BRAND_CODE_COLUMN: &str = "CE_BRAND_FLVR";
pub const BRAND_NAME_COLUMN: &str = "BRAND_NM";
pub const DISTRIBUTOR_COLUMN: &str = "BTLR_ORG_LVL_C_DESC";
pub const TRADE_CHANNEL_COLUMN: &str = "TRADE_CHNL_DESC";
pub const TRADE_GROUP_COLUMN: &str = "TRADE_GROUP_DESC";
pub const TRADE_TYPE_COLUMN: &str = "TRADE_TYPE_DESC";

// ============================================================================
// SHARED TRAIT
// ============================================================================

/// A dimension row the fact table can join against
pub trait DimensionRecord {
    /// Dimension name used in logs and errors
    const DIMENSION: &'static str;

    fn natural_key(&self) -> &str;

    fn surrogate_key(&self) -> &str;
}

/// Natural key → surrogate key lookup for one dimension.
///
/// Construction rejects duplicate natural keys, so a join through the index
/// can never match one sales row to several dimension rows.
#[derive(Debug, Clone, Default)]
pub struct DimensionIndex {
    keys: HashMap<String, String>,
}

impl DimensionIndex {
    pub fn build<R: DimensionRecord>(records: &[R]) -> Result<Self> {
        let mut keys = HashMap::with_capacity(records.len());
        for record in records {
            let previous = keys.insert(
                record.natural_key().to_string(),
                record.surrogate_key().to_string(),
            );
            if previous.is_some() {
                return Err(EtlError::DuplicateNaturalKey {
                    dimension: R::DIMENSION.to_string(),
                    key: record.natural_key().to_string(),
                });
            }
        }
        Ok(DimensionIndex { keys })
    }

    pub fn lookup(&self, natural_key: &str) -> Option<&str> {
        self.keys.get(natural_key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Distinct natural keys of a column with the row where each first appears
pub(crate) fn distinct_keys(table: &Table, column: usize) -> Vec<(String, usize)> {
    let mut seen = HashSet::new();
    table
        .column_values(column)
        .enumerate()
        .filter_map(|(row, value)| {
            let key = value.key_text();
            seen.insert(key.clone()).then_some((key, row))
        })
        .collect()
}

/// True when natural keys in a dimension are unique
pub fn has_unique_keys<R: DimensionRecord>(records: &[R]) -> bool {
    let mut seen = HashSet::new();
    records.iter().all(|r| seen.insert(r.natural_key()))
}
