// 📊 Fact Assembler - sales rows joined to dimension surrogate keys
//
// Hard invariant: one fact per sanitized sales row. Every join goes through a
// DimensionIndex (unique natural keys), so a sales row matches at most one
// dimension row; unmatched rows keep a null foreign key instead of being
// dropped.

use crate::config::RunContext;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::dimensions::{
    resolve_region_column, BrandRecord, ChannelRecord, DimensionIndex, DistributorRecord,
    RegionRecord, BRAND_CODE_COLUMN, DISTRIBUTOR_COLUMN, TRADE_CHANNEL_COLUMN,
};
use crate::error::{EtlError, Result};
use crate::sanitize::{
    default_date, parse_date_value, parse_volume, VolumeParse, USD_VOLUME, VOLUME_KEYWORD,
};
use crate::table::Table;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const STAGE: &str = "fact_sales";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    pub date: NaiveDate,
    pub brand_id: Option<String>,
    pub distributor_id: Option<String>,
    pub channel_id: Option<String>,
    pub region_id: Option<String>,
    pub volume_usd: f64,
    pub created_at: DateTime<Utc>,
}

/// Dimension tables the fact joins against
pub struct FactDimensions<'a> {
    pub brands: &'a [BrandRecord],
    pub distributors: &'a [DistributorRecord],
    pub channels: &'a [ChannelRecord],
    pub regions: &'a [RegionRecord],
}

// ============================================================================
// COLUMN RESOLUTION
// ============================================================================

/// USD_VOLUME when present, otherwise the first column containing VOLUME
pub fn resolve_volume_column(columns: &[String]) -> Option<&str> {
    if let Some(exact) = columns.iter().find(|c| c.as_str() == USD_VOLUME) {
        return Some(exact.as_str());
    }
    columns
        .iter()
        .find(|c| c.to_ascii_uppercase().contains(VOLUME_KEYWORD))
        .map(|c| c.as_str())
}

/// `date`, then `DATE`, then the first column whose name contains "date" or
/// "data" (case-insensitive). No match is fatal.
pub fn resolve_date_column(columns: &[String]) -> Result<&str> {
    for exact in ["date", "DATE"] {
        if let Some(c) = columns.iter().find(|c| c.as_str() == exact) {
            return Ok(c.as_str());
        }
    }

    columns
        .iter()
        .find(|c| {
            let lower = c.to_lowercase();
            lower.contains("date") || lower.contains("data")
        })
        .map(|c| c.as_str())
        .ok_or_else(|| EtlError::MissingDateColumn {
            columns: columns.to_vec(),
        })
}

// ============================================================================
// ASSEMBLY
// ============================================================================

/// Join column of the sales table, or None when the column is absent
fn join_keys(sales: &Table, column: &str, diagnostics: &mut Diagnostics) -> Option<Vec<String>> {
    match sales.column_index(column) {
        Some(idx) => Some(sales.column_values(idx).map(|v| v.key_text()).collect()),
        None => {
            diagnostics.record(
                WarningKind::DegradedInput,
                STAGE,
                column,
                "join column absent from sales; foreign key left null",
                1,
            );
            None
        }
    }
}

/// Left join: one lookup per sales row, never more than one match
fn left_join(keys: Option<&[String]>, index: &DimensionIndex, rows: usize) -> Vec<Option<String>> {
    match keys {
        Some(keys) => keys
            .iter()
            .map(|k| index.lookup(k).map(str::to_string))
            .collect(),
        None => vec![None; rows],
    }
}

/// Build the fact table from sanitized sales rows
pub fn assemble_facts(
    sales: &Table,
    dims: &FactDimensions<'_>,
    ctx: &RunContext,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<FactRecord>> {
    let rows = sales.len();
    let date_column = resolve_date_column(&sales.columns)?;
    if date_column != "date" {
        info!(column = date_column, "using as fact date");
    }

    // Unique natural keys are checked here, before any join runs
    let brand_index = DimensionIndex::build(dims.brands)?;
    let distributor_index = DimensionIndex::build(dims.distributors)?;
    let channel_index = DimensionIndex::build(dims.channels)?;
    let region_index = DimensionIndex::build(dims.regions)?;

    let brand_ids = left_join(
        join_keys(sales, BRAND_CODE_COLUMN, diagnostics).as_deref(),
        &brand_index,
        rows,
    );
    let distributor_ids = left_join(
        join_keys(sales, DISTRIBUTOR_COLUMN, diagnostics).as_deref(),
        &distributor_index,
        rows,
    );
    let channel_ids = left_join(
        join_keys(sales, TRADE_CHANNEL_COLUMN, diagnostics).as_deref(),
        &channel_index,
        rows,
    );

    let region_ids = match resolve_region_column(&sales.columns) {
        Some(column) => {
            info!(column, "joining regions");
            left_join(join_keys(sales, column, diagnostics).as_deref(), &region_index, rows)
        }
        None => {
            let default_id = dims.regions.first().map(|r| r.region_id.clone());
            warn!(region_id = ?default_id, "no region column; every fact uses the default region");
            vec![default_id; rows]
        }
    };

    let volumes: Vec<f64> = match resolve_volume_column(&sales.columns) {
        Some(column) => {
            let idx = sales.column_index(column).unwrap_or_default();
            let parsed: Vec<VolumeParse> = sales.column_values(idx).map(parse_volume).collect();
            let invalid = parsed.iter().filter(|p| **p == VolumeParse::Invalid).count();
            diagnostics.record(
                WarningKind::ValueCoercion,
                STAGE,
                column,
                "volume values not numeric at fact assembly; set to 0",
                invalid,
            );
            parsed.iter().map(VolumeParse::value).collect()
        }
        None => {
            diagnostics.record(
                WarningKind::DegradedInput,
                STAGE,
                USD_VOLUME,
                "no volume column; volume set to 0",
                1,
            );
            vec![0.0; rows]
        }
    };

    let date_idx = sales.column_index(date_column).unwrap_or_default();
    let mut bad_dates = 0;
    let dates: Vec<NaiveDate> = sales
        .column_values(date_idx)
        .map(|v| {
            parse_date_value(v).unwrap_or_else(|| {
                bad_dates += 1;
                default_date()
            })
        })
        .collect();
    diagnostics.record(
        WarningKind::ValueCoercion,
        STAGE,
        date_column,
        "fact dates not parseable; default date used",
        bad_dates,
    );

    let facts: Vec<FactRecord> = dates
        .into_iter()
        .zip(brand_ids)
        .zip(distributor_ids)
        .zip(channel_ids)
        .zip(region_ids)
        .zip(volumes)
        .map(
            |(((((date, brand_id), distributor_id), channel_id), region_id), volume_usd)| {
                FactRecord {
                    date,
                    brand_id,
                    distributor_id,
                    channel_id,
                    region_id,
                    volume_usd,
                    created_at: ctx.started_at,
                }
            },
        )
        .collect();

    if facts.len() != rows {
        return Err(EtlError::RowCountMismatch {
            expected: rows,
            actual: facts.len(),
        });
    }

    log_fact_stats(&facts);
    Ok(facts)
}

fn log_fact_stats(facts: &[FactRecord]) {
    info!(rows = facts.len(), "fact_sales built");
    if facts.is_empty() {
        return;
    }
    let min = facts.iter().map(|f| f.volume_usd).fold(f64::INFINITY, f64::min);
    let max = facts.iter().map(|f| f.volume_usd).fold(f64::NEG_INFINITY, f64::max);
    let mean = facts.iter().map(|f| f.volume_usd).sum::<f64>() / facts.len() as f64;
    info!("volume stats: min={:.2}, max={:.2}, mean={:.2}", min, max, mean);

    let unmatched = |f: fn(&FactRecord) -> bool| facts.iter().filter(|r| f(r)).count();
    info!(
        brand = unmatched(|r| r.brand_id.is_none()),
        distributor = unmatched(|r| r.distributor_id.is_none()),
        channel = unmatched(|r| r.channel_id.is_none()),
        region = unmatched(|r| r.region_id.is_none()),
        "facts with null foreign keys"
    );
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::dimensions::{
        build_brand_dimension, build_channel_dimension, build_distributor_dimension,
        build_region_dimension,
    };
    use crate::table::Value;

    fn sales(with_region: bool) -> Table {
        let mut columns = vec![
            "DATE".to_string(),
            BRAND_CODE_COLUMN.to_string(),
            DISTRIBUTOR_COLUMN.to_string(),
            TRADE_CHANNEL_COLUMN.to_string(),
            USD_VOLUME.to_string(),
        ];
        if with_region {
            columns.push("REGION".to_string());
        }
        let d = Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        Table::new("sales", columns).with_rows(vec![
            vec![
                d.clone(),
                Value::text("P0"),
                Value::text("Dist A"),
                Value::text("BAR"),
                Value::Number(10.0),
                Value::text("Sul"),
            ],
            vec![
                d.clone(),
                Value::text("P0"),
                Value::text("Dist B"),
                Value::text("SUPERMARKET"),
                Value::Number(20.0),
                Value::text("Norte"),
            ],
            vec![
                d,
                Value::text("S1"),
                Value::text("Dist A"),
                Value::text("NOT IN CHANNEL FILE"),
                Value::Number(30.0),
                Value::text("Sul"),
            ],
        ])
    }

    fn channels() -> Table {
        Table::new("channel", vec![TRADE_CHANNEL_COLUMN.to_string()]).with_rows(vec![
            vec![Value::text("BAR")],
            vec![Value::text("SUPERMARKET")],
            vec![Value::text("BAR")],
        ])
    }

    #[test]
    fn test_resolve_date_column() {
        let cols = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(resolve_date_column(&cols(&["X", "DATE", "date"])).unwrap(), "date");
        assert_eq!(resolve_date_column(&cols(&["ORDER_DATE", "DATE"])).unwrap(), "DATE");
        assert_eq!(
            resolve_date_column(&cols(&["X", "ORDER_DATE", "SHIP_DATE"])).unwrap(),
            "ORDER_DATE"
        );
        assert_eq!(resolve_date_column(&cols(&["DATA_VENDA"])).unwrap(), "DATA_VENDA");

        let err = resolve_date_column(&cols(&["X", "Y"])).unwrap_err();
        assert!(matches!(err, EtlError::MissingDateColumn { .. }));
    }

    #[test]
    fn test_resolve_volume_column() {
        let cols = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(
            resolve_volume_column(&cols(&["DOLLAR_VOLUME", "USD_VOLUME"])),
            Some("USD_VOLUME")
        );
        assert_eq!(
            resolve_volume_column(&cols(&["A", "DOLLAR_VOLUME"])),
            Some("DOLLAR_VOLUME")
        );
        assert_eq!(resolve_volume_column(&cols(&["A"])), None);
    }

    #[test]
    fn test_zero_loss_join_with_regions() {
        let sales = sales(true);
        let ctx = RunContext::new(RunConfig::default());
        let mut diagnostics = Diagnostics::new();

        let brands = build_brand_dimension(&sales, &mut diagnostics);
        let distributors = build_distributor_dimension(&sales, &mut diagnostics);
        let channels = build_channel_dimension(&channels(), &mut diagnostics);
        let regions = build_region_dimension(&sales, &mut diagnostics);
        let dims = FactDimensions {
            brands: &brands,
            distributors: &distributors,
            channels: &channels,
            regions: &regions,
        };

        let facts = assemble_facts(&sales, &dims, &ctx, &mut diagnostics).unwrap();

        assert_eq!(facts.len(), sales.len());
        assert_eq!(facts[0].brand_id, facts[1].brand_id);
        assert_ne!(facts[0].distributor_id, facts[1].distributor_id);
        // unmatched channel keeps the row with a null key
        assert_eq!(facts[2].channel_id, None);
        assert_eq!(facts[0].region_id, facts[2].region_id);
        assert_eq!(facts[1].volume_usd, 20.0);
        assert!(facts.iter().all(|f| f.created_at == ctx.started_at));
    }

    #[test]
    fn test_default_region_assigned_to_every_fact() {
        // without a REGION column the sixth value of each row is dropped
        let sales = sales(false);
        let ctx = RunContext::new(RunConfig::default());
        let mut diagnostics = Diagnostics::new();
        let regions = build_region_dimension(&sales, &mut diagnostics);
        let dims = FactDimensions {
            brands: &[],
            distributors: &[],
            channels: &[],
            regions: &regions,
        };

        let facts = assemble_facts(&sales, &dims, &ctx, &mut diagnostics).unwrap();

        assert_eq!(regions.len(), 1);
        assert_eq!(facts.len(), 3);
        assert!(facts
            .iter()
            .all(|f| f.region_id.as_deref() == Some(regions[0].region_id.as_str())));
        assert!(facts.iter().all(|f| f.brand_id.is_none()));
    }

    #[test]
    fn test_duplicate_dimension_keys_are_rejected() {
        let sales = sales(true);
        let ctx = RunContext::new(RunConfig::default());
        let mut diagnostics = Diagnostics::new();
        let brands = vec![
            BrandRecord::new("P0", Some("Pepsi")),
            BrandRecord::new("P0", Some("Pepsi Twist")),
        ];
        let dims = FactDimensions {
            brands: &brands,
            distributors: &[],
            channels: &[],
            regions: &[],
        };

        let err = assemble_facts(&sales, &dims, &ctx, &mut diagnostics).unwrap_err();
        assert!(matches!(err, EtlError::DuplicateNaturalKey { .. }));
    }

    #[test]
    fn test_missing_date_column_is_fatal() {
        let sales = Table::new("sales", vec![BRAND_CODE_COLUMN.to_string()])
            .with_rows(vec![vec![Value::text("P0")]]);
        let ctx = RunContext::new(RunConfig::default());
        let mut diagnostics = Diagnostics::new();
        let dims = FactDimensions {
            brands: &[],
            distributors: &[],
            channels: &[],
            regions: &[],
        };

        let err = assemble_facts(&sales, &dims, &ctx, &mut diagnostics).unwrap_err();
        assert!(matches!(err, EtlError::MissingDateColumn { .. }));
    }
}
