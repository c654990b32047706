// 🚰 Pipeline - raw extracts → bronze → silver star schema → gold reports
//
// transform() is pure and in-memory; run() adds the warehouse. Everything
// fatal happens before the first publish, so a failed run leaves the
// warehouse as it was.

use crate::config::RunContext;
use crate::diagnostics::Diagnostics;
use crate::dimensions::{
    build_brand_dimension, build_channel_dimension, build_date_dimension,
    build_distributor_dimension, build_region_dimension, BrandRecord, ChannelRecord, DateRecord,
    DistributorRecord, RegionRecord,
};
use crate::error::Result;
use crate::fact::{assemble_facts, resolve_date_column, FactDimensions, FactRecord};
use crate::ingest::{load_batch, SourceBatch, SourceKind};
use crate::normalize::normalize_table;
use crate::reports::{run_reports, ReportOutcome};
use crate::sanitize::{RowSanitizer, SanitizeStats, SanitizerConfig};
use crate::table::Table;
use crate::warehouse::{PublishedTable, Warehouse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span};
use uuid::Uuid;

pub const SALES_BRONZE: &str = "sales_bronze";
pub const CHANNEL_BRONZE: &str = "channel_bronze";

// ============================================================================
// MODEL
// ============================================================================

/// Output of one transform: cleaned extracts, star schema and diagnostics
#[derive(Debug, Clone)]
pub struct DimensionalModel {
    pub sales: Table,
    pub channel: Table,
    pub sales_stats: SanitizeStats,
    pub channel_stats: SanitizeStats,
    pub brands: Vec<BrandRecord>,
    pub distributors: Vec<DistributorRecord>,
    pub regions: Vec<RegionRecord>,
    pub channels: Vec<ChannelRecord>,
    pub dates: Vec<DateRecord>,
    pub facts: Vec<FactRecord>,
    pub diagnostics: Diagnostics,
}

impl DimensionalModel {
    /// Cleaned extracts, as loaded into bronze
    pub fn bronze_tables(&self) -> Vec<PublishedTable> {
        vec![
            PublishedTable::infer(&self.sales).with_name(SALES_BRONZE),
            PublishedTable::infer(&self.channel).with_name(CHANNEL_BRONZE),
        ]
    }

    /// Star schema, in publish order
    pub fn silver_tables(&self) -> Vec<PublishedTable> {
        vec![
            PublishedTable::from_records("dim_brand", &self.brands),
            PublishedTable::from_records("dim_distributor", &self.distributors),
            PublishedTable::from_records("dim_region", &self.regions),
            PublishedTable::from_records("dim_channel", &self.channels),
            PublishedTable::from_records("dim_date", &self.dates),
            PublishedTable::from_records("fact_sales", &self.facts),
        ]
    }

    pub fn table_counts(&self) -> Vec<TableCount> {
        let count = |table: &str, rows: usize| TableCount {
            table: table.to_string(),
            rows,
        };
        vec![
            count(SALES_BRONZE, self.sales.len()),
            count(CHANNEL_BRONZE, self.channel.len()),
            count("dim_brand", self.brands.len()),
            count("dim_distributor", self.distributors.len()),
            count("dim_region", self.regions.len()),
            count("dim_channel", self.channels.len()),
            count("dim_date", self.dates.len()),
            count("fact_sales", self.facts.len()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedCount {
    pub dataset: String,
    pub table: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub published: Vec<PublishedCount>,
    pub reports: Vec<ReportOutcome>,
    pub diagnostics: Diagnostics,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        let rows: usize = self.published.iter().map(|p| p.rows).sum();
        format!(
            "run {}: {} tables ({} rows) published, {} reports, {}",
            self.run_id,
            self.published.len(),
            rows,
            self.reports.len(),
            self.diagnostics.summary()
        )
    }
}

// ============================================================================
// TRANSFORM
// ============================================================================

/// Build the dimensional model from one batch. No I/O.
pub fn transform(batch: &SourceBatch, ctx: &RunContext) -> Result<DimensionalModel> {
    let span = info_span!("transform", run_id = %ctx.run_id);
    let _enter = span.enter();

    let sales_raw = batch.require(SourceKind::Sales)?;
    let channel_raw = batch.require(SourceKind::Channel)?;
    info!(
        sales = sales_raw.len(),
        channel = channel_raw.len(),
        "starting transform"
    );

    let mut diagnostics = Diagnostics::new();

    let sales = normalize_table(sales_raw.clone(), &mut diagnostics);
    let channel = normalize_table(channel_raw.clone(), &mut diagnostics);

    let (sales, sales_stats) = RowSanitizer::new(SanitizerConfig::sales(
        &ctx.config.sales_source_id,
    ))
    .sanitize(sales, ctx, &mut diagnostics);
    let (channel, channel_stats) = RowSanitizer::new(SanitizerConfig::channel(
        &ctx.config.channel_source_id,
    ))
    .sanitize(channel, ctx, &mut diagnostics);

    // Fatal, so check it before building anything
    let date_column = resolve_date_column(&sales.columns)?.to_string();

    let brands = build_brand_dimension(&sales, &mut diagnostics);
    let distributors = build_distributor_dimension(&sales, &mut diagnostics);
    let regions = build_region_dimension(&sales, &mut diagnostics);
    let channels = build_channel_dimension(&channel, &mut diagnostics);
    let dates = build_date_dimension(&sales, &date_column);

    let facts = assemble_facts(
        &sales,
        &FactDimensions {
            brands: &brands,
            distributors: &distributors,
            channels: &channels,
            regions: &regions,
        },
        ctx,
        &mut diagnostics,
    )?;

    info!("{}", diagnostics.summary());

    Ok(DimensionalModel {
        sales,
        channel,
        sales_stats,
        channel_stats,
        brands,
        distributors,
        regions,
        channels,
        dates,
        facts,
        diagnostics,
    })
}

// ============================================================================
// RUN
// ============================================================================

/// Full run from the configured raw directory
pub fn run(ctx: &RunContext, warehouse: &mut Warehouse) -> Result<RunSummary> {
    ctx.config.validate()?;
    let batch = load_batch(ctx.config.raw_dir()?)?;
    run_batch(&batch, ctx, warehouse)
}

/// Transform an already-loaded batch and publish bronze, silver and gold
pub fn run_batch(
    batch: &SourceBatch,
    ctx: &RunContext,
    warehouse: &mut Warehouse,
) -> Result<RunSummary> {
    let span = info_span!("run", run_id = %ctx.run_id);
    let _enter = span.enter();

    let model = transform(batch, ctx)?;
    let config = &ctx.config;

    for dataset in [
        &config.bronze_dataset,
        &config.silver_dataset,
        &config.gold_dataset,
    ] {
        warehouse.ensure_dataset(dataset)?;
    }

    let mut published = Vec::new();
    let layers = [
        (&config.bronze_dataset, model.bronze_tables()),
        (&config.silver_dataset, model.silver_tables()),
    ];
    for (dataset, tables) in layers {
        for table in tables {
            let rows = warehouse.publish(dataset, &table)?;
            published.push(PublishedCount {
                dataset: dataset.clone(),
                table: table.name.clone(),
                rows,
            });
        }
    }

    let reports = run_reports(warehouse, &config.silver_dataset, &config.gold_dataset)?;

    let summary = RunSummary {
        run_id: ctx.run_id,
        started_at: ctx.started_at,
        published,
        reports,
        diagnostics: model.diagnostics,
    };
    info!("{}", summary.summary());
    Ok(summary)
}

// ============================================================================
// TESTS
// ============================================================================
