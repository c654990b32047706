// Medallion ETL - CLI
// run: raw extracts → bronze → silver → gold
// transform: build the dimensional model only, nothing is written
// report: rebuild the gold tables from an existing silver dataset

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medallion_etl::config::{load_config, ConfigOverrides, RunConfig, RunContext};
use medallion_etl::ingest::load_batch;
use medallion_etl::pipeline::{self, TableCount};
use medallion_etl::reports::run_reports;
use medallion_etl::telemetry::{filter_for_verbosity, init_tracing};
use medallion_etl::warehouse::Warehouse;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medallion", version, about = "Sales extracts to a dimensional warehouse")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with the raw sales/channel extracts
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,

    /// Warehouse directory (":memory:" for a throwaway run)
    #[arg(long, global = true)]
    warehouse_dir: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full bronze → silver → gold run
    Run,
    /// Build the dimensional model without publishing it
    Transform {
        /// Print counts and diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-run the gold reports over the published silver tables
    Report,
}

#[derive(Serialize)]
struct TransformOutput<'a> {
    tables: Vec<TableCount>,
    diagnostics: &'a medallion_etl::Diagnostics,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&filter_for_verbosity(cli.verbose))?;

    let overrides = ConfigOverrides {
        raw_dir: cli.raw_dir.clone(),
        warehouse_dir: cli.warehouse_dir.clone(),
    };
    let config = load_config(cli.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")?;

    match cli.command {
        Command::Run => run_pipeline(config),
        Command::Transform { json } => run_transform(config, json),
        Command::Report => run_gold(config),
    }
}

fn run_pipeline(config: RunConfig) -> Result<()> {
    println!("🥉🥈🥇 Medallion ETL - full run");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut warehouse = Warehouse::for_config(&config).context("Failed to open warehouse")?;
    let ctx = RunContext::new(config);
    let summary = pipeline::run(&ctx, &mut warehouse)?;

    println!("\n💾 Published tables:");
    for table in &summary.published {
        println!("  {}.{:<20} {:>8} rows", table.dataset, table.table, table.rows);
    }
    println!("\n🥇 Gold reports:");
    for report in &summary.reports {
        println!("  {:<35} {:>8} rows", report.name, report.rows);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {}", summary.summary());
    for warning in &summary.diagnostics.warnings {
        println!(
            "⚠️  [{}] {}.{}: {} ({})",
            warning.kind.as_str(),
            warning.stage,
            warning.field,
            warning.message,
            warning.count
        );
    }

    Ok(())
}

fn run_transform(config: RunConfig, json: bool) -> Result<()> {
    config.validate()?;
    let raw_dir = config.raw_dir()?.to_path_buf();
    let batch = load_batch(&raw_dir)
        .with_context(|| format!("Failed to read extracts from {}", raw_dir.display()))?;

    let ctx = RunContext::new(config);
    let model = pipeline::transform(&batch, &ctx)?;

    if json {
        let output = TransformOutput {
            tables: model.table_counts(),
            diagnostics: &model.diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("📊 Dimensional model (not published)");
    for count in model.table_counts() {
        println!("  {:<20} {:>8} rows", count.table, count.rows);
    }
    println!("\n🧹 sales:   {}", model.sales_stats.summary());
    println!("🧹 channel: {}", model.channel_stats.summary());
    println!("\n{}", model.diagnostics.summary());

    Ok(())
}

fn run_gold(config: RunConfig) -> Result<()> {
    let mut warehouse = Warehouse::for_config(&config).context("Failed to open warehouse")?;
    let outcomes = run_reports(
        &mut warehouse,
        &config.silver_dataset,
        &config.gold_dataset,
    )?;

    println!("🥇 Gold reports rebuilt:");
    for outcome in outcomes {
        println!("  {:<35} {:>8} rows", outcome.name, outcome.rows);
    }
    Ok(())
}
