// Medallion ETL - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod diagnostics;
pub mod dimensions; // Brand / Distributor / Region / Channel / Date builders
pub mod error;
pub mod fact; // Fact assembler (zero-loss left joins)
pub mod ingest; // Raw extract discovery and decoding
pub mod keys;
pub mod normalize;
pub mod pipeline; // bronze → silver → gold orchestration
pub mod reports; // Gold SQL reports
pub mod sanitize;
pub mod table;
pub mod telemetry;
pub mod warehouse; // SQLite datasets

// Re-export commonly used types
pub use config::{load_config, ConfigOverrides, RunConfig, RunContext};
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use dimensions::{
    BrandRecord, ChannelRecord, DateRecord, DimensionIndex, DimensionRecord, DistributorRecord,
    RegionRecord,
};
pub use error::{EtlError, Result};
pub use fact::{assemble_facts, FactDimensions, FactRecord};
pub use ingest::{load_batch, SourceBatch, SourceKind};
pub use keys::surrogate_key;
pub use normalize::{normalize_column_name, normalize_table};
pub use pipeline::{run, run_batch, transform, DimensionalModel, RunSummary};
pub use reports::{run_reports, GoldReport, ReportOutcome, GOLD_REPORTS};
pub use sanitize::{RowSanitizer, SanitizeStats, SanitizerConfig};
pub use table::{Table, Value};
pub use warehouse::{ColumnType, DatasetState, PublishedTable, TableRow, Warehouse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
