// ⚙️ Run Configuration - figment layers: defaults → TOML → MEDALLION_* env → CLI
//
// The resolved RunConfig is wrapped in a RunContext once per run and passed by
// reference into every stage.

use crate::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Warehouse location that keeps every dataset in memory
pub const IN_MEMORY_WAREHOUSE: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding the raw extracts. Required.
    pub raw_dir: Option<PathBuf>,
    /// Directory of the SQLite warehouse (one file per dataset)
    pub warehouse_dir: PathBuf,
    pub bronze_dataset: String,
    pub silver_dataset: String,
    pub gold_dataset: String,
    /// Value of SOURCE_FILE on cleaned sales rows
    pub sales_source_id: String,
    /// Value of SOURCE_FILE on cleaned channel rows
    pub channel_source_id: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            raw_dir: None,
            warehouse_dir: PathBuf::from("warehouse"),
            bronze_dataset: "bronze".to_string(),
            silver_dataset: "silver".to_string(),
            gold_dataset: "gold".to_string(),
            sales_source_id: "sales_raw".to_string(),
            channel_source_id: "channel_raw".to_string(),
        }
    }
}

impl RunConfig {
    /// Fail fast on unset or unusable parameters, before any transform runs
    pub fn validate(&self) -> Result<()> {
        match &self.raw_dir {
            None => {
                return Err(EtlError::Configuration(
                    "raw_dir is not set (MEDALLION_RAW_DIR)".to_string(),
                ))
            }
            Some(dir) if dir.as_os_str().is_empty() => {
                return Err(EtlError::Configuration("raw_dir is empty".to_string()))
            }
            Some(_) => {}
        }

        let datasets = [
            &self.bronze_dataset,
            &self.silver_dataset,
            &self.gold_dataset,
        ];
        for name in datasets {
            if !is_identifier(name) {
                return Err(EtlError::Configuration(format!(
                    "dataset name '{}' is not a valid identifier",
                    name
                )));
            }
        }
        if self.bronze_dataset == self.silver_dataset
            || self.silver_dataset == self.gold_dataset
            || self.bronze_dataset == self.gold_dataset
        {
            return Err(EtlError::Configuration(
                "bronze, silver and gold datasets must be distinct".to_string(),
            ));
        }

        Ok(())
    }

    /// Raw directory, once validated
    pub fn raw_dir(&self) -> Result<&Path> {
        self.raw_dir
            .as_deref()
            .ok_or_else(|| EtlError::Configuration("raw_dir is not set".to_string()))
    }

    pub fn is_in_memory(&self) -> bool {
        self.warehouse_dir.as_os_str() == IN_MEMORY_WAREHOUSE
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Load configuration.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (`MEDALLION_RAW_DIR`, `MEDALLION_SILVER_DATASET`, ...)
/// 3. TOML config file, when given
/// 4. Built-in defaults
pub fn load_config(
    config_file: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<RunConfig> {
    let mut figment = Figment::from(Serialized::defaults(RunConfig::default()));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("MEDALLION_"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment
        .extract()
        .map_err(|e| EtlError::Configuration(e.to_string()))
}

/// CLI-level overrides; unset fields leave lower layers alone
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_dir: Option<PathBuf>,
}

// ============================================================================
// RUN CONTEXT
// ============================================================================

/// Everything a stage needs to know about the current run.
/// Built once per run; nothing here is process-wide state.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: RunConfig,
    pub run_id: Uuid,
    /// Ingestion timestamp (LOADED_AT) and fact creation timestamp (created_at)
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(config: RunConfig) -> Self {
        Self::started_at(config, Utc::now())
    }

    /// Context with a fixed start time
    pub fn started_at(config: RunConfig, started_at: DateTime<Utc>) -> Self {
        RunContext {
            config,
            run_id: Uuid::new_v4(),
            started_at,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
