// 🏛️ Warehouse - SQLite datasets with truncate-and-reload publishing
//
// One connection; every dataset (bronze, silver, gold) is an attached
// database. On disk each dataset is <warehouse_dir>/<dataset>.db, in memory
// each one is a separate ':memory:' attachment.

use crate::config::{is_identifier, RunConfig};
use crate::dimensions::{BrandRecord, ChannelRecord, DateRecord, DistributorRecord, RegionRecord};
use crate::error::{EtlError, Result};
use crate::fact::FactRecord;
use crate::table::{Table, Value};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// SCHEMA TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    Text,
    Real,
    Integer,
    Date,
    Timestamp,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Integer => "INTEGER",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }

    /// Type of a single non-null value
    fn of(value: &Value) -> Option<ColumnType> {
        match value {
            Value::Null => None,
            Value::Text(_) => Some(ColumnType::Text),
            Value::Number(_) => Some(ColumnType::Real),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnType,
}

impl ColumnDef {
    pub fn new(name: &str, kind: ColumnType) -> Self {
        ColumnDef {
            name: name.to_string(),
            kind,
        }
    }
}

/// A named table with a fixed, typed schema
#[derive(Debug, Clone)]
pub struct PublishedTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
}

/// Typed rows that know their published schema
pub trait TableRow {
    fn schema() -> Vec<ColumnDef>;

    fn values(&self) -> Vec<Value>;
}

impl PublishedTable {
    pub fn from_records<R: TableRow>(name: &str, records: &[R]) -> Self {
        PublishedTable {
            name: name.to_string(),
            columns: R::schema(),
            rows: records.iter().map(TableRow::values).collect(),
        }
    }

    /// Untyped table with the schema inferred from its values.
    /// A column whose non-null values all share one type gets that type;
    /// mixed or all-null columns are TEXT. Repeated headers get a `_<n>`
    /// suffix, since a SQL table cannot hold two columns with one name.
    pub fn infer(table: &Table) -> Self {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let columns = table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let mut kinds = table.column_values(idx).filter_map(ColumnType::of);
                let kind = match kinds.next() {
                    Some(first) if kinds.all(|k| k == first) => first,
                    _ => ColumnType::Text,
                };

                let occurrence = seen.entry(name.to_ascii_uppercase()).or_insert(0);
                *occurrence += 1;
                if *occurrence == 1 {
                    ColumnDef::new(name, kind)
                } else {
                    let renamed = format!("{}_{}", name, occurrence);
                    debug!(table = %table.name, column = %name, published_as = %renamed, "repeated header");
                    ColumnDef::new(&renamed, kind)
                }
            })
            .collect();

        PublishedTable {
            name: table.name.clone(),
            columns,
            rows: table.rows.clone(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Number(n) => ToSqlOutput::Owned(SqlValue::Real(*n)),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format("%Y-%m-%d").to_string())),
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(ts.to_rfc3339())),
        })
    }
}

fn opt_text(value: &Option<String>) -> Value {
    value.as_deref().map(Value::text).unwrap_or(Value::Null)
}

// ============================================================================
// ROW MAPPINGS (published schemas)
// ============================================================================

impl TableRow for BrandRecord {
    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("brand_id", ColumnType::Text),
            ColumnDef::new("natural_key", ColumnType::Text),
            ColumnDef::new("brand", ColumnType::Text),
            ColumnDef::new("flavor", ColumnType::Text),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::text(&self.brand_id),
            Value::text(&self.natural_key),
            Value::text(&self.brand),
            Value::text(&self.flavor),
        ]
    }
}

impl TableRow for DistributorRecord {
    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("distributor_id", ColumnType::Text),
            ColumnDef::new("natural_key", ColumnType::Text),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::text(&self.distributor_id), Value::text(&self.natural_key)]
    }
}

impl TableRow for RegionRecord {
    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("region_id", ColumnType::Text),
            ColumnDef::new("region_name", ColumnType::Text),
            ColumnDef::new("region_code", ColumnType::Text),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::text(&self.region_id),
            Value::text(&self.region_name),
            Value::text(&self.region_code),
        ]
    }
}

impl TableRow for ChannelRecord {
    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("channel_id", ColumnType::Text),
            ColumnDef::new("trade_channel", ColumnType::Text),
            ColumnDef::new("trade_group", ColumnType::Text),
            ColumnDef::new("trade_type", ColumnType::Text),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::text(&self.channel_id),
            Value::text(&self.trade_channel),
            Value::text(&self.trade_group),
            Value::text(&self.trade_type),
        ]
    }
}

impl TableRow for DateRecord {
    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("date", ColumnType::Date),
            ColumnDef::new("year", ColumnType::Integer),
            ColumnDef::new("month", ColumnType::Integer),
            ColumnDef::new("month_name", ColumnType::Text),
            ColumnDef::new("week", ColumnType::Integer),
            ColumnDef::new("weekday", ColumnType::Text),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Date(self.date),
            Value::Number(self.year as f64),
            Value::Number(self.month as f64),
            Value::text(&self.month_name),
            Value::Number(self.week as f64),
            Value::text(&self.weekday),
        ]
    }
}

impl TableRow for FactRecord {
    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("date", ColumnType::Date),
            ColumnDef::new("brand_id", ColumnType::Text),
            ColumnDef::new("distributor_id", ColumnType::Text),
            ColumnDef::new("channel_id", ColumnType::Text),
            ColumnDef::new("region_id", ColumnType::Text),
            ColumnDef::new("volume_usd", ColumnType::Real),
            ColumnDef::new("created_at", ColumnType::Timestamp),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Date(self.date),
            opt_text(&self.brand_id),
            opt_text(&self.distributor_id),
            opt_text(&self.channel_id),
            opt_text(&self.region_id),
            Value::Number(self.volume_usd),
            Value::Timestamp(self.created_at),
        ]
    }
}

// ============================================================================
// WAREHOUSE
// ============================================================================

/// Lifecycle of a dataset within one warehouse session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DatasetState {
    /// Not on disk and not attached
    Absent,
    /// Being created; stays here if attaching fails
    Creating,
    /// Attached (and on disk, for file-backed warehouses)
    Present,
}

pub struct Warehouse {
    conn: Connection,
    /// None for an in-memory warehouse
    root: Option<PathBuf>,
    states: HashMap<String, DatasetState>,
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn check_identifier(kind: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(EtlError::Configuration(format!(
            "{} name '{}' is not a valid identifier",
            kind, name
        )))
    }
}

impl Warehouse {
    /// File-backed warehouse rooted at `dir` (created if missing)
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join("catalog.db"))?;
        // WAL for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!(dir = %dir.display(), "warehouse opened");

        Ok(Warehouse {
            conn,
            root: Some(dir.to_path_buf()),
            states: HashMap::new(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Warehouse {
            conn: Connection::open_in_memory()?,
            root: None,
            states: HashMap::new(),
        })
    }

    /// In-memory when `warehouse_dir` is `:memory:`, file-backed otherwise
    pub fn for_config(config: &RunConfig) -> Result<Self> {
        if config.is_in_memory() {
            Self::open_in_memory()
        } else {
            Self::open(&config.warehouse_dir)
        }
    }

    fn dataset_file(&self, dataset: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(format!("{}.db", dataset)))
    }

    /// Explicit existence check: attached in this session, or present on disk
    pub fn dataset_exists(&self, dataset: &str) -> Result<bool> {
        check_identifier("dataset", dataset)?;
        if self.states.get(dataset) == Some(&DatasetState::Present) {
            return Ok(true);
        }
        Ok(self.dataset_file(dataset).is_some_and(|f| f.exists()))
    }

    pub fn dataset_state(&self, dataset: &str) -> Result<DatasetState> {
        if let Some(state) = self.states.get(dataset) {
            return Ok(*state);
        }
        Ok(if self.dataset_exists(dataset)? {
            DatasetState::Present
        } else {
            DatasetState::Absent
        })
    }

    fn attach(&self, dataset: &str) -> Result<()> {
        let location = self
            .dataset_file(dataset)
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string());
        self.conn.execute(
            &format!("ATTACH DATABASE ?1 AS {}", quote(dataset)),
            [location],
        )?;
        Ok(())
    }

    /// Create-if-absent, idempotent. Absent → Creating → Present, or
    /// straight to Present for a dataset that already exists.
    pub fn ensure_dataset(&mut self, dataset: &str) -> Result<DatasetState> {
        check_identifier("dataset", dataset)?;
        if self.states.get(dataset) == Some(&DatasetState::Present) {
            return Ok(DatasetState::Present);
        }

        if self.dataset_exists(dataset)? {
            info!(dataset, "dataset already exists");
        } else {
            self.states.insert(dataset.to_string(), DatasetState::Creating);
            info!(dataset, "creating dataset");
        }

        self.attach(dataset)?;
        self.states.insert(dataset.to_string(), DatasetState::Present);
        Ok(DatasetState::Present)
    }

    /// Attach a dataset only if it already exists. Never creates one.
    pub fn open_dataset(&mut self, dataset: &str) -> Result<bool> {
        if !self.dataset_exists(dataset)? {
            return Ok(false);
        }
        self.ensure_dataset(dataset)?;
        Ok(true)
    }

    /// Truncate-and-reload one table. The schema is recreated from the
    /// table's columns, so nothing from the previous load survives.
    pub fn publish(&mut self, dataset: &str, table: &PublishedTable) -> Result<usize> {
        check_identifier("table", &table.name)?;
        self.ensure_dataset(dataset)?;

        let target = format!("{}.{}", quote(dataset), quote(&table.name));
        let column_sql: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{} {}", quote(&c.name), c.kind.sql()))
            .collect();
        let placeholders: Vec<String> = (1..=table.columns.len()).map(|i| format!("?{}", i)).collect();

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", target), [])?;
        tx.execute(
            &format!("CREATE TABLE {} ({})", target, column_sql.join(", ")),
            [],
        )?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                target,
                placeholders.join(", ")
            ))?;
            for row in &table.rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        let loaded = self.row_count(dataset, &table.name)?;
        info!(
            dataset,
            table = %table.name,
            rows = loaded,
            columns = table.columns.len(),
            "table loaded"
        );
        for column in &table.columns {
            debug!(table = %table.name, column = %column.name, kind = column.kind.sql(), "schema");
        }
        Ok(loaded)
    }

    /// Replace `dataset.table` with the result of a SELECT over attached datasets
    pub fn create_table_as(&mut self, dataset: &str, table: &str, select: &str) -> Result<usize> {
        check_identifier("table", table)?;
        self.ensure_dataset(dataset)?;

        let target = format!("{}.{}", quote(dataset), quote(table));
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", target), [])?;
        tx.execute(&format!("CREATE TABLE {} AS {}", target, select), [])?;
        tx.commit()?;

        self.row_count(dataset, table)
    }

    pub fn table_exists(&self, dataset: &str, table: &str) -> Result<bool> {
        check_identifier("dataset", dataset)?;
        if self.states.get(dataset) != Some(&DatasetState::Present) {
            return Ok(false);
        }
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
                quote(dataset)
            ),
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_tables(&self, dataset: &str) -> Result<Vec<String>> {
        check_identifier("dataset", dataset)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name FROM {}.sqlite_master WHERE type = 'table' ORDER BY name",
            quote(dataset)
        ))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn row_count(&self, dataset: &str, table: &str) -> Result<usize> {
        check_identifier("dataset", dataset)?;
        check_identifier("table", table)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}.{}", quote(dataset), quote(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// All rows of a table as JSON objects (column name → value)
    pub fn read_rows(
        &self,
        dataset: &str,
        table: &str,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
        check_identifier("dataset", dataset)?;
        check_identifier("table", table)?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}.{}", quote(dataset), quote(table)))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut object = serde_json::Map::new();
                for (idx, name) in names.iter().enumerate() {
                    let value = match row.get_ref(idx)? {
                        ValueRef::Null => serde_json::Value::Null,
                        ValueRef::Integer(i) => serde_json::json!(i),
                        ValueRef::Real(f) => serde_json::json!(f),
                        ValueRef::Text(t) => {
                            serde_json::Value::String(String::from_utf8_lossy(t).into_owned())
                        }
                        ValueRef::Blob(b) => serde_json::json!(b),
                    };
                    object.insert(name.clone(), value);
                }
                Ok(object)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

// ============================================================================
// TESTS
// ============================================================================
