// 📥 Source Ingest - raw extracts → in-memory tables
//
// Two logical sources per batch:
// - sales:   UTF-16, tab separated (spreadsheet export)
// - channel: UTF-8, comma separated
// Files are discovered by name in the raw directory.

use crate::error::{EtlError, Result};
use crate::table::{Table, Value};
use csv::ReaderBuilder;
use encoding_rs::{UTF_16LE, UTF_8};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ============================================================================
// SOURCE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Sales,
    Channel,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Sales => "sales",
            SourceKind::Channel => "channel",
        }
    }

    /// How extracts of this kind are encoded on disk
    pub fn format(&self) -> ExtractFormat {
        match self {
            SourceKind::Sales => ExtractFormat {
                encoding: TextEncoding::Utf16,
                delimiter: b'\t',
            },
            SourceKind::Channel => ExtractFormat {
                encoding: TextEncoding::Utf8,
                delimiter: b',',
            },
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// BOM-aware; little endian when no BOM is present
    Utf16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractFormat {
    pub encoding: TextEncoding,
    pub delimiter: u8,
}

/// Cells read as null (same spellings spreadsheet readers treat as missing)
pub const NA_VALUES: [&str; 10] = [
    "", "#N/A", "N/A", "NA", "n/a", "NULL", "null", "NaN", "nan", "<NA>",
];

// ============================================================================
// DETECTION
// ============================================================================

/// Detect source kind from a file name.
///
/// # Examples:
/// ```
/// use medallion_etl::ingest::{detect_source, SourceKind};
/// use std::path::Path;
/// assert_eq!(detect_source(Path::new("raw/abi_sales_2024.csv")), Some(SourceKind::Sales));
/// assert_eq!(detect_source(Path::new("raw/Channel_Groups.csv")), Some(SourceKind::Channel));
/// assert_eq!(detect_source(Path::new("raw/sales.xlsx")), None);
/// ```
pub fn detect_source(path: &Path) -> Option<SourceKind> {
    let filename = path.file_name().and_then(|n| n.to_str())?;
    if !filename.ends_with(".csv") {
        return None;
    }

    let filename_lower = filename.to_lowercase();
    if filename_lower.contains("sales") {
        Some(SourceKind::Sales)
    } else if filename_lower.contains("channel") {
        Some(SourceKind::Channel)
    } else {
        None
    }
}

// ============================================================================
// DECODING & PARSING
// ============================================================================

/// Decode raw bytes to text. A UTF-16 BOM picks the byte order; without one
/// the bytes are read as little endian. Malformed input is an error, never
/// replacement characters.
pub fn decode(bytes: &[u8], encoding: TextEncoding, origin: &str) -> Result<String> {
    let (text, had_errors) = match encoding {
        TextEncoding::Utf8 => UTF_8.decode_with_bom_removal(bytes),
        TextEncoding::Utf16 => {
            let (text, actual, had_errors) = UTF_16LE.decode(bytes);
            if actual != UTF_16LE {
                debug!(path = origin, encoding = actual.name(), "BOM overrides default");
            }
            (text, had_errors)
        }
    };

    if had_errors {
        return Err(EtlError::Encoding {
            path: origin.to_string(),
            message: format!("malformed {:?} input", encoding),
        });
    }
    Ok(text.into_owned())
}

/// Parse delimited text into a table. Headers are kept verbatim.
pub fn parse_delimited(text: &str, delimiter: u8, name: &str) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut table = Table::new(name, columns);

    for result in reader.records() {
        let record = result?;
        let row = record
            .iter()
            .map(|cell| {
                if NA_VALUES.contains(&cell) {
                    Value::Null
                } else {
                    Value::from_cell(cell)
                }
            })
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

/// Read one extract file in the format of its source kind
pub fn read_extract(path: &Path, kind: SourceKind) -> Result<Table> {
    let format = kind.format();
    let bytes = fs::read(path)?;
    let origin = path.display().to_string();
    let text = decode(&bytes, format.encoding, &origin)?;

    let table = parse_delimited(&text, format.delimiter, &format!("{}_raw", kind.name()))?;
    info!(
        source = %kind,
        file = %origin,
        rows = table.len(),
        columns = table.columns.len(),
        "extract read"
    );
    Ok(table)
}

// ============================================================================
// BATCH
// ============================================================================

/// One run's worth of raw tables
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub sales: Option<Table>,
    pub channel: Option<Table>,
    /// Files that produced the tables above
    pub files: Vec<PathBuf>,
}

impl SourceBatch {
    pub fn new(sales: Option<Table>, channel: Option<Table>) -> Self {
        SourceBatch {
            sales,
            channel,
            files: Vec::new(),
        }
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Table> {
        match kind {
            SourceKind::Sales => self.sales.as_ref(),
            SourceKind::Channel => self.channel.as_ref(),
        }
    }

    /// The table for a mandatory source, or MissingSource
    pub fn require(&self, kind: SourceKind) -> Result<&Table> {
        self.get(kind).ok_or(EtlError::MissingSource(kind))
    }

    fn set(&mut self, kind: SourceKind, table: Table) {
        match kind {
            SourceKind::Sales => self.sales = Some(table),
            SourceKind::Channel => self.channel = Some(table),
        }
    }
}

/// Scan the raw directory and read every recognized extract.
///
/// Files are visited in name order; if two files map to the same source the
/// later one wins. Unrecognized files are skipped.
pub fn load_batch(raw_dir: &Path) -> Result<SourceBatch> {
    if !raw_dir.is_dir() {
        return Err(EtlError::Configuration(format!(
            "raw directory {} does not exist",
            raw_dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(raw_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();
    info!(dir = %raw_dir.display(), files = paths.len(), "scanning raw directory");

    let mut batch = SourceBatch::default();
    for path in paths {
        let Some(kind) = detect_source(&path) else {
            continue;
        };
        if batch.get(kind).is_some() {
            warn!(source = %kind, file = %path.display(), "replacing earlier extract for the same source");
        }
        let table = read_extract(&path, kind)?;
        batch.set(kind, table);
        batch.files.push(path);
    }

    if batch.files.is_empty() {
        warn!(dir = %raw_dir.display(), "no extracts found");
    }

    Ok(batch)
}

// ============================================================================
// TESTS
// ============================================================================
