//! Record Sink - pushes table rows into a key-value store
//!
//! Every row becomes one item keyed by an identifier column, with each
//! field serialized as text. Failed rows are counted and skipped.

use crate::error::{PrepError, Result};
use crate::normalizer::values::text_values;
use polars::prelude::*;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// One exported record: field name -> text value.
pub type Item = BTreeMap<String, String>;

/// Destination for exported records.
pub trait RecordSink {
    /// Insert or replace the item stored under `key`.
    fn put(&mut self, key: &str, item: &Item) -> Result<()>;

    /// Sink name for logging (e.g., "memory", "sqlite")
    fn sink_type(&self) -> &str;
}

/// In-memory store, mostly useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub items: HashMap<String, Item>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for MemorySink {
    fn put(&mut self, key: &str, item: &Item) -> Result<()> {
        self.items.insert(key.to_string(), item.clone());
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "memory"
    }
}

/// SQLite-backed key-value table. Items are stored as JSON text.
pub struct SqliteSink {
    db: Connection,
    table: String,
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Connection::open(path)
            .map_err(|e| PrepError::Sqlite(format!("Failed to open database: {}", e)))?;
        Self::with_connection(db, table)
    }

    pub fn in_memory(table: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(db: Connection, table: &str) -> Result<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PrepError::Config(format!("Invalid table name '{}'", table)));
        }
        db.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, item TEXT NOT NULL)",
                table
            ),
            [],
        )
        .map_err(|e| PrepError::Sqlite(format!("Failed to create table: {}", e)))?;

        Ok(Self {
            db,
            table: table.to_string(),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<Item>> {
        let sql = format!("SELECT item FROM {} WHERE id = ?1", self.table);
        let raw: Option<String> = match self.db.query_row(&sql, params![key], |row| row.get(0)) {
            Ok(raw) => Some(raw),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let n: i64 = self.db.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl RecordSink for SqliteSink {
    fn put(&mut self, key: &str, item: &Item) -> Result<()> {
        let encoded = serde_json::to_string(item)?;
        self.db.execute(
            &format!("INSERT OR REPLACE INTO {} (id, item) VALUES (?1, ?2)", self.table),
            params![key, encoded],
        )?;
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "sqlite"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Column whose value keys each record
    pub key_column: String,

    /// Rename the key column in exported items (e.g., user_id -> customer_id)
    pub rename_key: Option<String>,

    /// Export only the first N rows
    pub limit: Option<usize>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            key_column: "user_id".to_string(),
            rename_key: None,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSummary {
    pub records_written: usize,
    pub missing_key: usize,
    pub failed: usize,
}

/// Write every row of `df` into `sink`.
///
/// Missing cells are exported as empty text. A row whose key is missing, or
/// whose `put` fails, is skipped and the export continues.
pub fn export_records(
    df: &DataFrame,
    options: &ExportOptions,
    sink: &mut dyn RecordSink,
) -> Result<ExportSummary> {
    if df.column(&options.key_column).is_err() {
        return Err(PrepError::MissingColumn(options.key_column.clone()));
    }

    let rows = options.limit.map_or(df.height(), |n| n.min(df.height()));
    let df = df.head(Some(rows));

    let mut fields: Vec<(String, Vec<Option<String>>)> = Vec::with_capacity(df.width());
    for name in df.get_column_names() {
        let exported_name = match &options.rename_key {
            Some(renamed) if name == options.key_column => renamed.clone(),
            _ => name.to_string(),
        };
        fields.push((exported_name, text_values(&df, name)?));
    }
    let keys = text_values(&df, &options.key_column)?;

    let mut summary = ExportSummary::default();
    for (row, key) in keys.iter().enumerate() {
        let Some(key) = key else {
            summary.missing_key += 1;
            continue;
        };
        let item: Item = fields
            .iter()
            .map(|(name, values)| (name.clone(), values[row].clone().unwrap_or_default()))
            .collect();

        match sink.put(key, &item) {
            Ok(()) => summary.records_written += 1,
            Err(e) => {
                warn!("Failed to write record '{}': {}", key, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "{} rows ingested into {} sink ({} without key, {} failed)",
        summary.records_written,
        sink.sink_type(),
        summary.missing_key,
        summary.failed
    );
    Ok(summary)
}
