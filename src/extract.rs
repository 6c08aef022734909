//! Raw table extraction from the catalog warehouse.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::RAW_TABLES;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Warehouse not found: {0}")]
    NotFound(PathBuf),
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("Unsupported BLOB value in {table}.{column}")]
    Blob { table: String, column: String },
}

pub type Result<T> = std::result::Result<T, ExtractionError>;

/// A complete in-memory snapshot of one warehouse table. Column names are
/// exactly the warehouse's; `None` is a SQL NULL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Source of raw catalog tables.
pub trait Extractor {
    fn extract(&self, table: &str) -> Result<RawTable>;
}

/// Read-only view of a SQLite file holding the catalog tables.
pub struct SqliteWarehouse {
    pub conn: Connection,
}

impl SqliteWarehouse {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ExtractionError::NotFound(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }
}

impl Extractor for SqliteWarehouse {
    fn extract(&self, table: &str) -> Result<RawTable> {
        if !RAW_TABLES.contains(&table) {
            return Err(ExtractionError::UnknownTable(table.to_string()));
        }

        let mut stmt = self.conn.prepare(&format!("SELECT * FROM \"{table}\""))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                let cell = match row.get_ref(i)? {
                    ValueRef::Null => None,
                    ValueRef::Integer(v) => Some(v.to_string()),
                    ValueRef::Real(v) => Some(v.to_string()),
                    ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(_) => {
                        return Err(ExtractionError::Blob {
                            table: table.to_string(),
                            column: columns[i].clone(),
                        });
                    }
                };
                cells.push(cell);
            }
            rows.push(cells);
        }

        log::debug!("Extracted {} rows from {table}", rows.len());
        Ok(RawTable { columns, rows })
    }
}
