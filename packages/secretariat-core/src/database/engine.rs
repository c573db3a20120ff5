//! # Engine
//!
//! In-memory SQLite engine (native targets) built on `rusqlite`.
//!
//! ## Engine Operations
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ENGINE OPERATIONS                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  image bytes ──► from_image() ──► sqlite3_deserialize ──┐               │
//! │                                                         ▼               │
//! │  open_empty() ─────────────────────────────────► ┌─────────────┐        │
//! │                                                  │ Connection  │        │
//! │  exec / insert / query / query_scalar ◄────────► │ (in memory) │        │
//! │                                                  └──────┬──────┘        │
//! │                                                         │               │
//! │  export() ◄──────────── sqlite3_serialize ◄─────────────┘               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Parameters are a JSON array and rows come back as JSON objects keyed by
//! column name. The WASM build (`wasm_engine.rs`) exposes the same API on top
//! of sql.js, so the record accessors have one code path.

use std::ptr::NonNull;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use rusqlite::serialize::OwnedData;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, DatabaseName};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One result row, keyed by column name
pub type Row = Map<String, Value>;

/// The embedded relational engine
///
/// Wraps a single in-memory SQLite connection. The whole database lives in
/// memory; [`Engine::export`] produces the image that storage persists.
pub struct Engine {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an empty database
    pub fn open_empty() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to create in-memory database: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Rebuild a database from a previously exported image
    pub fn from_image(image: &[u8]) -> Result<Self> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to create in-memory database: {}", e)))?;
        let data = owned_data_from_bytes(image)?;
        conn.deserialize(DatabaseName::Main, data, false)
            .map_err(|e| Error::Corrupted(format!("Failed to load image: {}", e)))?;

        // The header is only checked on first access.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| Error::Corrupted(format!("Image is not a database: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Serialize the full database state
    pub fn export(&self) -> Result<Vec<u8>> {
        let conn = self.conn.lock();
        let data = conn
            .serialize(DatabaseName::Main)
            .map_err(|e| Error::Database(format!("Failed to export image: {}", e)))?;
        Ok(data.to_vec())
    }

    /// Run one statement, returning the number of changed rows
    pub fn exec(&self, sql: &str, params: Value) -> Result<usize> {
        let values = bind_values(params)?;
        let conn = self.conn.lock();
        conn.execute(sql, params_from_iter(values.iter()))
            .map_err(|e| Error::Database(format!("Statement failed: {}", e)))
    }

    /// Run one INSERT, returning the new row id
    pub fn insert(&self, sql: &str, params: Value) -> Result<i64> {
        let values = bind_values(params)?;
        let conn = self.conn.lock();
        conn.execute(sql, params_from_iter(values.iter()))
            .map_err(|e| Error::Database(format!("Insert failed: {}", e)))?;
        Ok(conn.last_insert_rowid())
    }

    /// Run several parameterless statements
    pub fn exec_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(sql)
            .map_err(|e| Error::Database(format!("Batch failed: {}", e)))
    }

    /// Run a query, returning every row
    pub fn query(&self, sql: &str, params: Value) -> Result<Vec<Row>> {
        let values = bind_values(params)?;
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(|e| Error::Database(format!("Query failed: {}", e)))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| Error::Database(format!("Failed to read row: {}", e)))?
        {
            let mut map = Map::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                let value = row
                    .get_ref(i)
                    .map_err(|e| Error::Database(format!("Failed to read column {}: {}", name, e)))?;
                map.insert(name.clone(), to_json(value));
            }
            out.push(map);
        }
        Ok(out)
    }

    /// First column of the first row, `None` for no rows or NULL
    pub fn query_scalar<T: DeserializeOwned>(&self, sql: &str, params: Value) -> Result<Option<T>> {
        let values = bind_values(params)?;
        let conn = self.conn.lock();
        let result = conn.query_row(sql, params_from_iter(values.iter()), |row| {
            Ok(to_json(row.get_ref(0)?))
        });

        let value = match result {
            Ok(Value::Null) | Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Ok(value) => value,
            Err(e) => return Err(Error::Database(format!("Scalar query failed: {}", e))),
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::Database(format!("Failed to parse scalar: {}", e)))
    }

    /// Run `f` inside a transaction, rolling back if it fails
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.exec_batch("BEGIN")?;
        match f(self) {
            Ok(value) => {
                self.exec_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.exec_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn bind_values(params: Value) -> Result<Vec<SqlValue>> {
    let items = match params {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(Error::Internal(format!(
                "Statement parameters must be an array, got {}",
                other
            )))
        }
    };

    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(b as i64),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s),
            other => SqlValue::Text(other.to_string()),
        })
        .collect())
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(STANDARD.encode(b)),
    }
}

fn owned_data_from_bytes(bytes: &[u8]) -> Result<OwnedData> {
    if bytes.is_empty() {
        return Err(Error::Corrupted("Image is empty".to_string()));
    }

    let size: i32 = bytes
        .len()
        .try_into()
        .map_err(|_| Error::Corrupted("Image too large".to_string()))?;

    // SAFETY: sqlite3_malloc returns a valid pointer or null; null is
    // checked before use.
    let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
    let ptr = NonNull::new(raw)
        .ok_or_else(|| Error::Database("SQLite allocation failed".to_string()))?;

    // SAFETY: `ptr` points to `size == bytes.len()` freshly allocated bytes
    // that cannot overlap `bytes`. OwnedData takes over the sqlite3_malloc'd
    // buffer and SQLite frees it when the connection closes.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
        Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
