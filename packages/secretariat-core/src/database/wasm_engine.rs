//! # WASM Engine
//!
//! SQLite engine for WebAssembly using sql.js via JavaScript interop.
//!
//! This module provides the same `Engine` API as `engine.rs` but uses
//! `wasm_bindgen` to call into a JavaScript-side sql.js instance instead
//! of using `rusqlite` directly (which requires C compilation and won't
//! target `wasm32-unknown-unknown`).
//!
//! The bridge keeps one live sql.js `Database`; images cross it as base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

use crate::error::{Error, Result};

/// One result row, keyed by column name
pub type Row = Map<String, Value>;

// ============================================================================
// JAVASCRIPT BRIDGE: extern functions provided by sql-bridge.ts
// ============================================================================

#[wasm_bindgen]
extern "C" {
    /// Replace the live database: empty when `image_b64` is null.
    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_sql"], js_name = "open", catch)]
    fn sql_bridge_open(image_b64: Option<String>) -> std::result::Result<bool, JsValue>;

    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_sql"], js_name = "execute", catch)]
    fn sql_bridge_execute(sql: &str, params_json: &str) -> std::result::Result<i32, JsValue>;

    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_sql"], js_name = "executeBatch", catch)]
    fn sql_bridge_execute_batch(sql: &str) -> std::result::Result<bool, JsValue>;

    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_sql"], js_name = "query", catch)]
    fn sql_bridge_query(sql: &str, params_json: &str) -> std::result::Result<String, JsValue>;

    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_sql"], js_name = "queryValue", catch)]
    fn sql_bridge_query_value(sql: &str, params_json: &str) -> std::result::Result<String, JsValue>;

    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_sql"], js_name = "lastInsertId", catch)]
    fn sql_bridge_last_insert_id() -> std::result::Result<f64, JsValue>;

    /// Base64 of `Database.export()`.
    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_sql"], js_name = "export", catch)]
    fn sql_bridge_export() -> std::result::Result<String, JsValue>;
}

// ============================================================================
// HELPERS
// ============================================================================

fn js_err(e: JsValue) -> Error {
    let msg = e.as_string().unwrap_or_else(|| format!("{:?}", e));
    Error::Database(msg)
}

fn params_json(params: &Value) -> Result<String> {
    match params {
        Value::Null => Ok("[]".to_string()),
        Value::Array(_) => Ok(params.to_string()),
        other => Err(Error::Internal(format!(
            "Statement parameters must be an array, got {}",
            other
        ))),
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// The embedded relational engine (WASM version)
pub struct Engine {
    _open: (),
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an empty database
    pub fn open_empty() -> Result<Self> {
        sql_bridge_open(None).map_err(js_err)?;
        Ok(Self { _open: () })
    }

    /// Rebuild a database from a previously exported image
    pub fn from_image(image: &[u8]) -> Result<Self> {
        if image.is_empty() {
            return Err(Error::Corrupted("Image is empty".to_string()));
        }
        sql_bridge_open(Some(STANDARD.encode(image)))
            .map_err(|e| Error::Corrupted(format!("Failed to load image: {:?}", e)))?;

        let engine = Self { _open: () };
        engine
            .query_scalar::<i64>("SELECT count(*) FROM sqlite_master", Value::Null)
            .map_err(|e| Error::Corrupted(format!("Image is not a database: {}", e)))?;
        Ok(engine)
    }

    /// Serialize the full database state
    pub fn export(&self) -> Result<Vec<u8>> {
        let b64 = sql_bridge_export().map_err(js_err)?;
        STANDARD
            .decode(&b64)
            .map_err(|e| Error::Database(format!("Failed to decode exported image: {}", e)))
    }

    /// Run one statement, returning the number of changed rows
    pub fn exec(&self, sql: &str, params: Value) -> Result<usize> {
        let pj = params_json(&params)?;
        let changed = sql_bridge_execute(sql, &pj).map_err(js_err)?;
        Ok(changed.max(0) as usize)
    }

    /// Run one INSERT, returning the new row id
    pub fn insert(&self, sql: &str, params: Value) -> Result<i64> {
        self.exec(sql, params)?;
        let id = sql_bridge_last_insert_id().map_err(js_err)?;
        Ok(id as i64)
    }

    /// Run several parameterless statements
    pub fn exec_batch(&self, sql: &str) -> Result<()> {
        sql_bridge_execute_batch(sql).map_err(js_err)?;
        Ok(())
    }

    /// Run a query, returning every row
    pub fn query(&self, sql: &str, params: Value) -> Result<Vec<Row>> {
        let pj = params_json(&params)?;
        let json_str = sql_bridge_query(sql, &pj).map_err(js_err)?;
        serde_json::from_str(&json_str)
            .map_err(|e| Error::Database(format!("Failed to parse query: {}", e)))
    }

    /// First column of the first row, `None` for no rows or NULL
    pub fn query_scalar<T: DeserializeOwned>(&self, sql: &str, params: Value) -> Result<Option<T>> {
        let pj = params_json(&params)?;
        let json_str = sql_bridge_query_value(sql, &pj).map_err(js_err)?;
        if json_str == "null" || json_str.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&json_str)
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
