//! # IndexedDB Storage Adapter (WASM-only)
//!
//! Persists the database image in the browser's IndexedDB through a small
//! JavaScript bridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                      INDEXEDDB STORAGE ADAPTER                          │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │                                                                        │
//! │  Rust (WASM)                  JavaScript Bridge                        │
//! │  ────────────                 ─────────────────                         │
//! │                                                                        │
//! │  open_store() ─────────────►  __secretariat_idb.open(db, store)        │
//! │  load()       ─────────────►  __secretariat_idb.get(db, store, key)    │
//! │                                    → b64 | null                        │
//! │  save()       ─────────────►  __secretariat_idb.put(db, store, key, b64)│
//! │                                                                        │
//! │  IndexedDB layout:                                                     │
//! │    secretariat (database, version 1)                                   │
//! │      └── database (object store, created in onupgradeneeded)           │
//! │            └── "sqlite" → exported image                               │
//! │                                                                        │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `globalThis.__secretariat_idb` must be installed before the journal is
//! initialized. Every method returns a promise; a rejected promise (storage
//! disabled, quota exceeded, private mode) becomes `StorageUnavailable`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::{StorageBackend, StoreConfig};
use crate::error::{Error, Result};

/// Object store inside the IndexedDB database that holds images.
pub const OBJECT_STORE: &str = "database";

// ============================================================================
// JAVASCRIPT BRIDGE: extern functions provided by idb-bridge.ts
// ============================================================================

#[wasm_bindgen]
extern "C" {
    /// Open (and on first use create) the database and its object store.
    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_idb"], js_name = "open", catch)]
    fn idb_bridge_open(db_name: &str, store: &str) -> std::result::Result<js_sys::Promise, JsValue>;

    /// Resolve to the base64 image stored under `key`, or null.
    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_idb"], js_name = "get", catch)]
    fn idb_bridge_get(db_name: &str, store: &str, key: &str) -> std::result::Result<js_sys::Promise, JsValue>;

    /// Replace the value stored under `key` in a readwrite transaction.
    #[wasm_bindgen(js_namespace = ["globalThis", "__secretariat_idb"], js_name = "put", catch)]
    fn idb_bridge_put(
        db_name: &str,
        store: &str,
        key: &str,
        data_b64: &str,
    ) -> std::result::Result<js_sys::Promise, JsValue>;
}

fn idb_err(e: JsValue) -> Error {
    let msg = e.as_string().unwrap_or_else(|| format!("{:?}", e));
    Error::StorageUnavailable(format!("IndexedDB error: {}", msg))
}

/// Check if the IndexedDB bridge is installed.
pub fn is_indexeddb_available() -> bool {
    let global = js_sys::global();
    let bridge = js_sys::Reflect::get(&global, &JsValue::from_str("__secretariat_idb"));
    matches!(bridge, Ok(val) if !val.is_undefined() && !val.is_null())
}

/// Browser [`StorageBackend`]
#[derive(Debug, Clone, Default)]
pub struct IndexedDbBackend {
    config: StoreConfig,
}

/// Handle returned by [`IndexedDbBackend::open_store`]
#[derive(Debug, Clone)]
pub struct IndexedDbHandle {
    db_name: String,
    key: String,
}

impl IndexedDbBackend {
    /// Backend for the default database name and key
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend for an explicit database name and key
    pub fn with_config(config: StoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait(?Send)]
impl StorageBackend for IndexedDbBackend {
    type Handle = IndexedDbHandle;

    async fn open_store(&self) -> Result<IndexedDbHandle> {
        if !is_indexeddb_available() {
            return Err(Error::StorageUnavailable(
                "IndexedDB bridge not installed".to_string(),
            ));
        }
        let promise = idb_bridge_open(&self.config.store_name, OBJECT_STORE).map_err(idb_err)?;
        JsFuture::from(promise).await.map_err(idb_err)?;
        Ok(IndexedDbHandle {
            db_name: self.config.store_name.clone(),
            key: self.config.image_key.clone(),
        })
    }

    async fn load(&self, handle: &IndexedDbHandle) -> Result<Option<Vec<u8>>> {
        let promise =
            idb_bridge_get(&handle.db_name, OBJECT_STORE, &handle.key).map_err(idb_err)?;
        let result = JsFuture::from(promise).await.map_err(idb_err)?;

        if result.is_null() || result.is_undefined() {
            return Ok(None);
        }

        let b64 = result.as_string().ok_or_else(|| {
            Error::Corrupted("IndexedDB get returned non-string value".to_string())
        })?;
        let bytes = STANDARD
            .decode(&b64)
            .map_err(|e| Error::Corrupted(format!("IndexedDB base64 decode error: {}", e)))?;
        Ok(Some(bytes))
    }

    async fn save(&self, handle: &IndexedDbHandle, image: &[u8]) -> Result<()> {
        let b64 = STANDARD.encode(image);
        let promise =
            idb_bridge_put(&handle.db_name, OBJECT_STORE, &handle.key, &b64).map_err(idb_err)?;
        JsFuture::from(promise).await.map_err(idb_err)?;
        Ok(())
    }
}
