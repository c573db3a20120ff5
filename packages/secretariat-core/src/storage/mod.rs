//! # Storage Backends
//!
//! Durable key/value persistence of the database image.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE BACKENDS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Journal::flush()                                                       │
//! │        │  engine.export()  →  one opaque byte blob (the image)          │
//! │        ▼                                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  StorageBackend Trait                                           │   │
//! │  │                                                                 │   │
//! │  │  • open_store()        - Open / create the named store          │   │
//! │  │  • load(handle)        - Read the image, None if never saved    │   │
//! │  │  • save(handle, image) - Overwrite the image                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐               │
//! │  │    Web        │  │   Native      │  │   Memory      │               │
//! │  │  IndexedDB    │  │  Directory    │  │  HashMap      │               │
//! │  │               │  │               │  │               │               │
//! │  │ db: store     │  │ <dir>/<store>/│  │ tests and     │               │
//! │  │ os: database  │  │   <key>.db    │  │ ephemeral     │               │
//! │  │ key: sqlite   │  │ temp + rename │  │ sessions      │               │
//! │  └───────────────┘  └───────────────┘  └───────────────┘               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Saves are never incremental: each one replaces the whole image under the
//! configured key. Every platform failure surfaces as
//! [`Error::StorageUnavailable`](crate::Error::StorageUnavailable).

use async_trait::async_trait;

use crate::error::Result;

mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod file;

/// IndexedDB backend for the browser build (WASM-only)
#[cfg(target_arch = "wasm32")]
pub mod indexeddb;

pub use memory::MemoryBackend;
#[cfg(not(target_arch = "wasm32"))]
pub use file::FileBackend;
#[cfg(target_arch = "wasm32")]
pub use indexeddb::IndexedDbBackend;

/// Default name of the store holding the image
pub const DEFAULT_STORE_NAME: &str = "secretariat";

/// Default key the image is saved under
pub const DEFAULT_IMAGE_KEY: &str = "sqlite";

/// Identity of the persisted image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name of the store (IndexedDB database, directory, map namespace)
    pub store_name: String,
    /// Key the image lives under inside the store
    pub image_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            image_key: DEFAULT_IMAGE_KEY.to_string(),
        }
    }
}

/// Persists and retrieves the database image.
///
/// All three operations must be awaited before the caller proceeds.
/// `open_store` may be called any number of times; it reuses or recreates
/// the same named store.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait StorageBackend: MaybeSendSync {
    /// Opened store, valid for subsequent `load` / `save` calls
    type Handle: MaybeSendSync;

    /// Open the store, creating its container on first use
    async fn open_store(&self) -> Result<Self::Handle>;

    /// Read the saved image, `None` if nothing was saved yet
    async fn load(&self, handle: &Self::Handle) -> Result<Option<Vec<u8>>>;

    /// Replace the saved image
    async fn save(&self, handle: &Self::Handle, image: &[u8]) -> Result<()>;
}

/// `Send + Sync` on native targets, nothing on single-threaded WASM.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> MaybeSendSync for T {}

/// `Send + Sync` on native targets, nothing on single-threaded WASM.
#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSendSync for T {}
