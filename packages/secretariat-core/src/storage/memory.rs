//! In-process image store.
//!
//! Holds images in a map keyed by `(store, key)`. Used by tests and by
//! sessions that do not need to outlive the process. Clones share the same
//! map, so a "restart" can be simulated by building a second journal over a
//! clone of the backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{StorageBackend, StoreConfig};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Shared {
    images: RwLock<HashMap<(String, String), Vec<u8>>>,
    saves: AtomicUsize,
    unavailable: RwLock<Option<String>>,
}

/// Memory-backed [`StorageBackend`]
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    config: StoreConfig,
    shared: Arc<Shared>,
}

/// Handle returned by [`MemoryBackend::open_store`]
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    slot: (String, String),
}

impl MemoryBackend {
    /// Create an empty store with the default name and key
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with an explicit name and key
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            shared: Arc::default(),
        }
    }

    /// Number of successful saves since creation
    pub fn save_count(&self) -> usize {
        self.shared.saves.load(Ordering::SeqCst)
    }

    /// The currently stored image, if any
    pub fn image(&self) -> Option<Vec<u8>> {
        self.shared
            .images
            .read()
            .get(&self.slot())
            .cloned()
    }

    /// Put an image in place as if a previous session had saved it
    pub fn preload(&self, image: Vec<u8>) {
        self.shared.images.write().insert(self.slot(), image);
    }

    /// Make every following operation fail, the way a browser does when
    /// storage is disabled or over quota. `None` restores the store.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.shared.unavailable.write() = reason.map(str::to_string);
    }

    fn slot(&self) -> (String, String) {
        (self.config.store_name.clone(), self.config.image_key.clone())
    }

    fn check_available(&self) -> Result<()> {
        match self.shared.unavailable.read().as_ref() {
            Some(reason) => Err(Error::StorageUnavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl StorageBackend for MemoryBackend {
    type Handle = MemoryHandle;

    async fn open_store(&self) -> Result<MemoryHandle> {
        self.check_available()?;
        Ok(MemoryHandle { slot: self.slot() })
    }

    async fn load(&self, handle: &MemoryHandle) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        Ok(self.shared.images.read().get(&handle.slot).cloned())
    }

    async fn save(&self, handle: &MemoryHandle, image: &[u8]) -> Result<()> {
        self.check_available()?;
        self.shared
            .images
            .write()
            .insert(handle.slot.clone(), image.to_vec());
        self.shared.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
