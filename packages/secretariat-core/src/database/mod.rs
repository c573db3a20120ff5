//! # Database
//!
//! The journal database: embedded engine, schema, migrations, and the
//! [`Journal`] context that owns them.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        JOURNAL LIFECYCLE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Uninitialized ──initialize()──► Initializing ──────────► Ready         │
//! │        ▲                              │                (terminal)       │
//! │        └──────── error ───────────────┘                                 │
//! │                                                                         │
//! │  Initializing:                                                          │
//! │     open_store() → load()                                               │
//! │        │                                                                │
//! │        ├── Some(image) ─► Engine::from_image ─► migration chain         │
//! │        │                                        (flush per step)        │
//! │        │                                                                │
//! │        └── None ────────► Engine::open_empty ─► DDL + seed categories   │
//! │                                                 + schema_version        │
//! │                                                 → flush                 │
//! │                                                                         │
//! │  Ready:                                                                 │
//! │     handle()  → &Engine                                                 │
//! │     flush()   → export() → save()   (after every mutation)              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#[cfg(not(target_arch = "wasm32"))]
mod engine;

#[cfg(target_arch = "wasm32")]
#[path = "wasm_engine.rs"]
mod engine;

pub mod migrations;
pub mod schema;

pub use engine::{Engine, Row};

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::json;

use crate::error::{Error, Result};
use crate::storage::StorageBackend;

/// Where a [`Journal`] is in its startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, `initialize` not yet called (or the last attempt failed)
    Uninitialized,
    /// `initialize` is running
    Initializing,
    /// Engine loaded and migrated; terminal
    Ready,
}

/// The journal context
///
/// Owns the storage backend and, once ready, the live engine. Record
/// accessors are methods on this type; every mutating one flushes the full
/// image to the backend before returning.
pub struct Journal<S: StorageBackend> {
    backend: S,
    state: Mutex<Lifecycle>,
    engine: OnceCell<Engine>,
    /// Set while the engine holds changes the last save did not capture
    dirty: AtomicBool,
}

impl<S: StorageBackend> Journal<S> {
    /// Create an uninitialized journal over `backend`
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            state: Mutex::new(Lifecycle::Uninitialized),
            engine: OnceCell::new(),
            dirty: AtomicBool::new(false),
        }
    }

    /// Create and initialize a journal
    pub async fn open(backend: S) -> Result<Self> {
        let journal = Self::new(backend);
        journal.initialize().await?;
        Ok(journal)
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        *self.state.lock()
    }

    /// The storage backend
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Load or create the database and bring it to the current schema
    ///
    /// May be called once. A second call fails with `AlreadyInitialized`, a
    /// concurrent one with `InitializationInProgress`. If loading, migrating
    /// or creating fails the journal returns to `Uninitialized` and the last
    /// flushed image is left untouched in storage.
    pub async fn initialize(&self) -> Result<&Engine> {
        {
            let mut state = self.state.lock();
            match *state {
                Lifecycle::Ready => return Err(Error::AlreadyInitialized),
                Lifecycle::Initializing => return Err(Error::InitializationInProgress),
                Lifecycle::Uninitialized => *state = Lifecycle::Initializing,
            }
        }

        match self.bootstrap().await {
            Ok(engine) => {
                if self.engine.set(engine).is_err() {
                    *self.state.lock() = Lifecycle::Uninitialized;
                    return Err(Error::Internal("Engine already set".to_string()));
                }
                *self.state.lock() = Lifecycle::Ready;
                tracing::info!("Journal ready");
                self.handle()
            }
            Err(e) => {
                *self.state.lock() = Lifecycle::Uninitialized;
                tracing::error!(error = %e, "Journal initialization failed");
                Err(e)
            }
        }
    }

    /// The live engine, `NotInitialized` unless ready
    pub fn handle(&self) -> Result<&Engine> {
        if self.lifecycle() != Lifecycle::Ready {
            return Err(Error::NotInitialized);
        }
        self.engine.get().ok_or(Error::NotInitialized)
    }

    /// Export the full image and save it
    ///
    /// The journal stays dirty until a save succeeds, so a mutation whose
    /// flush failed is saved by the next accessor call that reaches
    /// [`Journal::flush_pending`].
    pub async fn flush(&self) -> Result<()> {
        let engine = self.handle()?;
        self.dirty.store(true, Ordering::SeqCst);
        let handle = self.backend.open_store().await?;
        self.persist(&handle, engine).await?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether in-memory changes are waiting for a successful save
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Flush only if an earlier flush failed
    ///
    /// Accessors that change nothing call this instead of returning early, so
    /// a retried mutation never reports success over an unsaved image.
    pub async fn flush_pending(&self) -> Result<()> {
        if self.is_dirty() {
            tracing::debug!("Retrying pending flush");
            self.flush().await?;
        }
        Ok(())
    }

    async fn persist(&self, handle: &S::Handle, engine: &Engine) -> Result<()> {
        let image = engine.export()?;
        self.backend.save(handle, &image).await?;
        tracing::debug!(bytes = image.len(), "Flushed image");
        Ok(())
    }

    async fn bootstrap(&self) -> Result<Engine> {
        let handle = self.backend.open_store().await?;

        match self.backend.load(&handle).await? {
            Some(image) => {
                tracing::info!(bytes = image.len(), "Loading persisted image");
                let engine = Engine::from_image(&image)?;
                self.migrate(&handle, &engine).await?;
                Ok(engine)
            }
            None => {
                tracing::info!("No persisted image, creating database");
                let engine = Engine::open_empty()?;
                create_fresh(&engine)?;
                self.persist(&handle, &engine).await?;
                tracing::info!(
                    version = schema::SCHEMA_VERSION,
                    "Database schema created"
                );
                Ok(engine)
            }
        }
    }

    async fn migrate(&self, handle: &S::Handle, engine: &Engine) -> Result<()> {
        let stored = migrations::stored_version(engine)?;

        if migrations::is_newer_than_supported(stored) {
            tracing::warn!(
                stored = ?stored,
                supported = schema::SCHEMA_VERSION,
                "Image schema is newer than this build, skipping migrations"
            );
            return Ok(());
        }

        let mut recorded = stored;
        for step in migrations::pending(stored) {
            if !step.run(engine)? {
                tracing::debug!(step = step.name, "Migration not needed");
                continue;
            }
            migrations::write_version(engine, step.version).map_err(|e| {
                Error::MigrationFailed {
                    step: step.name.to_string(),
                    reason: e.to_string(),
                }
            })?;
            recorded = Some(step.version);
            tracing::info!(step = step.name, version = step.version, "Migration applied");
            self.persist(handle, engine).await?;
        }

        if recorded != Some(schema::SCHEMA_VERSION) {
            migrations::write_version(engine, schema::SCHEMA_VERSION).map_err(|e| {
                Error::MigrationFailed {
                    step: "record_schema_version".to_string(),
                    reason: e.to_string(),
                }
            })?;
            self.persist(handle, engine).await?;
            tracing::debug!(version = schema::SCHEMA_VERSION, "Recorded schema version");
        }
        Ok(())
    }
}

fn create_fresh(engine: &Engine) -> Result<()> {
    engine.transaction(|tx| {
        tx.exec_batch(schema::CREATE_TABLES)?;
        for seed in schema::DEFAULT_CATEGORIES {
            tx.exec(
                schema::INSERT_DEFAULT_CATEGORY,
                json!([seed.name, seed.color, seed.position]),
            )?;
        }
        migrations::write_version(tx, schema::SCHEMA_VERSION)
    })
}

// ============================================================================
// TESTS
// ============================================================================
