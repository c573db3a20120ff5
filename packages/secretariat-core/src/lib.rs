//! # Secretariat Core
//!
//! The embedded local data layer of the Secretariat work journal: a
//! single-user, client-resident relational store for daily notes,
//! categorized entries and their content blocks.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SECRETARIAT CORE MODULES                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────────┐    ┌──────────────────────────────┐   │
//! │  │          Records             │    │         Summarize            │   │
//! │  │                              │    │                              │   │
//! │  │ - Daily notes   - Blocks     │◄───│ - Prompt from user entries   │   │
//! │  │ - Categories    - Settings   │    │ - TextGenerator (Gemini)     │   │
//! │  │ - Entries                    │    │ - AI "Daily Summary" entry   │   │
//! │  └──────────────┬───────────────┘    └──────────────────────────────┘   │
//! │                 │  handle() / flush()                                   │
//! │                 ▼                                                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                         Database                                │   │
//! │  │                                                                 │   │
//! │  │  Journal (lifecycle) ── Engine (SQLite / sql.js, in memory)     │   │
//! │  │        │                 Schema + seed categories               │   │
//! │  │        │                 Migrations (introspection + version)   │   │
//! │  └────────┼────────────────────────────────────────────────────────┘   │
//! │           │  whole-image load / save                                    │
//! │           ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                         Storage                                 │   │
//! │  │   IndexedDB (web)  │  Directory (native)  │  Memory (tests)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`storage`] - Backends that persist the database image
//! - [`database`] - Engine, schema, migrations and the [`Journal`] context
//! - [`records`] - Typed accessors for notes, categories, entries, blocks, settings
//! - [`summarize`] - AI daily summary pipeline
//!
//! ## Usage
//!
//! ```ignore
//! use secretariat_core::{FileBackend, Journal, ParentRef, BlockContent, Author};
//!
//! let journal = Journal::open(FileBackend::new(data_dir)).await?;
//! let note = journal.get_or_create_daily_note(secretariat_core::time::today()).await?;
//! let entry = journal.create_entry(note.id, None, Some("Standup")).await?;
//! journal
//!     .create_block(ParentRef::entry(entry), BlockContent::text("Reviewed PRs"), Author::User)
//!     .await?;
//! ```
//!
//! ## Platform Support
//!
//! | Platform | Engine | Storage | Status |
//! |----------|--------|---------|--------|
//! | Web | sql.js (bridge) | IndexedDB | Supported |
//! | Desktop / CLI | SQLite (rusqlite) | Directory | Supported |
//! | Tests | SQLite (rusqlite) | Memory | Supported |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod database;
pub mod error;
pub mod records;
pub mod storage;
pub mod summarize;
/// Platform-aware date and timestamp helpers for native and WASM targets.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use database::{Engine, Journal, Lifecycle};
pub use error::{Error, Result};
pub use records::{Author, Block, BlockContent, Category, DailyNote, Entry, ParentRef};
pub use storage::{MemoryBackend, StorageBackend, StoreConfig};
pub use summarize::{GeminiClient, GeminiConfig, TextGenerator};

#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileBackend;
#[cfg(target_arch = "wasm32")]
pub use storage::IndexedDbBackend;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Secretariat Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        schema_version: database::schema::SCHEMA_VERSION,
        #[cfg(target_arch = "wasm32")]
        target: "wasm32",
        #[cfg(not(target_arch = "wasm32"))]
        target: "native",
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information for debugging
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Schema version this build creates and migrates to
    pub schema_version: i64,
    /// `native` or `wasm32`
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.version, version());
        assert_eq!(info.schema_version, 3);
    }
}
