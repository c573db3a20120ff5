//! # Migrations
//!
//! Steps that bring a previously persisted image up to the current layout.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          MIGRATION CHAIN                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  stored schema_version ──► pending(stored) ──► step.run(engine)         │
//! │                                                   │                     │
//! │          ┌────────────────────────────────────────┤                     │
//! │          ▼                                        ▼                     │
//! │   precondition false                       precondition true            │
//! │   (introspection says                      apply, record version,       │
//! │    already migrated)                       flush                        │
//! │   → skipped                                                             │
//! │                                                                         │
//! │  v2  swap_entry_block_tables   blocks ⇄ entries via _entries_swap       │
//! │  v3  add_entry_title           ALTER TABLE entries ADD COLUMN title     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Images written before the version row existed carry no `schema_version`
//! setting, so every step re-checks the live schema (`pragma_table_info`,
//! `sqlite_master`) before touching it. Running the chain twice is a no-op.

use serde_json::json;

use super::engine::Engine;
use super::schema::{SCHEMA_VERSION, SCHEMA_VERSION_KEY};
use crate::error::{Error, Result};

/// Temporary name used while rotating the two tables
pub const SWAP_TABLE: &str = "_entries_swap";

/// One migration
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    /// Name reported in logs and in `MigrationFailed`
    pub name: &'static str,
    /// Schema version reached once this step has been applied
    pub version: i64,
    apply: fn(&Engine) -> Result<bool>,
}

impl MigrationStep {
    /// Apply the step if its precondition holds
    ///
    /// Returns `true` when the schema changed. Every failure is reported as
    /// [`Error::MigrationFailed`] naming this step.
    pub fn run(&self, engine: &Engine) -> Result<bool> {
        (self.apply)(engine).map_err(|e| match e {
            Error::MigrationFailed { .. } => e,
            other => Error::MigrationFailed {
                step: self.name.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

/// Every step, in application order
pub const STEPS: &[MigrationStep] = &[
    MigrationStep {
        name: "swap_entry_block_tables",
        version: 2,
        apply: swap_entry_block_tables,
    },
    MigrationStep {
        name: "add_entry_title",
        version: 3,
        apply: add_entry_title,
    },
];

/// Steps to consider for an image at `stored` version
pub fn pending(stored: Option<i64>) -> impl Iterator<Item = &'static MigrationStep> {
    STEPS
        .iter()
        .filter(move |step| stored.map_or(true, |v| v < step.version))
}

/// Read the recorded schema version, `None` for images that predate it
pub fn stored_version(engine: &Engine) -> Result<Option<i64>> {
    if !table_exists(engine, "settings")? {
        return Ok(None);
    }
    let raw: Option<String> = engine.query_scalar(
        "SELECT value FROM settings WHERE key = ?",
        json!([SCHEMA_VERSION_KEY]),
    )?;
    Ok(raw.and_then(|v| match v.trim().parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(value = %v, "Ignoring unparsable schema version");
            None
        }
    }))
}

/// Record `version` in the settings table
pub fn write_version(engine: &Engine, version: i64) -> Result<()> {
    engine.exec_batch("CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT)")?;
    engine.exec(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
        json!([SCHEMA_VERSION_KEY, version.to_string()]),
    )?;
    Ok(())
}

/// Whether `stored` is newer than anything this build understands
pub fn is_newer_than_supported(stored: Option<i64>) -> bool {
    matches!(stored, Some(v) if v > SCHEMA_VERSION)
}

// ============================================================================
// INTROSPECTION
// ============================================================================

/// Whether a table named `name` exists
pub fn table_exists(engine: &Engine, name: &str) -> Result<bool> {
    let count: Option<i64> = engine.query_scalar(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        json!([name]),
    )?;
    Ok(count.unwrap_or(0) > 0)
}

/// Column names of `table`, empty if it does not exist
pub fn columns(engine: &Engine, table: &str) -> Result<Vec<String>> {
    let rows = engine.query("SELECT name FROM pragma_table_info(?)", json!([table]))?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.get("name").and_then(|v| v.as_str()).map(str::to_string))
        .collect())
}

/// Names of all explicitly created indexes
pub fn index_names(engine: &Engine) -> Result<Vec<String>> {
    let rows = engine.query(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND sql IS NOT NULL ORDER BY name",
        json!([]),
    )?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.get("name").and_then(|v| v.as_str()).map(str::to_string))
        .collect())
}

fn has_column(engine: &Engine, table: &str, column: &str) -> Result<bool> {
    Ok(columns(engine, table)?.iter().any(|c| c == column))
}

// ============================================================================
// STEPS
// ============================================================================

/// Legacy images kept work items in `blocks` (recognised by its
/// `daily_note_id` column) and content fragments in `entries`.
fn swap_entry_block_tables(engine: &Engine) -> Result<bool> {
    if !has_column(engine, "blocks", "daily_note_id")? {
        return Ok(false);
    }

    if !table_exists(engine, "entries")? {
        return Err(Error::MigrationFailed {
            step: "swap_entry_block_tables".to_string(),
            reason: "legacy layout detected but the content table is missing".to_string(),
        });
    }
    if table_exists(engine, SWAP_TABLE)? {
        return Err(Error::MigrationFailed {
            step: "swap_entry_block_tables".to_string(),
            reason: format!("leftover {} table from an interrupted migration", SWAP_TABLE),
        });
    }

    tracing::info!("Legacy entry/block layout detected, swapping tables");

    engine.transaction(|tx| {
        tx.exec_batch(&format!(
            "ALTER TABLE blocks RENAME TO {swap};
             ALTER TABLE entries RENAME TO blocks;
             ALTER TABLE {swap} RENAME TO entries;",
            swap = SWAP_TABLE
        ))?;

        if has_column(tx, "entries", "source_block_ids")? {
            tx.exec_batch("ALTER TABLE entries RENAME COLUMN source_block_ids TO source_entry_ids")?;
        }

        let rewritten = tx.exec(
            "UPDATE blocks SET parent_type = 'entry' WHERE parent_type = 'block'",
            json!([]),
        )?;
        tracing::debug!(rows = rewritten, "Rewrote parent references");

        tx.exec_batch(
            "DROP INDEX IF EXISTS idx_blocks_daily_note;
             DROP INDEX IF EXISTS idx_entries_parent;
             CREATE INDEX IF NOT EXISTS idx_entries_daily_note ON entries(daily_note_id);
             CREATE INDEX IF NOT EXISTS idx_blocks_parent ON blocks(parent_type, parent_id);",
        )?;
        Ok(())
    })?;

    Ok(true)
}

fn add_entry_title(engine: &Engine) -> Result<bool> {
    if !table_exists(engine, "entries")? || has_column(engine, "entries", "title")? {
        return Ok(false);
    }
    engine.exec_batch("ALTER TABLE entries ADD COLUMN title TEXT")?;
    Ok(true)
}

// ============================================================================
// TESTS
// ============================================================================
