//! # Database Schema
//!
//! SQL schema definitions for the journal database.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐    ┌──────────────────┐     ┌─────────────────┐    │
//! │  │   daily_notes   │    │     entries      │     │     blocks      │    │
//! │  ├─────────────────┤    ├──────────────────┤     ├─────────────────┤    │
//! │  │ id              │◄───│ daily_note_id    │     │ id              │    │
//! │  │ date (unique)   │    │ id               │◄────│ parent_id       │    │
//! │  │ created_at      │    │ category_id      │──┐  │ parent_type     │    │
//! │  │ updated_at      │    │ title            │  │  │ type            │    │
//! │  └─────────────────┘    │ is_ai_generated  │  │  │ content         │    │
//! │                         │ source_entry_ids │  │  │ position        │    │
//! │  ┌─────────────────┐    │ created_at       │  │  │ author          │    │
//! │  │   categories    │    │ updated_at       │  │  │ created_at      │    │
//! │  ├─────────────────┤    └──────────────────┘  │  │ updated_at      │    │
//! │  │ id              │◄─────────────────────────┘  └─────────────────┘    │
//! │  │ name            │                                                    │
//! │  │ color           │    ┌─────────────────┐                             │
//! │  │ icon            │    │    settings     │                             │
//! │  │ is_default      │    ├─────────────────┤                             │
//! │  │ position        │    │ key             │                             │
//! │  └─────────────────┘    │ value           │                             │
//! │                         └─────────────────┘                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

/// Current schema version
///
/// 1: legacy layout (work items in `blocks`, content in `entries`),
/// 2: table identity swap applied, 3: `entries.title` present.
pub const SCHEMA_VERSION: i64 = 3;

/// Settings key recording the schema version
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- One row per calendar date, created lazily
CREATE TABLE IF NOT EXISTS daily_notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    -- YYYY-MM-DD
    date TEXT UNIQUE NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    -- Display colour, e.g. #22c55e
    color TEXT NOT NULL,
    icon TEXT,
    is_default INTEGER DEFAULT 0,
    position INTEGER DEFAULT 0
);

-- Top-level work items of a daily note
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    daily_note_id INTEGER NOT NULL,
    category_id INTEGER,
    title TEXT,
    is_ai_generated INTEGER DEFAULT 0,
    -- JSON array of entry ids an AI entry was derived from
    source_entry_ids TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (daily_note_id) REFERENCES daily_notes(id),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

-- Ordered content fragments owned by (parent_type, parent_id)
CREATE TABLE IF NOT EXISTS blocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_type TEXT NOT NULL,
    parent_id INTEGER NOT NULL,
    type TEXT NOT NULL DEFAULT 'text',
    -- JSON payload, shape depends on type
    content TEXT NOT NULL,
    position INTEGER DEFAULT 0,
    author TEXT DEFAULT 'user',
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT
);

CREATE INDEX IF NOT EXISTS idx_entries_daily_note ON entries(daily_note_id);
CREATE INDEX IF NOT EXISTS idx_blocks_parent ON blocks(parent_type, parent_id);
CREATE INDEX IF NOT EXISTS idx_daily_notes_date ON daily_notes(date);
"#;

/// A category seeded on first creation
#[derive(Debug, Clone, Copy)]
pub struct SeedCategory {
    /// Display name
    pub name: &'static str,
    /// Display colour
    pub color: &'static str,
    /// Rank in listings
    pub position: i64,
}

/// Default categories, all with `is_default = 1` and no icon
pub const DEFAULT_CATEGORIES: &[SeedCategory] = &[
    SeedCategory { name: "Progress", color: "#22c55e", position: 0 },
    SeedCategory { name: "Blocker", color: "#ef4444", position: 1 },
    SeedCategory { name: "Idea", color: "#eab308", position: 2 },
    SeedCategory { name: "Question", color: "#3b82f6", position: 3 },
    SeedCategory { name: "Meeting Note", color: "#8b5cf6", position: 4 },
];

/// Insert statement for [`DEFAULT_CATEGORIES`]
pub const INSERT_DEFAULT_CATEGORY: &str =
    "INSERT INTO categories (name, color, icon, is_default, position) VALUES (?, ?, NULL, 1, ?)";
