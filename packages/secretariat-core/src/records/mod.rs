//! # Records
//!
//! Typed access to the journal's rows.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           RECORD ACCESSORS                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  DailyNote ──1:n──► Entry ──1:n──► Block (parent_type = "entry")        │
//! │                       │                                                 │
//! │                       └──n:1──► Category (nullable)                     │
//! │                                                                         │
//! │  Setting: flat key → value                                              │
//! │                                                                         │
//! │  Mutations:  handle() → statements → flush()   (one flush per call)     │
//! │  Reads:      handle() → query                  (never flush)            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A mutation that turns out to change nothing (an existing daily note, a
//! refused default-category delete, deleting a missing row) does not flush.

mod blocks;
mod categories;
mod daily_notes;
mod entries;
mod settings;

pub use blocks::{Author, Block, BlockContent, ParentRef, ENTRY_PARENT};
pub use categories::Category;
pub use daily_notes::DailyNote;
pub use entries::{Entry, DAILY_SUMMARY_TITLE};
pub use settings::GEMINI_API_KEY;

pub(crate) use blocks::insert_block;
pub(crate) use entries::{delete_entry_with_blocks, insert_ai_entry, list_entries};
pub(crate) use settings::read_setting;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::database::Row;
use crate::error::{Error, Result};
use crate::time;

// ============================================================================
// ROW DECODING
// ============================================================================

fn column<'a>(row: &'a Row, col: &str) -> Result<&'a Value> {
    row.get(col)
        .ok_or_else(|| Error::Corrupted(format!("missing column '{}'", col)))
}

pub(crate) fn int(row: &Row, col: &str) -> Result<i64> {
    opt_int(row, col)?.ok_or_else(|| Error::Corrupted(format!("column '{}' is null", col)))
}

pub(crate) fn opt_int(row: &Row, col: &str) -> Result<Option<i64>> {
    match column(row, col)? {
        Value::Null => Ok(None),
        // sql.js hands every number over as a double
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| Error::Corrupted(format!("column '{}' is not an integer", col))),
        other => Err(Error::Corrupted(format!(
            "column '{}' is not an integer: {}",
            col, other
        ))),
    }
}

pub(crate) fn text(row: &Row, col: &str) -> Result<String> {
    opt_text(row, col)?.ok_or_else(|| Error::Corrupted(format!("column '{}' is null", col)))
}

pub(crate) fn opt_text(row: &Row, col: &str) -> Result<Option<String>> {
    match column(row, col)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Ok(Some(other.to_string())),
    }
}

/// SQLite has no boolean; anything non-zero is true and NULL is false.
pub(crate) fn flag(row: &Row, col: &str) -> Result<bool> {
    Ok(opt_int(row, col)?.unwrap_or(0) != 0)
}

pub(crate) fn timestamp(row: &Row, col: &str) -> Result<NaiveDateTime> {
    time::parse_timestamp(&text(row, col)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_decode_columns() {
        let r = row(json!({
            "id": 4,
            "pos": 2.0,
            "name": "Idea",
            "icon": null,
            "is_default": 1,
            "created_at": "2024-01-01 08:30:00"
        }));
        assert_eq!(int(&r, "id").unwrap(), 4);
        assert_eq!(int(&r, "pos").unwrap(), 2);
        assert_eq!(text(&r, "name").unwrap(), "Idea");
        assert_eq!(opt_text(&r, "icon").unwrap(), None);
        assert!(flag(&r, "is_default").unwrap());
        assert!(!flag(&r, "icon").unwrap());
        assert!(timestamp(&r, "created_at").is_ok());
    }

    #[tokio::test]
    async fn test_reload_reads_back_identical_records() {
        use crate::database::Journal;
        use crate::storage::MemoryBackend;
        use chrono::NaiveDate;

        let backend = MemoryBackend::new();
        let journal = Journal::open(backend.clone()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let note = journal.get_or_create_daily_note(date).await.unwrap();
        let cat = journal.create_category("Ops", "#f97316", Some("wrench")).await.unwrap();
        let entry = journal.create_entry(note.id, Some(cat), Some("Deploy")).await.unwrap();
        let ai = journal.create_ai_entry(note.id, DAILY_SUMMARY_TITLE, &[entry]).await.unwrap();
        journal
            .create_block(ParentRef::entry(entry), BlockContent::text("rolled out"), Author::User)
            .await
            .unwrap();
        journal
            .create_block(
                ParentRef::entry(ai),
                BlockContent::CategoryHeading { name: "Ops".into(), color: "#f97316".into() },
                Author::Ai,
            )
            .await
            .unwrap();
        journal.set_setting("theme", "dark").await.unwrap();

        let snapshot = |j: &Journal<MemoryBackend>| {
            let entries = j.entries_for_daily_note(note.id).unwrap();
            let blocks: Vec<Block> = entries
                .iter()
                .flat_map(|e| j.blocks_for_parent(&ParentRef::entry(e.id)).unwrap())
                .collect();
            (
                j.get_daily_note(date).unwrap(),
                j.categories().unwrap(),
                entries,
                blocks,
                j.get_setting("theme").unwrap(),
            )
        };
        let before = snapshot(&journal);
        drop(journal);

        let reloaded = Journal::open(backend).await.unwrap();
        assert_eq!(snapshot(&reloaded), before);
    }

    #[test]
    fn test_decode_errors_are_corruption() {
        let r = row(json!({"id": null, "name": "x"}));
        assert!(matches!(int(&r, "id"), Err(Error::Corrupted(_))));
        assert!(matches!(int(&r, "name"), Err(Error::Corrupted(_))));
        assert!(matches!(text(&r, "absent"), Err(Error::Corrupted(_))));
    }
}
