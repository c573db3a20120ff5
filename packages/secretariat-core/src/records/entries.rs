//! Entries: the work items of a daily note.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::blocks::ENTRY_PARENT;
use super::{flag, int, opt_int, opt_text, timestamp};
use crate::database::{Engine, Journal, Row};
use crate::error::{Error, Result};
use crate::storage::StorageBackend;

/// Title of the AI entry holding a note's summary
pub const DAILY_SUMMARY_TITLE: &str = "Daily Summary";

const SELECT_WITH_CATEGORY: &str = "SELECT e.*, c.name AS category_name, c.color AS category_color
     FROM entries e
     LEFT JOIN categories c ON e.category_id = c.id";

/// A work item, with its category joined in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Row id
    pub id: i64,
    /// Owning daily note
    pub daily_note_id: i64,
    /// Category, `None` when unfiled or after the category was deleted
    pub category_id: Option<i64>,
    /// Optional heading
    pub title: Option<String>,
    /// Produced by the summarizer rather than typed by the user
    pub is_ai_generated: bool,
    /// Entries an AI entry was derived from
    pub source_entry_ids: Option<Vec<i64>>,
    /// When the row was created (UTC)
    pub created_at: NaiveDateTime,
    /// When the row was last touched (UTC)
    pub updated_at: NaiveDateTime,
    /// Joined from `categories`
    pub category_name: Option<String>,
    /// Joined from `categories`
    pub category_color: Option<String>,
}

impl Entry {
    fn from_row(row: &Row) -> Result<Self> {
        let source_entry_ids = match opt_text(row, "source_entry_ids")? {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                Error::Corrupted(format!("bad source_entry_ids '{}': {}", raw, e))
            })?),
            None => None,
        };

        Ok(Self {
            id: int(row, "id")?,
            daily_note_id: int(row, "daily_note_id")?,
            category_id: opt_int(row, "category_id")?,
            title: opt_text(row, "title")?,
            is_ai_generated: flag(row, "is_ai_generated")?,
            source_entry_ids,
            created_at: timestamp(row, "created_at")?,
            updated_at: timestamp(row, "updated_at")?,
            category_name: row
                .get("category_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            category_color: row
                .get("category_color")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

// ============================================================================
// ENGINE-LEVEL HELPERS (no flush)
// ============================================================================

pub(crate) fn list_entries(engine: &Engine, daily_note_id: i64) -> Result<Vec<Entry>> {
    engine
        .query(
            &format!(
                "{} WHERE e.daily_note_id = ? ORDER BY e.created_at ASC, e.id ASC",
                SELECT_WITH_CATEGORY
            ),
            json!([daily_note_id]),
        )?
        .iter()
        .map(Entry::from_row)
        .collect()
}

pub(crate) fn insert_ai_entry(
    engine: &Engine,
    daily_note_id: i64,
    title: &str,
    source_entry_ids: &[i64],
) -> Result<i64> {
    let sources = serde_json::to_string(source_entry_ids)?;
    engine.insert(
        "INSERT INTO entries (daily_note_id, title, is_ai_generated, source_entry_ids) VALUES (?, ?, 1, ?)",
        json!([daily_note_id, title, sources]),
    )
}

/// Children first so an interrupted delete never leaves orphaned blocks.
/// Callers wrap this in a transaction.
pub(crate) fn delete_entry_with_blocks(engine: &Engine, id: i64) -> Result<bool> {
    engine.exec(
        "DELETE FROM blocks WHERE parent_type = ? AND parent_id = ?",
        json!([ENTRY_PARENT, id]),
    )?;
    let removed = engine.exec("DELETE FROM entries WHERE id = ?", json!([id]))?;
    Ok(removed > 0)
}

// ============================================================================
// ACCESSORS
// ============================================================================

impl<S: StorageBackend> Journal<S> {
    /// Create a user entry under a daily note
    pub async fn create_entry(
        &self,
        daily_note_id: i64,
        category_id: Option<i64>,
        title: Option<&str>,
    ) -> Result<i64> {
        let id = self.handle()?.insert(
            "INSERT INTO entries (daily_note_id, category_id, title) VALUES (?, ?, ?)",
            json!([daily_note_id, category_id, title]),
        )?;
        tracing::debug!(id, daily_note_id, "Created entry");
        self.flush().await?;
        Ok(id)
    }

    /// Create an AI-generated entry derived from `source_entry_ids`
    pub async fn create_ai_entry(
        &self,
        daily_note_id: i64,
        title: &str,
        source_entry_ids: &[i64],
    ) -> Result<i64> {
        let id = insert_ai_entry(self.handle()?, daily_note_id, title, source_entry_ids)?;
        self.flush().await?;
        Ok(id)
    }

    /// One entry by id
    pub fn get_entry(&self, id: i64) -> Result<Option<Entry>> {
        let rows = self.handle()?.query(
            &format!("{} WHERE e.id = ?", SELECT_WITH_CATEGORY),
            json!([id]),
        )?;
        rows.first().map(Entry::from_row).transpose()
    }

    /// Entries of a daily note in creation order
    pub fn entries_for_daily_note(&self, daily_note_id: i64) -> Result<Vec<Entry>> {
        list_entries(self.handle()?, daily_note_id)
    }

    /// The AI summary entry of a daily note, if one was generated
    pub fn ai_summary_for_daily_note(&self, daily_note_id: i64) -> Result<Option<Entry>> {
        let rows = self.handle()?.query(
            &format!(
                "{} WHERE e.daily_note_id = ? AND e.is_ai_generated = 1 AND e.title = ?
                 ORDER BY e.id DESC LIMIT 1",
                SELECT_WITH_CATEGORY
            ),
            json!([daily_note_id, DAILY_SUMMARY_TITLE]),
        )?;
        rows.first().map(Entry::from_row).transpose()
    }

    /// File an entry under another category, or none
    pub async fn update_entry_category(&self, id: i64, category_id: Option<i64>) -> Result<()> {
        let changed = self.handle()?.exec(
            "UPDATE entries SET category_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            json!([category_id, id]),
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("entry {}", id)));
        }
        self.flush().await
    }

    /// Set or clear an entry's title
    pub async fn update_entry_title(&self, id: i64, title: Option<&str>) -> Result<()> {
        let changed = self.handle()?.exec(
            "UPDATE entries SET title = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            json!([title, id]),
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("entry {}", id)));
        }
        self.flush().await
    }

    /// Delete an entry and every block under it
    pub async fn delete_entry(&self, id: i64) -> Result<bool> {
        let removed = self
            .handle()?
            .transaction(|tx| delete_entry_with_blocks(tx, id))?;
        if removed {
            tracing::debug!(id, "Deleted entry");
            self.flush().await?;
        } else {
            self.flush_pending().await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Author, BlockContent, ParentRef};
    use crate::storage::MemoryBackend;
    use chrono::NaiveDate;

    async fn journal_with_note() -> (Journal<MemoryBackend>, MemoryBackend, i64) {
        let backend = MemoryBackend::new();
        let journal = Journal::open(backend.clone()).await.unwrap();
        let note = journal
            .get_or_create_daily_note(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap();
        (journal, backend, note.id)
    }

    #[tokio::test]
    async fn test_entries_join_category() {
        let (journal, _, note) = journal_with_note().await;
        let progress = journal.categories().unwrap()[0].clone();

        let a = journal.create_entry(note, Some(progress.id), Some("first")).await.unwrap();
        let b = journal.create_entry(note, None, None).await.unwrap();

        let entries = journal.entries_for_daily_note(note).unwrap();
        assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(entries[0].category_name.as_deref(), Some("Progress"));
        assert_eq!(entries[0].category_color.as_deref(), Some("#22c55e"));
        assert_eq!(entries[1].category_name, None);
        assert!(!entries[0].is_ai_generated);
        assert_eq!(entries[0].source_entry_ids, None);
    }

    #[tokio::test]
    async fn test_update_entry_fields() {
        let (journal, _, note) = journal_with_note().await;
        let id = journal.create_entry(note, None, None).await.unwrap();
        let idea = journal.categories().unwrap()[2].id;

        journal.update_entry_title(id, Some("Renamed")).await.unwrap();
        journal.update_entry_category(id, Some(idea)).await.unwrap();
        let entry = journal.get_entry(id).unwrap().unwrap();
        assert_eq!(entry.title.as_deref(), Some("Renamed"));
        assert_eq!(entry.category_name.as_deref(), Some("Idea"));

        journal.update_entry_title(id, None).await.unwrap();
        assert_eq!(journal.get_entry(id).unwrap().unwrap().title, None);

        assert!(matches!(
            journal.update_entry_title(404, Some("x")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ai_entry_and_summary_lookup() {
        let (journal, _, note) = journal_with_note().await;
        let a = journal.create_entry(note, None, None).await.unwrap();
        assert!(journal.ai_summary_for_daily_note(note).unwrap().is_none());

        let ai = journal
            .create_ai_entry(note, DAILY_SUMMARY_TITLE, &[a])
            .await
            .unwrap();
        let summary = journal.ai_summary_for_daily_note(note).unwrap().unwrap();
        assert_eq!(summary.id, ai);
        assert!(summary.is_ai_generated);
        assert_eq!(summary.source_entry_ids, Some(vec![a]));
    }

    #[tokio::test]
    async fn test_delete_entry_removes_blocks_with_one_flush() {
        let (journal, backend, note) = journal_with_note().await;
        let keep = journal.create_entry(note, None, None).await.unwrap();
        let gone = journal.create_entry(note, None, None).await.unwrap();
        for text in ["a", "b", "c"] {
            journal
                .create_block(ParentRef::entry(gone), BlockContent::text(text), Author::User)
                .await
                .unwrap();
        }
        journal
            .create_block(ParentRef::entry(keep), BlockContent::text("stay"), Author::User)
            .await
            .unwrap();

        let saves = backend.save_count();
        assert!(journal.delete_entry(gone).await.unwrap());
        assert_eq!(backend.save_count(), saves + 1);

        assert!(journal.get_entry(gone).unwrap().is_none());
        assert!(journal.blocks_for_parent(&ParentRef::entry(gone)).unwrap().is_empty());
        let orphans: Option<i64> = journal
            .handle()
            .unwrap()
            .query_scalar(
                "SELECT count(*) FROM blocks b WHERE b.parent_type = 'entry'
                 AND NOT EXISTS (SELECT 1 FROM entries e WHERE e.id = b.parent_id)",
                json!([]),
            )
            .unwrap();
        assert_eq!(orphans, Some(0));
        assert_eq!(journal.blocks_for_parent(&ParentRef::entry(keep)).unwrap().len(), 1);

        // Deleting again changes nothing and does not flush
        assert!(!journal.delete_entry(gone).await.unwrap());
        assert_eq!(backend.save_count(), saves + 1);
    }

    #[tokio::test]
    async fn test_mutations_flush_once() {
        let (journal, backend, note) = journal_with_note().await;
        let before = backend.save_count();
        let id = journal.create_entry(note, None, None).await.unwrap();
        journal.update_entry_title(id, Some("t")).await.unwrap();
        assert_eq!(backend.save_count(), before + 2);

        journal.entries_for_daily_note(note).unwrap();
        journal.get_entry(id).unwrap();
        assert_eq!(backend.save_count(), before + 2);
    }

    #[tokio::test]
    async fn test_delete_retry_after_failed_flush_stays_deleted() {
        let (journal, backend, note) = journal_with_note().await;
        let entry = journal.create_entry(note, None, Some("gone")).await.unwrap();

        backend.set_unavailable(Some("quota"));
        assert!(matches!(
            journal.delete_entry(entry).await,
            Err(Error::StorageUnavailable(_))
        ));

        backend.set_unavailable(None);
        assert!(!journal.delete_entry(entry).await.unwrap());
        assert!(!journal.is_dirty());

        let reloaded = Journal::open(backend).await.unwrap();
        assert!(reloaded.get_entry(entry).unwrap().is_none());
    }
}
