//! Categories: the five seeded defaults plus user-created ones.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{flag, int, opt_text, text};
use crate::database::{Journal, Row};
use crate::error::{Error, Result};
use crate::storage::StorageBackend;

/// A category entries can be filed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Display colour, e.g. `#22c55e`
    pub color: String,
    /// Optional icon name
    pub icon: Option<String>,
    /// Seeded categories cannot be deleted
    pub is_default: bool,
    /// Rank in listings
    pub position: i64,
}

impl Category {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: int(row, "id")?,
            name: text(row, "name")?,
            color: text(row, "color")?,
            icon: opt_text(row, "icon")?,
            is_default: flag(row, "is_default")?,
            position: int(row, "position")?,
        })
    }
}

impl<S: StorageBackend> Journal<S> {
    /// All categories by position
    pub fn categories(&self) -> Result<Vec<Category>> {
        self.handle()?
            .query("SELECT * FROM categories ORDER BY position ASC, id ASC", json!([]))?
            .iter()
            .map(Category::from_row)
            .collect()
    }

    /// One category by id
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let rows = self
            .handle()?
            .query("SELECT * FROM categories WHERE id = ?", json!([id]))?;
        rows.first().map(Category::from_row).transpose()
    }

    /// Create a user category at the end of the list
    pub async fn create_category(
        &self,
        name: &str,
        color: &str,
        icon: Option<&str>,
    ) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("category name is empty".to_string()));
        }

        let engine = self.handle()?;
        let max: Option<i64> =
            engine.query_scalar("SELECT MAX(position) FROM categories", json!([]))?;
        let id = engine.insert(
            "INSERT INTO categories (name, color, icon, is_default, position) VALUES (?, ?, ?, 0, ?)",
            json!([name, color, icon, max.map_or(0, |m| m + 1)]),
        )?;

        tracing::debug!(id, name, "Created category");
        self.flush().await?;
        Ok(id)
    }

    /// Rename or recolour a category
    pub async fn update_category(
        &self,
        id: i64,
        name: &str,
        color: &str,
        icon: Option<&str>,
    ) -> Result<()> {
        let changed = self.handle()?.exec(
            "UPDATE categories SET name = ?, color = ?, icon = ? WHERE id = ?",
            json!([name, color, icon, id]),
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("category {}", id)));
        }
        self.flush().await
    }

    /// Delete a user category, un-filing its entries
    ///
    /// Returns `false` without touching anything when the category is a
    /// default one or does not exist.
    pub async fn delete_category(&self, id: i64) -> Result<bool> {
        let Some(category) = self.get_category(id)? else {
            self.flush_pending().await?;
            return Ok(false);
        };
        if category.is_default {
            tracing::debug!(id, name = %category.name, "Refusing to delete default category");
            self.flush_pending().await?;
            return Ok(false);
        }

        self.handle()?.transaction(|tx| {
            tx.exec(
                "UPDATE entries SET category_id = NULL WHERE category_id = ?",
                json!([id]),
            )?;
            tx.exec("DELETE FROM categories WHERE id = ? AND is_default = 0", json!([id]))
        })?;

        self.flush().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::database::Journal;
    use crate::error::Error;
    use crate::storage::MemoryBackend;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_create_category_appends() {
        let journal = Journal::open(MemoryBackend::new()).await.unwrap();
        let id = journal
            .create_category("Learning", "#0ea5e9", Some("book"))
            .await
            .unwrap();

        let cat = journal.get_category(id).unwrap().unwrap();
        assert_eq!(cat.position, 5);
        assert!(!cat.is_default);
        assert_eq!(cat.icon.as_deref(), Some("book"));
        assert_eq!(journal.categories().unwrap().last().unwrap().id, id);
    }

    #[tokio::test]
    async fn test_update_category() {
        let journal = Journal::open(MemoryBackend::new()).await.unwrap();
        let id = journal.create_category("Misc", "#000000", None).await.unwrap();
        journal
            .update_category(id, "Other", "#111111", None)
            .await
            .unwrap();
        let cat = journal.get_category(id).unwrap().unwrap();
        assert_eq!(cat.name, "Other");
        assert_eq!(cat.color, "#111111");

        assert!(matches!(
            journal.update_category(999, "x", "y", None).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_category_nulls_entries() {
        let journal = Journal::open(MemoryBackend::new()).await.unwrap();
        let note = journal
            .get_or_create_daily_note(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap();
        let cat = journal.create_category("Temp", "#123456", None).await.unwrap();
        let entry = journal
            .create_entry(note.id, Some(cat), Some("filed"))
            .await
            .unwrap();

        assert!(journal.delete_category(cat).await.unwrap());
        assert!(journal.get_category(cat).unwrap().is_none());

        let entry = journal.get_entry(entry).unwrap().unwrap();
        assert_eq!(entry.category_id, None);
        assert_eq!(entry.title.as_deref(), Some("filed"));
    }

    #[tokio::test]
    async fn test_default_category_is_not_deletable() {
        let backend = MemoryBackend::new();
        let journal = Journal::open(backend.clone()).await.unwrap();
        let before = journal.categories().unwrap();
        let saves = backend.save_count();

        let progress = before.iter().find(|c| c.name == "Progress").unwrap();
        assert!(!journal.delete_category(progress.id).await.unwrap());

        assert_eq!(journal.categories().unwrap(), before);
        assert_eq!(backend.save_count(), saves);
    }

    #[tokio::test]
    async fn test_refused_delete_saves_pending_change() {
        let backend = MemoryBackend::new();
        let journal = Journal::open(backend.clone()).await.unwrap();
        let default_id = journal.categories().unwrap()[0].id;

        backend.set_unavailable(Some("quota"));
        assert!(journal.create_category("Ops", "#000000", None).await.is_err());
        backend.set_unavailable(None);

        assert!(!journal.delete_category(default_id).await.unwrap());
        assert!(!journal.is_dirty());

        let reloaded = Journal::open(backend).await.unwrap();
        assert!(reloaded.categories().unwrap().iter().any(|c| c.name == "Ops"));
    }
}
