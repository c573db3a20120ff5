//! Blocks: ordered content fragments under a parent (normally an entry).
//!
//! The `content` column holds JSON whose shape depends on `type`. Known
//! types decode into [`BlockContent`] variants; anything else is kept as raw
//! bytes and written back unchanged.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{int, text, timestamp};
use crate::database::{Engine, Journal, Row};
use crate::error::{Error, Result};
use crate::storage::StorageBackend;

/// `parent_type` of blocks owned by an entry
pub const ENTRY_PARENT: &str = "entry";

const TEXT_KIND: &str = "text";
const CATEGORY_HEADING_KIND: &str = "category-heading";

/// What a block belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    /// Kind of owner, `"entry"` for entries
    pub parent_type: String,
    /// Row id of the owner
    pub parent_id: i64,
}

impl ParentRef {
    /// A block list owned by entry `id`
    pub fn entry(id: i64) -> Self {
        Self {
            parent_type: ENTRY_PARENT.to_string(),
            parent_id: id,
        }
    }
}

/// Who wrote a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// Typed by the user
    User,
    /// Produced by the summarizer
    Ai,
}

impl Author {
    /// Stored form
    pub fn as_str(&self) -> &'static str {
        match self {
            Author::User => "user",
            Author::Ai => "ai",
        }
    }

    fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("ai") => Author::Ai,
            _ => Author::User,
        }
    }
}

/// Decoded block payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BlockContent {
    /// Plain text (`type = "text"`)
    Text {
        /// The text
        text: String,
    },
    /// Category header inside an AI summary (`type = "category-heading"`)
    CategoryHeading {
        /// Category name
        name: String,
        /// Category colour
        color: String,
    },
    /// A type this build does not know, or a payload that did not decode
    Other {
        /// Stored `type` value
        kind: String,
        /// Stored `content`, untouched
        payload: Vec<u8>,
    },
}

#[derive(Serialize, Deserialize)]
struct TextPayload {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct HeadingPayload {
    name: String,
    color: String,
}

impl BlockContent {
    /// Text content
    pub fn text(text: impl Into<String>) -> Self {
        BlockContent::Text { text: text.into() }
    }

    /// The stored `type` value
    pub fn kind(&self) -> &str {
        match self {
            BlockContent::Text { .. } => TEXT_KIND,
            BlockContent::CategoryHeading { .. } => CATEGORY_HEADING_KIND,
            BlockContent::Other { kind, .. } => kind,
        }
    }

    /// The text of a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BlockContent::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Decode the `type` and `content` columns
    pub fn from_columns(kind: &str, content: &str) -> Self {
        let decoded = match kind {
            TEXT_KIND => serde_json::from_str::<TextPayload>(content)
                .ok()
                .map(|p| BlockContent::Text { text: p.text }),
            CATEGORY_HEADING_KIND => serde_json::from_str::<HeadingPayload>(content)
                .ok()
                .map(|p| BlockContent::CategoryHeading {
                    name: p.name,
                    color: p.color,
                }),
            _ => None,
        };

        decoded.unwrap_or_else(|| BlockContent::Other {
            kind: kind.to_string(),
            payload: content.as_bytes().to_vec(),
        })
    }

    /// Encode into `(type, content)` column values
    pub fn to_columns(&self) -> Result<(String, String)> {
        let content = match self {
            BlockContent::Text { text } => serde_json::to_string(&TextPayload { text: text.clone() })?,
            BlockContent::CategoryHeading { name, color } => {
                serde_json::to_string(&HeadingPayload {
                    name: name.clone(),
                    color: color.clone(),
                })?
            }
            BlockContent::Other { payload, .. } => String::from_utf8(payload.clone())
                .map_err(|_| Error::InvalidInput("block payload is not UTF-8".to_string()))?,
        };
        Ok((self.kind().to_string(), content))
    }
}

/// One content fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Row id
    pub id: i64,
    /// Owner
    pub parent: ParentRef,
    /// Decoded payload
    pub content: BlockContent,
    /// Rank among siblings, 0-based
    pub position: i64,
    /// Who wrote it
    pub author: Author,
    /// When the row was created (UTC)
    pub created_at: NaiveDateTime,
    /// When the row was last touched (UTC)
    pub updated_at: NaiveDateTime,
}

impl Block {
    fn from_row(row: &Row) -> Result<Self> {
        let author = super::opt_text(row, "author")?;
        Ok(Self {
            id: int(row, "id")?,
            parent: ParentRef {
                parent_type: text(row, "parent_type")?,
                parent_id: int(row, "parent_id")?,
            },
            content: BlockContent::from_columns(&text(row, "type")?, &text(row, "content")?),
            position: super::opt_int(row, "position")?.unwrap_or(0),
            author: Author::from_stored(author.as_deref()),
            created_at: timestamp(row, "created_at")?,
            updated_at: timestamp(row, "updated_at")?,
        })
    }
}

/// Append a block after its last sibling
pub(crate) fn insert_block(
    engine: &Engine,
    parent: &ParentRef,
    content: &BlockContent,
    author: Author,
) -> Result<i64> {
    let (kind, body) = content.to_columns()?;
    engine.insert(
        "INSERT INTO blocks (parent_type, parent_id, type, content, position, author)
         SELECT ?1, ?2, ?3, ?4, COALESCE(MAX(position) + 1, 0), ?5
         FROM blocks WHERE parent_type = ?1 AND parent_id = ?2",
        json!([parent.parent_type, parent.parent_id, kind, body, author.as_str()]),
    )
}

impl<S: StorageBackend> Journal<S> {
    /// Append a block under `parent`
    pub async fn create_block(
        &self,
        parent: ParentRef,
        content: BlockContent,
        author: Author,
    ) -> Result<i64> {
        let id = insert_block(self.handle()?, &parent, &content, author)?;
        self.flush().await?;
        Ok(id)
    }

    /// One block by id
    pub fn get_block(&self, id: i64) -> Result<Option<Block>> {
        let rows = self
            .handle()?
            .query("SELECT * FROM blocks WHERE id = ?", json!([id]))?;
        rows.first().map(Block::from_row).transpose()
    }

    /// Blocks under `parent` by position
    pub fn blocks_for_parent(&self, parent: &ParentRef) -> Result<Vec<Block>> {
        self.handle()?
            .query(
                "SELECT * FROM blocks WHERE parent_type = ? AND parent_id = ?
                 ORDER BY position ASC, id ASC",
                json!([parent.parent_type, parent.parent_id]),
            )?
            .iter()
            .map(Block::from_row)
            .collect()
    }

    /// Replace a block's payload (and type)
    pub async fn update_block_content(&self, id: i64, content: BlockContent) -> Result<()> {
        let (kind, body) = content.to_columns()?;
        let changed = self.handle()?.exec(
            "UPDATE blocks SET type = ?, content = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            json!([kind, body, id]),
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("block {}", id)));
        }
        self.flush().await
    }

    /// Delete one block; siblings keep their positions
    pub async fn delete_block(&self, id: i64) -> Result<bool> {
        let removed = self
            .handle()?
            .exec("DELETE FROM blocks WHERE id = ?", json!([id]))?;
        if removed == 0 {
            self.flush_pending().await?;
            return Ok(false);
        }
        self.flush().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use chrono::NaiveDate;

    async fn setup() -> (Journal<MemoryBackend>, MemoryBackend) {
        let backend = MemoryBackend::new();
        let journal = Journal::open(backend.clone()).await.unwrap();
        (journal, backend)
    }

    #[tokio::test]
    async fn test_positions_per_parent_are_dense() {
        let (journal, _) = setup().await;
        let a = ParentRef::entry(1);
        let b = ParentRef::entry(2);

        for (parent, text) in [(&a, "a0"), (&b, "b0"), (&a, "a1"), (&b, "b1"), (&a, "a2")] {
            journal
                .create_block(parent.clone(), BlockContent::text(text), Author::User)
                .await
                .unwrap();
        }

        let under_a = journal.blocks_for_parent(&a).unwrap();
        assert_eq!(under_a.iter().map(|b| b.position).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(
            under_a.iter().filter_map(|b| b.content.as_text()).collect::<Vec<_>>(),
            vec!["a0", "a1", "a2"]
        );
        let under_b = journal.blocks_for_parent(&b).unwrap();
        assert_eq!(under_b.iter().map(|b| b.position).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_progress_scenario() {
        let (journal, _) = setup().await;
        let cat = journal.create_category("Progress", "#22c55e", None).await.unwrap();
        let note = journal
            .get_or_create_daily_note(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap();
        let entry = journal.create_entry(note.id, Some(cat), None).await.unwrap();

        let parent = ParentRef::entry(entry);
        journal
            .create_block(parent.clone(), BlockContent::text("a"), Author::User)
            .await
            .unwrap();
        journal
            .create_block(parent.clone(), BlockContent::text("b"), Author::User)
            .await
            .unwrap();

        let blocks = journal.blocks_for_parent(&parent).unwrap();
        assert_eq!(
            blocks.iter().map(|b| b.content.clone()).collect::<Vec<_>>(),
            vec![BlockContent::text("a"), BlockContent::text("b")]
        );
        assert_eq!(blocks.iter().map(|b| b.position).collect::<Vec<_>>(), vec![0, 1]);
        assert!(blocks.iter().all(|b| b.author == Author::User));
    }

    #[tokio::test]
    async fn test_unknown_content_survives_update() {
        let (journal, _) = setup().await;
        let parent = ParentRef::entry(7);
        let raw = r#"{"items":[{"done":true,"label":"ship"}]}"#;
        let content = BlockContent::Other {
            kind: "checklist".into(),
            payload: raw.as_bytes().to_vec(),
        };
        let id = journal
            .create_block(parent.clone(), content.clone(), Author::User)
            .await
            .unwrap();

        // Read, then write back what was read
        let block = journal.get_block(id).unwrap().unwrap();
        assert_eq!(block.content, content);
        journal.update_block_content(id, block.content).await.unwrap();

        let stored: Option<String> = journal
            .handle()
            .unwrap()
            .query_scalar("SELECT content FROM blocks WHERE id = ?", json!([id]))
            .unwrap();
        assert_eq!(stored.as_deref(), Some(raw));
    }

    #[test]
    fn test_content_columns() {
        let heading = BlockContent::CategoryHeading {
            name: "Blocker".into(),
            color: "#ef4444".into(),
        };
        let (kind, body) = heading.to_columns().unwrap();
        assert_eq!(kind, "category-heading");
        assert_eq!(BlockContent::from_columns(&kind, &body), heading);

        // A known type whose payload does not decode is preserved raw
        let broken = BlockContent::from_columns("text", "{\"txt\":1}");
        assert_eq!(
            broken,
            BlockContent::Other {
                kind: "text".into(),
                payload: b"{\"txt\":1}".to_vec()
            }
        );
        assert_eq!(broken.to_columns().unwrap().1, "{\"txt\":1}");

        let bad = BlockContent::Other {
            kind: "bin".into(),
            payload: vec![0xff, 0xfe],
        };
        assert!(matches!(bad.to_columns(), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_block() {
        let (journal, backend) = setup().await;
        let parent = ParentRef::entry(3);
        let first = journal
            .create_block(parent.clone(), BlockContent::text("x"), Author::User)
            .await
            .unwrap();
        let second = journal
            .create_block(parent.clone(), BlockContent::text("y"), Author::Ai)
            .await
            .unwrap();

        journal
            .update_block_content(first, BlockContent::text("x2"))
            .await
            .unwrap();
        assert_eq!(
            journal.get_block(first).unwrap().unwrap().content,
            BlockContent::text("x2")
        );
        assert_eq!(journal.get_block(second).unwrap().unwrap().author, Author::Ai);

        let saves = backend.save_count();
        assert!(journal.delete_block(first).await.unwrap());
        assert!(!journal.delete_block(first).await.unwrap());
        assert_eq!(backend.save_count(), saves + 1);

        // Next block still goes after the highest remaining position
        journal
            .create_block(parent.clone(), BlockContent::text("z"), Author::User)
            .await
            .unwrap();
        let positions: Vec<i64> = journal
            .blocks_for_parent(&parent)
            .unwrap()
            .iter()
            .map(|b| b.position)
            .collect();
        assert_eq!(positions, vec![1, 2]);

        assert!(matches!(
            journal.update_block_content(999, BlockContent::text("n")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_block_retry_after_failed_flush() {
        let (journal, backend) = setup().await;
        let id = journal
            .create_block(ParentRef::entry(1), BlockContent::text("x"), Author::User)
            .await
            .unwrap();

        backend.set_unavailable(Some("quota"));
        assert!(journal.delete_block(id).await.is_err());
        backend.set_unavailable(None);
        assert!(!journal.delete_block(id).await.unwrap());

        let reloaded = Journal::open(backend).await.unwrap();
        assert!(reloaded.get_block(id).unwrap().is_none());
    }
}
