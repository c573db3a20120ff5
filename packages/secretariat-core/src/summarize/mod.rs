//! # Summarization
//!
//! Builds the "Daily Summary" AI entry of a daily note from its user
//! entries through an external text-generation service.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       DAILY SUMMARY PIPELINE                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  settings.gemini_api_key ──── missing ──► NoApiKey                      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  user entries + blocks ────── none ─────► NothingToSummarize            │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  build_prompt() ──► TextGenerator::generate() ──► parse_summary()       │
//! │                         │                              │                │
//! │          LlmNetwork / LlmAuth / LlmRateLimited   LlmInvalidResponse     │
//! │                                                        │                │
//! │        ┌───────────────────────────────────────────────┘                │
//! │        ▼   (one transaction)                                            │
//! │  delete previous "Daily Summary" entry + blocks                         │
//! │  insert AI entry (source_entry_ids = summarized entries)                │
//! │  per category: category-heading block, "• highlight" text blocks       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  flush (once)                                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is written until the generator has answered and the answer has
//! parsed, so a failed call leaves any previous summary in place.

mod gemini;
mod prompt;

pub use gemini::{
    classify_failure, extract_text, GeminiClient, GeminiConfig, DEFAULT_ENDPOINT, ENDPOINT_ENV,
};
pub use prompt::{
    build_prompt, parse_summary, Summary, SummaryCategory, UNCATEGORIZED, UNCATEGORIZED_COLOR,
};

use async_trait::async_trait;
use serde_json::json;

use crate::database::Journal;
use crate::error::{Error, Result};
use crate::records::{
    self, Author, BlockContent, ParentRef, DAILY_SUMMARY_TITLE, GEMINI_API_KEY,
};
use crate::storage::{MaybeSendSync, StorageBackend};

/// An external text-generation service
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait TextGenerator: MaybeSendSync {
    /// Generate a completion for `prompt`
    ///
    /// Failures must be classified into the summarization error kinds
    /// (`LlmNetwork`, `LlmAuth`, `LlmRateLimited`, `LlmInvalidResponse`).
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String>;
}

impl<S: StorageBackend> Journal<S> {
    /// Summarize the user entries of a daily note
    ///
    /// Returns the id of the new summary entry. Any previous summary of the
    /// note is replaced.
    pub async fn create_daily_summary<G>(&self, daily_note_id: i64, generator: &G) -> Result<i64>
    where
        G: TextGenerator + ?Sized,
    {
        let engine = self.handle()?;

        let api_key = records::read_setting(engine, GEMINI_API_KEY)?
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::NoApiKey)?;

        let mut sources = Vec::new();
        for entry in records::list_entries(engine, daily_note_id)? {
            if entry.is_ai_generated {
                continue;
            }
            let blocks = self.blocks_for_parent(&ParentRef::entry(entry.id))?;
            sources.push((entry, blocks));
        }
        if sources.is_empty() {
            return Err(Error::NothingToSummarize);
        }

        let prompt = build_prompt(&sources);
        tracing::info!(
            daily_note_id,
            entries = sources.len(),
            "Requesting daily summary"
        );
        let answer = generator.generate(&api_key, &prompt).await?;
        let summary = parse_summary(&answer)?;

        let source_ids: Vec<i64> = sources.iter().map(|(e, _)| e.id).collect();
        let engine = self.handle()?;
        let summary_id = engine.transaction(|tx| {
            let previous = tx.query(
                "SELECT id FROM entries WHERE daily_note_id = ? AND is_ai_generated = 1 AND title = ?",
                json!([daily_note_id, DAILY_SUMMARY_TITLE]),
            )?;
            for row in &previous {
                records::delete_entry_with_blocks(tx, records::int(row, "id")?)?;
            }

            let id = records::insert_ai_entry(tx, daily_note_id, DAILY_SUMMARY_TITLE, &source_ids)?;
            let parent = ParentRef::entry(id);
            for category in &summary.categories {
                let heading = BlockContent::CategoryHeading {
                    name: category.name.clone(),
                    color: category.color.clone(),
                };
                records::insert_block(tx, &parent, &heading, Author::Ai)?;
                for highlight in &category.highlights {
                    let line = BlockContent::text(format!("• {}", highlight));
                    records::insert_block(tx, &parent, &line, Author::Ai)?;
                }
            }
            Ok(id)
        })?;

        self.flush().await?;
        tracing::info!(
            daily_note_id,
            summary_id,
            categories = summary.categories.len(),
            "Daily summary created"
        );
        Ok(summary_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use chrono::NaiveDate;
    use parking_lot::Mutex;

    /// Replays a canned answer and records what it was asked.
    struct StubGenerator {
        answer: Mutex<Option<Result<String>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StubGenerator {
        fn answering(answer: Result<String>) -> Self {
            Self {
                answer: Mutex::new(Some(answer)),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
    #[cfg_attr(not(target_arch = "wasm32"), async_trait)]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, api_key: &str, prompt: &str) -> Result<String> {
            self.calls.lock().push((api_key.to_string(), prompt.to_string()));
            self.answer
                .lock()
                .take()
                .unwrap_or_else(|| Err(Error::Internal("stub exhausted".into())))
        }
    }

    const ANSWER: &str = r##"{"categories":[
        {"name":"Progress","color":"#22c55e","highlights":["Shipped login","Fixed CI"]},
        {"name":"Blocker","color":"#ef4444","highlights":["Waiting on review"]}
    ]}"##;

    async fn seeded() -> (Journal<MemoryBackend>, MemoryBackend, i64, Vec<i64>) {
        let backend = MemoryBackend::new();
        let journal = Journal::open(backend.clone()).await.unwrap();
        let note = journal
            .get_or_create_daily_note(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap();
        let progress = journal.categories().unwrap()[0].id;
        let a = journal.create_entry(note.id, Some(progress), Some("Auth")).await.unwrap();
        journal
            .create_block(ParentRef::entry(a), BlockContent::text("login works"), Author::User)
            .await
            .unwrap();
        let b = journal.create_entry(note.id, None, None).await.unwrap();
        journal
            .create_block(ParentRef::entry(b), BlockContent::text("pinged reviewer"), Author::User)
            .await
            .unwrap();
        (journal, backend, note.id, vec![a, b])
    }

    #[tokio::test]
    async fn test_summary_builds_ai_entry_with_one_flush() {
        let (journal, backend, note, sources) = seeded().await;
        journal.set_setting(GEMINI_API_KEY, "key-123").await.unwrap();
        let saves = backend.save_count();

        let stub = StubGenerator::answering(Ok(ANSWER.to_string()));
        let id = journal.create_daily_summary(note, &stub).await.unwrap();
        assert_eq!(backend.save_count(), saves + 1);

        let calls = stub.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "key-123");
        assert!(calls[0].1.contains("## Progress (color: #22c55e)"));
        assert!(calls[0].1.contains("## Uncategorized (color: #6b7280)"));
        assert!(calls[0].1.contains("login works"));

        let entry = journal.ai_summary_for_daily_note(note).unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.source_entry_ids, Some(sources));

        let blocks = journal.blocks_for_parent(&ParentRef::entry(id)).unwrap();
        let contents: Vec<BlockContent> = blocks.iter().map(|b| b.content.clone()).collect();
        assert_eq!(
            contents,
            vec![
                BlockContent::CategoryHeading { name: "Progress".into(), color: "#22c55e".into() },
                BlockContent::text("• Shipped login"),
                BlockContent::text("• Fixed CI"),
                BlockContent::CategoryHeading { name: "Blocker".into(), color: "#ef4444".into() },
                BlockContent::text("• Waiting on review"),
            ]
        );
        assert!(blocks.iter().all(|b| b.author == Author::Ai));
        assert_eq!(blocks.iter().map(|b| b.position).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_summary_replaces_previous_and_skips_ai_entries() {
        let (journal, _, note, sources) = seeded().await;
        journal.set_setting(GEMINI_API_KEY, "k").await.unwrap();

        let first = journal
            .create_daily_summary(note, &StubGenerator::answering(Ok(ANSWER.to_string())))
            .await
            .unwrap();
        let second_stub = StubGenerator::answering(Ok(r#"{"categories":[]}"#.to_string()));
        let second = journal.create_daily_summary(note, &second_stub).await.unwrap();

        assert_ne!(first, second);
        assert!(journal.get_entry(first).unwrap().is_none());
        assert!(journal.blocks_for_parent(&ParentRef::entry(first)).unwrap().is_empty());
        // The previous AI summary was not fed back into the prompt
        assert!(!second_stub.calls.lock()[0].1.contains("Shipped login"));
        assert_eq!(
            journal.get_entry(second).unwrap().unwrap().source_entry_ids,
            Some(sources)
        );

        let ai_entries = journal
            .entries_for_daily_note(note)
            .unwrap()
            .into_iter()
            .filter(|e| e.is_ai_generated)
            .count();
        assert_eq!(ai_entries, 1);
    }

    #[tokio::test]
    async fn test_no_api_key() {
        let (journal, backend, note, _) = seeded().await;
        let saves = backend.save_count();
        let stub = StubGenerator::answering(Ok(ANSWER.to_string()));

        let err = journal.create_daily_summary(note, &stub).await.unwrap_err();
        assert!(matches!(err, Error::NoApiKey));
        assert!(err.requires_user_action());
        assert!(stub.calls.lock().is_empty());
        assert_eq!(backend.save_count(), saves);
    }

    #[tokio::test]
    async fn test_nothing_to_summarize() {
        let backend = MemoryBackend::new();
        let journal = Journal::open(backend).await.unwrap();
        journal.set_setting(GEMINI_API_KEY, "k").await.unwrap();
        let note = journal
            .get_or_create_daily_note(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
            .await
            .unwrap();

        let stub = StubGenerator::answering(Ok(ANSWER.to_string()));
        assert!(matches!(
            journal.create_daily_summary(note.id, &stub).await,
            Err(Error::NothingToSummarize)
        ));
    }

    #[tokio::test]
    async fn test_failed_generation_keeps_existing_summary() {
        let (journal, backend, note, _) = seeded().await;
        journal.set_setting(GEMINI_API_KEY, "k").await.unwrap();
        let existing = journal
            .create_daily_summary(note, &StubGenerator::answering(Ok(ANSWER.to_string())))
            .await
            .unwrap();
        let saves = backend.save_count();

        let limited = StubGenerator::answering(Err(Error::LlmRateLimited));
        assert!(matches!(
            journal.create_daily_summary(note, &limited).await,
            Err(Error::LlmRateLimited)
        ));

        let garbled = StubGenerator::answering(Ok("I'm sorry, I can't do JSON".to_string()));
        assert!(matches!(
            journal.create_daily_summary(note, &garbled).await,
            Err(Error::LlmInvalidResponse(_))
        ));

        assert_eq!(journal.ai_summary_for_daily_note(note).unwrap().unwrap().id, existing);
        assert_eq!(backend.save_count(), saves);
    }
}
