//! Daily notes: one per calendar date, created on first access.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{int, text, timestamp};
use crate::database::{Journal, Row};
use crate::error::{Error, Result};
use crate::storage::StorageBackend;
use crate::time;

/// The note for one calendar date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyNote {
    /// Row id
    pub id: i64,
    /// Calendar date, unique across notes
    pub date: NaiveDate,
    /// When the row was created (UTC)
    pub created_at: NaiveDateTime,
    /// When the row was last touched (UTC)
    pub updated_at: NaiveDateTime,
}

impl DailyNote {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: int(row, "id")?,
            date: time::parse_date(&text(row, "date")?)?,
            created_at: timestamp(row, "created_at")?,
            updated_at: timestamp(row, "updated_at")?,
        })
    }
}

impl<S: StorageBackend> Journal<S> {
    /// The note for `date`, creating it if this is the first access
    ///
    /// The insert is `INSERT OR IGNORE` against the unique date, so two calls
    /// for the same date always resolve to the same row.
    pub async fn get_or_create_daily_note(&self, date: NaiveDate) -> Result<DailyNote> {
        let engine = self.handle()?;
        let inserted = engine.exec(
            "INSERT OR IGNORE INTO daily_notes (date) VALUES (?)",
            json!([time::format_date(date)]),
        )?;

        let note = self
            .get_daily_note(date)?
            .ok_or_else(|| Error::Internal(format!("daily note for {} vanished", date)))?;

        if inserted > 0 {
            tracing::debug!(date = %date, id = note.id, "Created daily note");
            self.flush().await?;
        } else {
            self.flush_pending().await?;
        }
        Ok(note)
    }

    /// The note for `date`, if one exists
    pub fn get_daily_note(&self, date: NaiveDate) -> Result<Option<DailyNote>> {
        let rows = self.handle()?.query(
            "SELECT * FROM daily_notes WHERE date = ?",
            json!([time::format_date(date)]),
        )?;
        rows.first().map(DailyNote::from_row).transpose()
    }

    /// Dates in `[start, end]` that have a note, ascending
    pub fn dates_with_notes(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let rows = self.handle()?.query(
            "SELECT date FROM daily_notes WHERE date >= ? AND date <= ? ORDER BY date ASC",
            json!([time::format_date(start), time::format_date(end)]),
        )?;
        rows.iter()
            .map(|row| time::parse_date(&text(row, "date")?))
            .collect()
    }
}
