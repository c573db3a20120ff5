//! Settings: flat string key/value configuration stored in the journal.

use serde_json::json;

use crate::database::schema::SCHEMA_VERSION_KEY;
use crate::database::{Engine, Journal};
use crate::error::{Error, Result};
use crate::storage::StorageBackend;

/// Settings key of the Gemini API key
pub const GEMINI_API_KEY: &str = "gemini_api_key";

pub(crate) fn read_setting(engine: &Engine, key: &str) -> Result<Option<String>> {
    engine.query_scalar("SELECT value FROM settings WHERE key = ?", json!([key]))
}

/// The schema version row is owned by the migration engine.
fn check_writable(key: &str) -> Result<()> {
    if key == SCHEMA_VERSION_KEY {
        return Err(Error::InvalidInput(format!("setting '{}' is reserved", key)));
    }
    Ok(())
}

impl<S: StorageBackend> Journal<S> {
    /// Value stored under `key`
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        read_setting(self.handle()?, key)
    }

    /// Store `value` under `key`, replacing any previous value
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        check_writable(key)?;
        self.handle()?.exec(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            json!([key, value]),
        )?;
        self.flush().await
    }

    /// Remove `key`; returns whether it existed
    pub async fn delete_setting(&self, key: &str) -> Result<bool> {
        check_writable(key)?;
        let removed = self
            .handle()?
            .exec("DELETE FROM settings WHERE key = ?", json!([key]))?;
        if removed == 0 {
            self.flush_pending().await?;
            return Ok(false);
        }
        self.flush().await?;
        Ok(true)
    }
}
