//! # Error Handling
//!
//! Error types for the Secretariat data layer.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                      │
//! │  │                                                                      │
//! │  ├── Lifecycle Errors (100)                                             │
//! │  │   ├── NotInitialized           - Journal used before Ready           │
//! │  │   ├── AlreadyInitialized       - initialize() called twice           │
//! │  │   └── InitializationInProgress - initialize() re-entered             │
//! │  │                                                                      │
//! │  ├── Storage Errors (200)                                               │
//! │  │   ├── StorageUnavailable       - Backend open/read/write failed      │
//! │  │   ├── Database                 - Engine statement failed             │
//! │  │   └── Corrupted                - Stored row could not be decoded     │
//! │  │                                                                      │
//! │  ├── Migration Errors (300)                                             │
//! │  │   └── MigrationFailed          - A migration step aborted            │
//! │  │                                                                      │
//! │  ├── Record Errors (400)                                                │
//! │  │   ├── NotFound                 - Referenced row does not exist       │
//! │  │   └── InvalidInput             - Caller supplied unusable input      │
//! │  │                                                                      │
//! │  └── Summarization Errors (500)                                         │
//! │      ├── NoApiKey                 - No API key in settings              │
//! │      ├── LlmNetwork               - Endpoint unreachable / failed       │
//! │      ├── LlmAuth                  - 401 / 403 / bad key                 │
//! │      ├── LlmRateLimited           - 429                                 │
//! │      ├── LlmInvalidResponse       - Body not in the expected shape      │
//! │      └── NothingToSummarize       - No user entries on the note         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Initialization failures (storage, migration) are fatal to startup and must
//! stop the caller from presenting data. Failures after `Ready` go back to
//! the immediate caller; the core never retries on its own.

use thiserror::Error;

/// Result type alias for data layer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the data layer
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle Errors (100-199)
    // ========================================================================

    /// The journal has not reached `Ready`
    #[error("Database not initialized. Call Journal::initialize() first.")]
    NotInitialized,

    /// `initialize()` was called on a journal that is already `Ready`
    #[error("Database has already been initialized.")]
    AlreadyInitialized,

    /// `initialize()` was called while another initialization is running
    #[error("Database initialization is already in progress.")]
    InitializationInProgress,

    // ========================================================================
    // Storage Errors (200-299)
    // ========================================================================

    /// The storage backend could not be opened, read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An engine statement failed
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be decoded
    #[error("Stored data is corrupted: {0}")]
    Corrupted(String),

    // ========================================================================
    // Migration Errors (300-399)
    // ========================================================================

    /// A migration step failed; the image was left as last flushed
    #[error("Migration '{step}' failed: {reason}")]
    MigrationFailed {
        /// Name of the failing step
        step: String,
        /// What went wrong
        reason: String,
    },

    // ========================================================================
    // Record Errors (400-499)
    // ========================================================================

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied input the store cannot accept
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Summarization Errors (500-599)
    // ========================================================================

    /// No API key configured in settings
    #[error("Gemini API key not configured. Add it in Settings.")]
    NoApiKey,

    /// The text-generation endpoint could not be reached or failed
    #[error("Summarization request failed: {0}")]
    LlmNetwork(String),

    /// The endpoint rejected the API key
    #[error("Invalid API key. Check your Gemini API key in Settings.")]
    LlmAuth,

    /// The endpoint is rate limiting us
    #[error("Rate limited by the summarization service. Please try again later.")]
    LlmRateLimited,

    /// The endpoint answered with something we could not use
    #[error("Unexpected response from the summarization service: {0}")]
    LlmInvalidResponse(String),

    /// The daily note has no user entries
    #[error("No entries to summarize")]
    NothingToSummarize,

    // ========================================================================
    // Generic Errors (900-999)
    // ========================================================================

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Numeric code grouping the error by domain
    pub fn code(&self) -> i32 {
        match self {
            Error::NotInitialized => 100,
            Error::AlreadyInitialized => 101,
            Error::InitializationInProgress => 102,

            Error::StorageUnavailable(_) => 200,
            Error::Database(_) => 201,
            Error::Corrupted(_) => 202,

            Error::MigrationFailed { .. } => 300,

            Error::NotFound(_) => 400,
            Error::InvalidInput(_) => 401,

            Error::NoApiKey => 500,
            Error::LlmNetwork(_) => 501,
            Error::LlmAuth => 502,
            Error::LlmRateLimited => 503,
            Error::LlmInvalidResponse(_) => 504,
            Error::NothingToSummarize => 505,

            Error::Serialization(_) => 900,
            Error::Internal(_) => 901,
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::LlmNetwork(_) | Error::LlmRateLimited)
    }

    /// Whether the user has to change something (settings) before retrying
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Error::NoApiKey | Error::LlmAuth)
    }

    /// Whether this error must stop application startup
    pub fn is_fatal_to_startup(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable(_)
                | Error::MigrationFailed { .. }
                | Error::Corrupted(_)
                | Error::Database(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
