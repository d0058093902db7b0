//! Database layer for mirror-dl
//!
//! Persists "incomplete task" records in SQLite so that tasks interrupted by a
//! restart can be reported to their chats afterwards.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`incomplete`] - Incomplete-task records

use crate::error::Result;
use crate::types::ChatId;
use async_trait::async_trait;
use sqlx::{FromRow, sqlite::SqlitePool};

mod incomplete;
mod migrations;

/// Where in-flight tasks are recorded while they run
///
/// Writes are best effort: the controller logs and ignores failures.
#[async_trait]
pub trait IncompleteTaskStore: Send + Sync {
    /// Record a task that has started acquiring
    async fn add_incomplete_task(&self, chat_id: ChatId, link: &str, tag: &str) -> Result<()>;

    /// Forget a task that reached a terminal state
    async fn rm_complete_task(&self, link: &str) -> Result<()>;
}

/// Incomplete-task record from database
#[derive(Debug, Clone, FromRow)]
pub struct IncompleteTask {
    /// Unique database ID
    pub id: i64,
    /// Chat the task was submitted from
    pub chat_id: i64,
    /// Link to the submitting message
    pub link: String,
    /// Submitter mention
    pub tag: String,
    /// Unix timestamp when the record was created
    pub created_at: i64,
}

/// Database handle for mirror-dl
pub struct Database {
    pool: SqlitePool,
}
