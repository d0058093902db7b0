//! Incomplete-task records.

use crate::error::DatabaseError;
use crate::types::ChatId;
use crate::{Error, Result};
use async_trait::async_trait;

use super::{Database, IncompleteTask, IncompleteTaskStore};

impl Database {
    /// Insert (or refresh) the record for `link`
    pub async fn insert_incomplete_task(&self, chat_id: ChatId, link: &str, tag: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO incomplete_tasks (chat_id, link, tag, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(link) DO UPDATE SET chat_id = excluded.chat_id, tag = excluded.tag
            "#,
        )
        .bind(chat_id.0)
        .bind(link)
        .bind(tag)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert incomplete task: {}",
                e
            )))
        })?;
        Ok(())
    }

    /// Delete the record for `link`; returns whether one existed
    pub async fn delete_incomplete_task(&self, link: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM incomplete_tasks WHERE link = ?")
            .bind(link)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete incomplete task: {}",
                    e
                )))
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// All records, oldest first
    pub async fn list_incomplete_tasks(&self) -> Result<Vec<IncompleteTask>> {
        let rows = sqlx::query_as::<_, IncompleteTask>(
            "SELECT id, chat_id, link, tag, created_at FROM incomplete_tasks ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list incomplete tasks: {}",
                e
            )))
        })?;
        Ok(rows)
    }

    /// Records for one chat, oldest first
    pub async fn incomplete_tasks_for_chat(&self, chat_id: ChatId) -> Result<Vec<IncompleteTask>> {
        let rows = sqlx::query_as::<_, IncompleteTask>(
            "SELECT id, chat_id, link, tag, created_at FROM incomplete_tasks WHERE chat_id = ? ORDER BY id ASC",
        )
        .bind(chat_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list incomplete tasks: {}",
                e
            )))
        })?;
        Ok(rows)
    }

    /// Drop every record (after they have been reported)
    pub async fn clear_incomplete_tasks(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM incomplete_tasks")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear incomplete tasks: {}",
                    e
                )))
            })?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl IncompleteTaskStore for Database {
    async fn add_incomplete_task(&self, chat_id: ChatId, link: &str, tag: &str) -> Result<()> {
        self.insert_incomplete_task(chat_id, link, tag).await
    }

    async fn rm_complete_task(&self, link: &str) -> Result<()> {
        self.delete_incomplete_task(link).await.map(|_| ())
    }
}
