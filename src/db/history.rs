//! History management operations.

use crate::types::{HistoryEventType, HistoryRecord};
use crate::{Error, Result};
use async_trait::async_trait;

use super::{Database, HistoryRow, HistoryStore, NewHistoryRow};

impl Database {
    /// Insert an event into history
    ///
    /// Written by the grab path and by the outcome detectors; the data
    /// map carries the client name and item id the detectors match on.
    pub async fn insert_history(&self, row: &NewHistoryRow) -> Result<i64> {
        let data = serde_json::to_string(&row.data)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO history (
                event, source_title, category, client_id, date, data
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.event.to_i32())
        .bind(&row.source_title)
        .bind(&row.category)
        .bind(row.client_id.map(|id| id.get()))
        .bind(now)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// All events of one kind, most recent first
    pub async fn history_by_event(&self, event: HistoryEventType) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, event, source_title, category, client_id, date, data
            FROM history
            WHERE event = ?
            ORDER BY date DESC, id DESC
            "#,
        )
        .bind(event.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(HistoryRecord::from).collect())
    }

    /// Query history with pagination and optional event filter
    ///
    /// Returns history entries ordered by date (most recent first).
    /// Use limit and offset for pagination.
    pub async fn query_history(
        &self,
        event_filter: Option<HistoryEventType>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryRecord>> {
        let query = if let Some(event) = event_filter {
            sqlx::query_as::<_, HistoryRow>(
                r#"
                SELECT id, event, source_title, category, client_id, date, data
                FROM history
                WHERE event = ?
                ORDER BY date DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(event.to_i32())
            .bind(limit as i64)
            .bind(offset as i64)
        } else {
            sqlx::query_as::<_, HistoryRow>(
                r#"
                SELECT id, event, source_title, category, client_id, date, data
                FROM history
                ORDER BY date DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(limit as i64)
            .bind(offset as i64)
        };

        let rows = query.fetch_all(&self.pool).await.map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(HistoryRecord::from).collect())
    }

    /// Count history entries (optionally filtered by event kind)
    ///
    /// Useful for pagination - returns total count of records matching the filter.
    pub async fn count_history(&self, event_filter: Option<HistoryEventType>) -> Result<i64> {
        let count = if let Some(event) = event_filter {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM history WHERE event = ?")
                .bind(event.to_i32())
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Sqlx)?
        } else {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM history")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Sqlx)?
        };

        Ok(count)
    }

    /// Get a single history entry by ID
    pub async fn get_history_entry(&self, id: i64) -> Result<Option<HistoryRecord>> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, event, source_title, category, client_id, date, data
            FROM history
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(row.map(HistoryRecord::from))
    }
}

#[async_trait]
impl HistoryStore for Database {
    async fn grabbed(&self) -> Result<Vec<HistoryRecord>> {
        self.history_by_event(HistoryEventType::Grabbed).await
    }

    async fn failed(&self) -> Result<Vec<HistoryRecord>> {
        self.history_by_event(HistoryEventType::Failed).await
    }

    async fn imported(&self) -> Result<Vec<HistoryRecord>> {
        self.history_by_event(HistoryEventType::Imported).await
    }

    async fn record(&self, row: &NewHistoryRow) -> Result<i64> {
        self.insert_history(row).await
    }
}
