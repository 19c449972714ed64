use chrono::Utc;
use study_core::model::SessionSnapshot;

use super::{
    SqliteRepository,
    mapping::{history_json, map_progress_row, piles_json},
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(
        &self,
        session_key: &str,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT round, history, piles
            FROM user_progress
            WHERE session_key = ?1
            ",
        )
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn save_progress(
        &self,
        session_key: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_progress (session_key, round, history, piles, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(session_key) DO UPDATE SET
                round = excluded.round,
                history = excluded.history,
                piles = excluded.piles,
                updated_at = excluded.updated_at
            ",
        )
        .bind(session_key)
        .bind(i64::from(snapshot.round))
        .bind(history_json(snapshot)?)
        .bind(piles_json(snapshot)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn delete_progress(&self, session_key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM user_progress WHERE session_key = ?1")
            .bind(session_key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
