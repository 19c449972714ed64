use chrono::Utc;
use sqlx::Row;

use super::{SqliteRepository, mapping::map_card_row};
use crate::repository::{CardSet, SetRepository, StorageError};

#[async_trait::async_trait]
impl SetRepository for SqliteRepository {
    async fn upsert_set(&self, set: &CardSet) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO sets (id, name, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert
                name = excluded.name
            ",
        )
        .bind(&set.id)
        .bind(&set.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        // The card list is replaced wholesale so removed cards do not linger.
        sqlx::query("DELETE FROM cards WHERE set_id = ?1")
            .bind(&set.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for card in &set.cards {
            sqlx::query(
                r"
                INSERT INTO cards (id, set_id, front, back, idx)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(card.id.as_str())
            .bind(&set.id)
            .bind(&card.front)
            .bind(&card.back)
            .bind(i64::from(card.index))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get_set(&self, id: &str) -> Result<CardSet, StorageError> {
        let set_row = sqlx::query("SELECT id, name FROM sets WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;

        let name: String = set_row
            .try_get("name")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let rows = sqlx::query(
            r"
            SELECT id, set_id, front, back, idx
            FROM cards
            WHERE set_id = ?1
            ORDER BY idx ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut cards = Vec::with_capacity(rows.len());
        for row in rows {
            cards.push(map_card_row(&row)?);
        }

        Ok(CardSet {
            id: id.to_owned(),
            name,
            cards,
        })
    }
}
