use sqlx::Row;
use study_core::model::{Card, CardId, HistoryEntry, Piles, SessionSnapshot};

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn map_card_row(row: &sqlx::sqlite::SqliteRow) -> Result<Card, StorageError> {
    let idx_i64: i64 = row.try_get("idx").map_err(ser)?;
    let index =
        u32::try_from(idx_i64).map_err(|_| StorageError::Serialization(format!("invalid idx: {idx_i64}")))?;

    Ok(Card {
        id: CardId::new(row.try_get::<String, _>("id").map_err(ser)?),
        front: row.try_get("front").map_err(ser)?,
        back: row.try_get("back").map_err(ser)?,
        index,
    })
}

/// Reassembles a snapshot from its three persisted columns. The history and
/// pile columns are JSON documents with the session's stable wire shape.
pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SessionSnapshot, StorageError> {
    let round_i64: i64 = row.try_get("round").map_err(ser)?;
    let round = u32::try_from(round_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid round: {round_i64}")))?;

    let history: Vec<HistoryEntry> =
        serde_json::from_str(row.try_get::<String, _>("history").map_err(ser)?.as_str())
            .map_err(ser)?;
    let piles: Piles =
        serde_json::from_str(row.try_get::<String, _>("piles").map_err(ser)?.as_str())
            .map_err(ser)?;

    Ok(SessionSnapshot {
        round,
        history,
        piles,
    })
}

pub(crate) fn history_json(snapshot: &SessionSnapshot) -> Result<String, StorageError> {
    serde_json::to_string(&snapshot.history).map_err(ser)
}

pub(crate) fn piles_json(snapshot: &SessionSnapshot) -> Result<String, StorageError> {
    serde_json::to_string(&snapshot.piles).map_err(ser)
}
