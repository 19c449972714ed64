use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use study_core::model::{Card, SessionSnapshot};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A named collection of flashcards, stored and loaded as a unit.
///
/// `cards` is kept in canonical order (ascending `index`); repositories are
/// expected to return it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSet {
    pub id: String,
    pub name: String,
    pub cards: Vec<Card>,
}

impl CardSet {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, mut cards: Vec<Card>) -> Self {
        cards.sort_by_key(|card| card.index);
        Self {
            id: id.into(),
            name: name.into(),
            cards,
        }
    }
}

/// Repository contract for card sets.
#[async_trait]
pub trait SetRepository: Send + Sync {
    /// Persist a set, replacing its card list wholesale.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn upsert_set(&self, set: &CardSet) -> Result<(), StorageError>;

    /// Fetch a set by id, cards in canonical order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_set(&self, id: &str) -> Result<CardSet, StorageError>;
}

/// Repository contract for per-session study progress.
///
/// Progress is keyed by an opaque session key (in practice `user:set`), and
/// stores a full [`SessionSnapshot`]. Loading missing progress is not an
/// error; a fresh session is the normal answer.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch saved progress, or `None` if the session has never been saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn load_progress(
        &self,
        session_key: &str,
    ) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Persist or overwrite progress for a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_progress(
        &self,
        session_key: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError>;

    /// Remove saved progress. Deleting a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn delete_progress(&self, session_key: &str) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sets: Arc<Mutex<HashMap<String, CardSet>>>,
    progress: Arc<Mutex<HashMap<String, SessionSnapshot>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SetRepository for InMemoryRepository {
    async fn upsert_set(&self, set: &CardSet) -> Result<(), StorageError> {
        let mut guard = self
            .sets
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(set.id.clone(), set.clone());
        Ok(())
    }

    async fn get_set(&self, id: &str) -> Result<CardSet, StorageError> {
        let guard = self
            .sets
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(
        &self,
        session_key: &str,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(session_key).cloned())
    }

    async fn save_progress(
        &self,
        session_key: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(session_key.to_owned(), snapshot.clone());
        Ok(())
    }

    async fn delete_progress(&self, session_key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(session_key);
        Ok(())
    }
}

/// Aggregates set and progress repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sets: Arc<dyn SetRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sets: Arc<dyn SetRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { sets, progress }
    }
}
