//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use study_core::SessionStateError;

/// Errors emitted by `StudySessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyServiceError {
    #[error("card set {0} has no cards to study")]
    EmptyDeck(String),
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
