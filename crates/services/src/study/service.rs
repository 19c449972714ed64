use std::fmt;
use std::sync::Arc;

use storage::repository::{Storage, StorageError};
use study_core::StudySession;
use study_core::model::{Card, CardId, Phase, PileId, SessionSnapshot};

use super::autosave::AutosaveService;
use super::progress::StudyProgress;
use crate::error::StudyServiceError;

//
// ─── STUDY SESSION SERVICE ─────────────────────────────────────────────────────
//

/// Orchestrates one user's study session over one card set.
///
/// Wraps the in-memory state machine with load-or-seed startup and debounced
/// persistence: every successful action queues an autosave, and `flush`
/// writes the final state synchronously on shutdown.
pub struct StudySessionService {
    session_key: String,
    session: StudySession,
    autosave: AutosaveService,
}

impl StudySessionService {
    /// Resume the session stored under `session_key`, or seed a fresh one
    /// from the card set when no progress exists yet.
    ///
    /// A stored snapshot whose history references cards that are no longer
    /// in any pile loses its history on load; the piles are kept as stored.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::EmptyDeck` if seeding is needed and the
    /// set has no cards, `StorageError::NotFound` (wrapped) if the set does
    /// not exist, or other storage errors.
    pub async fn open(
        storage: &Storage,
        set_id: &str,
        session_key: &str,
    ) -> Result<Self, StudyServiceError> {
        let session = match storage.progress.load_progress(session_key).await? {
            Some(mut snapshot) => {
                if snapshot.sanitize() {
                    log::warn!("dropped inconsistent history for session {session_key}");
                }
                StudySession::new(snapshot)
            }
            None => {
                let set = storage.sets.get_set(set_id).await?;
                if set.cards.is_empty() {
                    return Err(StudyServiceError::EmptyDeck(set_id.to_owned()));
                }
                log::info!(
                    "seeding session {session_key} from set {set_id} ({} cards)",
                    set.cards.len()
                );
                StudySession::seeded(set.cards)
            }
        };

        Ok(Self {
            session_key: session_key.to_owned(),
            session,
            autosave: AutosaveService::new(Arc::clone(&storage.progress), session_key),
        })
    }

    #[must_use]
    pub fn with_autosave(mut self, autosave: AutosaveService) -> Self {
        self.autosave = autosave;
        self
    }

    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    #[must_use]
    pub fn snapshot(&self) -> &SessionSnapshot {
        self.session.snapshot()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    #[must_use]
    pub fn active_card(&self) -> Option<&Card> {
        self.session.active_card()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    #[must_use]
    pub fn is_shuffled(&self) -> bool {
        self.session.is_shuffled()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> StudyProgress {
        let snapshot = self.session.snapshot();
        let piles = &snapshot.piles;
        StudyProgress {
            round: snapshot.round,
            phase: self.session.phase(),
            deck_remaining: piles.pile(self.session.phase().deck_pile()).len(),
            known: piles.pile(PileId::Know).len(),
            unknown: piles.pile(PileId::DontKnow).len(),
            discarded: piles.pile(PileId::Discard).len(),
            is_complete: self.session.is_complete(),
        }
    }

    /// Skip the active card.
    ///
    /// # Errors
    ///
    /// Propagates `SessionStateError` via `StudyServiceError::Session`.
    pub fn skip(&mut self) -> Result<&SessionSnapshot, StudyServiceError> {
        self.session.skip()?;
        self.queue_save();
        Ok(self.session.snapshot())
    }

    /// Mark the active card as known.
    ///
    /// # Errors
    ///
    /// Propagates `SessionStateError` via `StudyServiceError::Session`.
    pub fn mark_known(&mut self) -> Result<&SessionSnapshot, StudyServiceError> {
        self.session.mark_known()?;
        self.queue_save();
        Ok(self.session.snapshot())
    }

    /// Mark the active card as not yet known.
    ///
    /// # Errors
    ///
    /// Propagates `SessionStateError` via `StudyServiceError::Session`.
    pub fn mark_unknown(&mut self) -> Result<&SessionSnapshot, StudyServiceError> {
        self.session.mark_unknown()?;
        self.queue_save();
        Ok(self.session.snapshot())
    }

    /// Undo the most recent logged move.
    ///
    /// # Errors
    ///
    /// Propagates `SessionStateError` via `StudyServiceError::Session`.
    pub fn undo(&mut self) -> Result<&SessionSnapshot, StudyServiceError> {
        self.session.undo()?;
        self.queue_save();
        Ok(self.session.snapshot())
    }

    /// Shuffle the deck pile, or restore canonical order if already shuffled.
    ///
    /// # Errors
    ///
    /// Propagates `SessionStateError` via `StudyServiceError::Session`.
    pub fn toggle_shuffle(&mut self) -> Result<&SessionSnapshot, StudyServiceError> {
        self.session.toggle_shuffle(&mut rand::rng())?;
        self.queue_save();
        Ok(self.session.snapshot())
    }

    /// Advance to the next round once the deck pile is empty.
    ///
    /// # Errors
    ///
    /// Propagates `SessionStateError` via `StudyServiceError::Session`.
    pub fn advance_round(&mut self) -> Result<&SessionSnapshot, StudyServiceError> {
        self.session.advance_round()?;
        self.queue_save();
        Ok(self.session.snapshot())
    }

    /// Restart the current pass through the deck pile.
    ///
    /// # Errors
    ///
    /// Propagates `SessionStateError` via `StudyServiceError::Session`.
    pub fn restart(&mut self) -> Result<&SessionSnapshot, StudyServiceError> {
        self.session.restart()?;
        self.queue_save();
        Ok(self.session.snapshot())
    }

    /// Drop a dragged card onto a pile.
    ///
    /// # Errors
    ///
    /// Propagates `SessionStateError` via `StudyServiceError::Session`,
    /// including `UnknownCard` for ids that are in no pile.
    pub fn drag_move(
        &mut self,
        card_id: &CardId,
        target: PileId,
    ) -> Result<&SessionSnapshot, StudyServiceError> {
        self.session.drag_move(card_id, target)?;
        self.queue_save();
        Ok(self.session.snapshot())
    }

    /// Persist the current state immediately, cancelling any pending
    /// autosave. Call before dropping the service.
    ///
    /// # Errors
    ///
    /// Returns the underlying `StorageError` if the write fails.
    pub async fn flush(&self) -> Result<(), StorageError> {
        self.autosave.flush(self.session.snapshot()).await
    }

    fn queue_save(&self) {
        self.autosave.schedule(self.session.snapshot().clone());
    }
}

impl fmt::Debug for StudySessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudySessionService")
            .field("session_key", &self.session_key)
            .field("round", &self.session.snapshot().round)
            .field("phase", &self.session.phase())
            .finish_non_exhaustive()
    }
}
