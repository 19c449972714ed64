use serde::{Deserialize, Serialize};

use crate::model::ids::CardId;
use crate::model::pile::PileId;

/// One recorded move within the current phase, with enough information to
/// reverse it.
///
/// A self-transition (`from == to`) represents a skip: the active card was
/// sent to the back of its own pile rather than relocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub card_id: CardId,
    pub from: PileId,
    pub to: PileId,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(card_id: CardId, from: PileId, to: PileId) -> Self {
        Self { card_id, from, to }
    }

    /// True for skip entries that requeued a card within its own pile.
    #[must_use]
    pub fn is_requeue(&self) -> bool {
        self.from == self.to
    }
}
