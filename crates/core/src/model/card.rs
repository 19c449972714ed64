use serde::{Deserialize, Serialize};

use crate::model::ids::CardId;

/// A single flashcard.
///
/// `index` is the canonical position of the card within its set, assigned
/// once when the set is created and never mutated afterwards. It is the sole
/// basis for "unshuffled" ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub front: String,
    pub back: String,
    pub index: u32,
}

impl Card {
    #[must_use]
    pub fn new(id: CardId, front: impl Into<String>, back: impl Into<String>, index: u32) -> Self {
        Self {
            id,
            front: front.into(),
            back: back.into(),
            index,
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
