use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::card::Card;
use crate::model::history::HistoryEntry;
use crate::model::ids::CardId;
use crate::model::pile::{PileId, Piles};

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// The study phase, derived from the round counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Assess,
    Learn,
    Test,
}

impl Phase {
    /// Round 0 is Assess, odd rounds are Learn, even non-zero rounds are Test.
    #[must_use]
    pub fn from_round(round: u32) -> Self {
        if round == 0 {
            Self::Assess
        } else if round % 2 == 1 {
            Self::Learn
        } else {
            Self::Test
        }
    }

    /// The pile displayed as "the deck" in this phase.
    #[must_use]
    pub fn deck_pile(self) -> PileId {
        match self {
            Self::Assess => PileId::Main,
            Self::Learn | Self::Test => PileId::DontKnow,
        }
    }
}

//
// ─── SESSION SNAPSHOT ──────────────────────────────────────────────────────────
//

/// The complete externally persisted state of one user's progress through
/// one card set. Sufficient to resume a session exactly where it left off.
///
/// The JSON shape is stable:
/// `{ round, history: [{cardId, from, to}], piles: { main, know, dontKnow, discard } }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub round: u32,
    pub history: Vec<HistoryEntry>,
    pub piles: Piles,
}

impl SessionSnapshot {
    /// A fresh session: round 0, empty history, the full deck in `main` in
    /// canonical order.
    #[must_use]
    pub fn seeded(deck: Vec<Card>) -> Self {
        Self {
            round: 0,
            history: Vec::new(),
            piles: Piles::seeded(deck),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        Phase::from_round(self.round)
    }

    /// Drops the history when any entry references a card id that is not
    /// present in any pile. Loaded snapshots with a corrupt history are
    /// usable without their undo log; the piles stay as loaded.
    ///
    /// Returns true if the history was discarded.
    pub fn sanitize(&mut self) -> bool {
        let known: HashSet<&CardId> = self.piles.iter().map(|card| &card.id).collect();
        let corrupt = self
            .history
            .iter()
            .any(|entry| !known.contains(&entry.card_id));
        if corrupt {
            self.history.clear();
        }
        corrupt
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
