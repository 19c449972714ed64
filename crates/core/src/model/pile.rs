use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::card::Card;
use crate::model::ids::CardId;

//
// ─── PILE IDENTIFIERS ──────────────────────────────────────────────────────────
//

/// The closed set of pile names a card can live in.
///
/// Not every phase uses all four: Assess works with `main`/`know`/`dontKnow`,
/// Learn with `dontKnow`/`discard`, Test with `dontKnow`/`know`/`discard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PileId {
    Main,
    Know,
    DontKnow,
    Discard,
}

impl PileId {
    pub const ALL: [PileId; 4] = [Self::Main, Self::Know, Self::DontKnow, Self::Discard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Know => "know",
            Self::DontKnow => "dontKnow",
            Self::Discard => "discard",
        }
    }
}

impl fmt::Display for PileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a pile name from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePileIdError {
    raw: String,
}

impl fmt::Display for ParsePileIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pile name: {}", self.raw)
    }
}

impl std::error::Error for ParsePileIdError {}

impl FromStr for PileId {
    type Err = ParsePileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "know" => Ok(Self::Know),
            "dontKnow" => Ok(Self::DontKnow),
            "discard" => Ok(Self::Discard),
            _ => Err(ParsePileIdError { raw: s.to_owned() }),
        }
    }
}

//
// ─── PILES ─────────────────────────────────────────────────────────────────────
//

/// The four ordered piles a session distributes its cards over.
///
/// Order within a pile is meaningful: the first element is the active card
/// shown at the top of the stack. Every card in the session belongs to
/// exactly one pile at any instant; the operations below only redistribute,
/// they never create or destroy cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piles {
    main: Vec<Card>,
    know: Vec<Card>,
    dont_know: Vec<Card>,
    discard: Vec<Card>,
}

impl Piles {
    /// Builds piles for a fresh session: the whole deck in `main`, sorted to
    /// canonical `index` order, everything else empty.
    #[must_use]
    pub fn seeded(mut deck: Vec<Card>) -> Self {
        deck.sort_by_key(|card| card.index);
        Self {
            main: deck,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn pile(&self, id: PileId) -> &[Card] {
        match id {
            PileId::Main => &self.main,
            PileId::Know => &self.know,
            PileId::DontKnow => &self.dont_know,
            PileId::Discard => &self.discard,
        }
    }

    pub(crate) fn pile_mut(&mut self, id: PileId) -> &mut Vec<Card> {
        match id {
            PileId::Main => &mut self.main,
            PileId::Know => &mut self.know,
            PileId::DontKnow => &mut self.dont_know,
            PileId::Discard => &mut self.discard,
        }
    }

    /// The active card of a pile, if any.
    #[must_use]
    pub fn front(&self, id: PileId) -> Option<&Card> {
        self.pile(id).first()
    }

    /// Total number of cards across all four piles.
    #[must_use]
    pub fn total_cards(&self) -> usize {
        PileId::ALL.iter().map(|&id| self.pile(id).len()).sum()
    }

    /// Iterates over every card in every pile.
    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.main
            .iter()
            .chain(&self.know)
            .chain(&self.dont_know)
            .chain(&self.discard)
    }

    /// Which pile a card currently lives in.
    #[must_use]
    pub fn find(&self, card_id: &CardId) -> Option<PileId> {
        PileId::ALL
            .into_iter()
            .find(|&id| self.position(id, card_id).is_some())
    }

    pub(crate) fn position(&self, id: PileId, card_id: &CardId) -> Option<usize> {
        self.pile(id).iter().position(|card| &card.id == card_id)
    }

    /// Inserts `card` at the front of `pile`.
    pub fn move_to_front(&mut self, pile: PileId, card: Card) {
        self.pile_mut(pile).insert(0, card);
    }

    /// Sends the active card to the back of its own pile (skip/requeue).
    /// No-op on an empty pile.
    pub fn move_to_back(&mut self, pile: PileId) {
        let cards = self.pile_mut(pile);
        if !cards.is_empty() {
            let card = cards.remove(0);
            cards.push(card);
        }
    }

    /// Removes the card with `card_id` from `from` (at any position) and
    /// prepends it to `to`. No-op if the card is not in `from`.
    pub fn relocate(&mut self, from: PileId, to: PileId, card_id: &CardId) {
        let Some(pos) = self.position(from, card_id) else {
            return;
        };
        let card = self.pile_mut(from).remove(pos);
        self.pile_mut(to).insert(0, card);
    }

    /// Phase-boundary recycling: `dontKnow` becomes `discard ++ dontKnow`
    /// and `discard` is emptied, carrying "still not known" cards forward.
    pub fn merge_discard_into_dont_know(&mut self) {
        let mut recycled = std::mem::take(&mut self.discard);
        recycled.append(&mut self.dont_know);
        self.dont_know = recycled;
    }

    /// Sorts a pile back to canonical `index` order.
    pub fn restore_order(&mut self, pile: PileId) {
        self.pile_mut(pile).sort_by_key(|card| card.index);
    }

    /// Uniform random permutation of a pile (Fisher-Yates via `rand`).
    pub fn shuffle<R: Rng + ?Sized>(&mut self, pile: PileId, rng: &mut R) {
        self.pile_mut(pile).shuffle(rng);
    }

    /// Derived shuffle state: a pile counts as shuffled iff its sequence is
    /// not strictly ascending by `index`. Only relative ordering matters, so
    /// a pile missing cards but still index-ascending is unshuffled.
    #[must_use]
    pub fn is_shuffled(&self, pile: PileId) -> bool {
        !self
            .pile(pile)
            .windows(2)
            .all(|pair| pair[0].index < pair[1].index)
    }

    /// True when `self` and `other` hold the same set of card ids and
    /// neither contains a duplicate. This is the conservation invariant the
    /// session state machine checks after every mutation.
    #[must_use]
    pub fn same_cards(&self, other: &Piles) -> bool {
        let mut ours: Vec<&CardId> = self.iter().map(|card| &card.id).collect();
        let mut theirs: Vec<&CardId> = other.iter().map(|card| &card.id).collect();
        ours.sort();
        theirs.sort();
        ours == theirs && ours.windows(2).all(|pair| pair[0] != pair[1])
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
