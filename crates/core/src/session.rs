use rand::Rng;
use thiserror::Error;

use crate::model::{Card, CardId, HistoryEntry, Phase, PileId, SessionSnapshot};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("card {0} is not present in any pile")]
    UnknownCard(CardId),

    #[error("operation would violate card conservation; state was rolled back")]
    InvariantViolation,
}

//
// ─── STUDY SESSION ─────────────────────────────────────────────────────────────
//

/// The study-session state machine.
///
/// Owns one [`SessionSnapshot`] and is the only legal way to mutate it. Each
/// public method is a synchronous transaction: validate preconditions, move
/// cards between piles, conditionally append a history entry, and hand back
/// the new snapshot. User-triggered actions on an empty pile are expected,
/// so those are silent no-ops rather than errors.
///
/// A conservation guard runs after every mutation: if the set of card ids
/// changed or a duplicate appeared, the mutation is rolled back and the
/// prior snapshot retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySession {
    snapshot: SessionSnapshot,
}

impl StudySession {
    #[must_use]
    pub fn new(snapshot: SessionSnapshot) -> Self {
        Self { snapshot }
    }

    /// Starts a fresh session over the given deck.
    #[must_use]
    pub fn seeded(deck: Vec<Card>) -> Self {
        Self::new(SessionSnapshot::seeded(deck))
    }

    #[must_use]
    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.snapshot.phase()
    }

    /// The card currently shown face-up on top of the deck pile.
    #[must_use]
    pub fn active_card(&self) -> Option<&Card> {
        self.snapshot.piles.front(self.phase().deck_pile())
    }

    /// Derived shuffle state of the deck pile.
    #[must_use]
    pub fn is_shuffled(&self) -> bool {
        self.snapshot.piles.is_shuffled(self.phase().deck_pile())
    }

    /// The session is finished once the Test phase runs out of cards in both
    /// the active and discard piles.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase() == Phase::Test
            && self.snapshot.piles.pile(PileId::DontKnow).is_empty()
            && self.snapshot.piles.pile(PileId::Discard).is_empty()
    }

    fn apply<F>(&mut self, f: F) -> Result<&SessionSnapshot, SessionStateError>
    where
        F: FnOnce(&mut SessionSnapshot),
    {
        let before = self.snapshot.clone();
        f(&mut self.snapshot);
        if self.snapshot.piles.same_cards(&before.piles) {
            Ok(&self.snapshot)
        } else {
            self.snapshot = before;
            Err(SessionStateError::InvariantViolation)
        }
    }

    fn active_card_id(&self) -> Option<CardId> {
        self.active_card().map(|card| card.id.clone())
    }

    /// Sends the active card away without grading it.
    ///
    /// In Assess this requeues the card to the back of `main` and logs a
    /// `main -> main` self-entry; in Learn and Test it is the "next" action,
    /// a real move from `dontKnow` to `discard`. Empty deck pile: no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvariantViolation` if the mutation would
    /// lose or duplicate a card (the state is rolled back).
    pub fn skip(&mut self) -> Result<&SessionSnapshot, SessionStateError> {
        let Some(card_id) = self.active_card_id() else {
            return Ok(&self.snapshot);
        };
        match self.phase() {
            Phase::Assess => self.apply(|s| {
                s.piles.move_to_back(PileId::Main);
                s.history
                    .push(HistoryEntry::new(card_id, PileId::Main, PileId::Main));
            }),
            Phase::Learn | Phase::Test => self.apply(|s| {
                s.piles.relocate(PileId::DontKnow, PileId::Discard, &card_id);
                s.history
                    .push(HistoryEntry::new(card_id, PileId::DontKnow, PileId::Discard));
            }),
        }
    }

    /// Marks the active card as known.
    ///
    /// Assess moves it `main -> know`, Test moves it `dontKnow -> know`.
    /// Learn has no know pile, so this is a no-op there.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvariantViolation` on a conservation
    /// failure (the state is rolled back).
    pub fn mark_known(&mut self) -> Result<&SessionSnapshot, SessionStateError> {
        let Some(card_id) = self.active_card_id() else {
            return Ok(&self.snapshot);
        };
        let from = match self.phase() {
            Phase::Assess => PileId::Main,
            Phase::Test => PileId::DontKnow,
            Phase::Learn => return Ok(&self.snapshot),
        };
        self.apply(|s| {
            s.piles.relocate(from, PileId::Know, &card_id);
            s.history.push(HistoryEntry::new(card_id, from, PileId::Know));
        })
    }

    /// Marks the active card as still unknown (Assess only: `main -> dontKnow`).
    ///
    /// Learn and Test already study the unknown pile, so this is a no-op
    /// outside Assess.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvariantViolation` on a conservation
    /// failure (the state is rolled back).
    pub fn mark_unknown(&mut self) -> Result<&SessionSnapshot, SessionStateError> {
        if self.phase() != Phase::Assess {
            return Ok(&self.snapshot);
        }
        let Some(card_id) = self.active_card_id() else {
            return Ok(&self.snapshot);
        };
        self.apply(|s| {
            s.piles.relocate(PileId::Main, PileId::DontKnow, &card_id);
            s.history
                .push(HistoryEntry::new(card_id, PileId::Main, PileId::DontKnow));
        })
    }

    /// Reverses the most recent logged move and pops it from the history.
    ///
    /// A requeue entry (`from == to`) is undone by pulling the pile's last
    /// card back to the front. Anything else removes the card from its `to`
    /// pile and prepends it to `from`. Empty history: no-op. There is no
    /// redo stack; a new action after undo simply appends a forward entry.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::UnknownCard` if the entry references a
    /// card that is no longer in its recorded pile (corrupt state; the entry
    /// is kept and nothing moves).
    pub fn undo(&mut self) -> Result<&SessionSnapshot, SessionStateError> {
        let Some(entry) = self.snapshot.history.last().cloned() else {
            return Ok(&self.snapshot);
        };
        if entry.is_requeue() {
            self.apply(|s| {
                let pile = s.piles.pile_mut(entry.from);
                if let Some(card) = pile.pop() {
                    pile.insert(0, card);
                }
                s.history.pop();
            })
        } else {
            if self.snapshot.piles.position(entry.to, &entry.card_id).is_none() {
                return Err(SessionStateError::UnknownCard(entry.card_id));
            }
            self.apply(|s| {
                s.piles.relocate(entry.to, entry.from, &entry.card_id);
                s.history.pop();
            })
        }
    }

    /// Shuffles the deck pile, or restores canonical order if it is already
    /// shuffled. Never logged to history: undo cannot reverse a shuffle, and
    /// the toggle acts as a view preference.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvariantViolation` on a conservation
    /// failure (the state is rolled back).
    pub fn toggle_shuffle<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<&SessionSnapshot, SessionStateError> {
        let deck = self.phase().deck_pile();
        if self.snapshot.piles.is_shuffled(deck) {
            self.apply(|s| s.piles.restore_order(deck))
        } else {
            self.apply(|s| s.piles.shuffle(deck, rng))
        }
    }

    /// Moves to the next round, recycling piles at the phase boundary.
    ///
    /// No-op while the deck pile still has cards, and no-op once the session
    /// is complete. On entry into a Test round the history is cleared, so
    /// undo never crosses a phase boundary. On entry into any round above 1
    /// the discard pile is prepended back into `dontKnow`, carrying forward
    /// the cards that are still not known.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvariantViolation` on a conservation
    /// failure (the state is rolled back).
    pub fn advance_round(&mut self) -> Result<&SessionSnapshot, SessionStateError> {
        if self.is_complete() {
            return Ok(&self.snapshot);
        }
        let deck = self.phase().deck_pile();
        if !self.snapshot.piles.pile(deck).is_empty() {
            return Ok(&self.snapshot);
        }
        self.apply(|s| {
            s.round += 1;
            if s.round % 2 == 0 {
                s.history.clear();
            }
            if s.round > 1 {
                s.piles.merge_discard_into_dont_know();
            }
        })
    }

    /// Restarts the current pass: recombines `discard` into `dontKnow` and,
    /// unless the deck pile was shuffled, restores canonical order. Leaves
    /// `round` and `history` alone. No-op in Assess, which has no done pile.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvariantViolation` on a conservation
    /// failure (the state is rolled back).
    pub fn restart(&mut self) -> Result<&SessionSnapshot, SessionStateError> {
        if self.phase() == Phase::Assess {
            return Ok(&self.snapshot);
        }
        let keep_shuffled = self.snapshot.piles.is_shuffled(PileId::DontKnow);
        self.apply(|s| {
            s.piles.merge_discard_into_dont_know();
            if !keep_shuffled {
                s.piles.restore_order(PileId::DontKnow);
            }
        })
    }

    /// Drops a dragged card onto a pile.
    ///
    /// Cross-pile drops behave like a relocate and are logged; a drop back
    /// onto the source pile only raises the card to the front of its own
    /// pile and is treated as a view-only reorder, without a history entry.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::UnknownCard` if `card_id` is in no pile
    /// (the snapshot is untouched), or `InvariantViolation` on a
    /// conservation failure.
    pub fn drag_move(
        &mut self,
        card_id: &CardId,
        target: PileId,
    ) -> Result<&SessionSnapshot, SessionStateError> {
        let Some(source) = self.snapshot.piles.find(card_id) else {
            return Err(SessionStateError::UnknownCard(card_id.clone()));
        };
        let card_id = card_id.clone();
        if source == target {
            self.apply(move |s| {
                if let Some(pos) = s.piles.position(source, &card_id) {
                    let card = s.piles.pile_mut(source).remove(pos);
                    s.piles.move_to_front(source, card);
                }
            })
        } else {
            self.apply(move |s| {
                s.piles.relocate(source, target, &card_id);
                s.history.push(HistoryEntry::new(card_id, source, target));
            })
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn card(n: u32) -> Card {
        Card::new(CardId::new(format!("card-{n}")), format!("F{n}"), format!("B{n}"), n)
    }

    fn session(n: u32) -> StudySession {
        StudySession::seeded((0..n).map(card).collect())
    }

    fn ids(session: &StudySession, pile: PileId) -> Vec<String> {
        session
            .snapshot()
            .piles
            .pile(pile)
            .iter()
            .map(|c| c.id.to_string())
            .collect()
    }

    /// Drives an Assess deck of `n` cards entirely into `dontKnow`, then
    /// advances into the Learn phase.
    fn learn_session(n: u32) -> StudySession {
        let mut s = session(n);
        for _ in 0..n {
            s.mark_unknown().unwrap();
        }
        s.advance_round().unwrap();
        s
    }

    #[test]
    fn assess_marks_move_cards_in_reverse_arrival_order() {
        let mut s = session(3);
        s.mark_unknown().unwrap();
        s.mark_unknown().unwrap();
        s.mark_unknown().unwrap();

        assert!(ids(&s, PileId::Main).is_empty());
        assert_eq!(ids(&s, PileId::DontKnow), vec!["card-2", "card-1", "card-0"]);
        assert_eq!(s.snapshot().history.len(), 3);

        s.undo().unwrap();
        assert_eq!(ids(&s, PileId::Main), vec!["card-2"]);
        assert_eq!(ids(&s, PileId::DontKnow), vec!["card-1", "card-0"]);
        assert_eq!(s.snapshot().history.len(), 2);
    }

    #[test]
    fn assess_skip_requeues_and_logs_self_entry() {
        let mut s = session(3);
        s.skip().unwrap();
        assert_eq!(ids(&s, PileId::Main), vec!["card-1", "card-2", "card-0"]);
        let entry = s.snapshot().history.last().unwrap();
        assert!(entry.is_requeue());
        assert_eq!(entry.from, PileId::Main);

        s.undo().unwrap();
        assert_eq!(ids(&s, PileId::Main), vec!["card-0", "card-1", "card-2"]);
        assert!(s.snapshot().history.is_empty());
    }

    #[test]
    fn every_action_is_inverted_exactly_by_undo() {
        let mut s = session(4);
        s.mark_known().unwrap();
        s.skip().unwrap();

        let before = s.snapshot().clone();
        let history_len = before.history.len();

        s.mark_unknown().unwrap();
        s.undo().unwrap();
        assert_eq!(s.snapshot().piles, before.piles);
        assert_eq!(s.snapshot().history.len(), history_len);

        s.skip().unwrap();
        s.undo().unwrap();
        assert_eq!(s.snapshot().piles, before.piles);

        s.mark_known().unwrap();
        s.undo().unwrap();
        assert_eq!(s.snapshot().piles, before.piles);
    }

    #[test]
    fn undo_on_empty_history_is_noop() {
        let mut s = session(2);
        let before = s.snapshot().clone();
        s.undo().unwrap();
        assert_eq!(s.snapshot(), &before);
    }

    #[test]
    fn conservation_holds_over_mixed_sequences() {
        let mut s = session(5);
        s.mark_known().unwrap();
        s.skip().unwrap();
        s.mark_unknown().unwrap();
        s.drag_move(&CardId::new("card-4"), PileId::Know).unwrap();
        s.undo().unwrap();
        s.skip().unwrap();

        let snapshot = s.snapshot();
        assert_eq!(snapshot.piles.total_cards(), 5);
        let mut all: Vec<&str> = snapshot.piles.iter().map(|c| c.id.as_str()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn learn_skip_discards_and_restart_restores_canonical_order() {
        let mut s = learn_session(2);
        assert_eq!(s.phase(), Phase::Learn);
        assert_eq!(ids(&s, PileId::DontKnow), vec!["card-1", "card-0"]);

        s.skip().unwrap();
        s.skip().unwrap();
        assert!(ids(&s, PileId::DontKnow).is_empty());
        assert_eq!(ids(&s, PileId::Discard), vec!["card-0", "card-1"]);

        s.restart().unwrap();
        assert_eq!(ids(&s, PileId::DontKnow), vec!["card-0", "card-1"]);
        assert!(ids(&s, PileId::Discard).is_empty());
    }

    #[test]
    fn restart_keeps_order_when_deck_is_shuffled() {
        let mut s = learn_session(5);
        let mut rng = StdRng::seed_from_u64(11);
        while !s.is_shuffled() {
            s.toggle_shuffle(&mut rng).unwrap();
        }
        s.skip().unwrap();
        let discarded = ids(&s, PileId::Discard);
        let remaining = ids(&s, PileId::DontKnow);

        s.restart().unwrap();
        let expected: Vec<String> = discarded.into_iter().chain(remaining).collect();
        assert_eq!(ids(&s, PileId::DontKnow), expected);
    }

    #[test]
    fn restart_does_not_touch_round_or_history() {
        let mut s = learn_session(3);
        s.skip().unwrap();
        let round = s.snapshot().round;
        let history_len = s.snapshot().history.len();
        s.restart().unwrap();
        assert_eq!(s.snapshot().round, round);
        assert_eq!(s.snapshot().history.len(), history_len);
    }

    #[test]
    fn restart_in_assess_is_noop() {
        let mut s = session(3);
        s.mark_known().unwrap();
        let before = s.snapshot().clone();
        s.restart().unwrap();
        assert_eq!(s.snapshot(), &before);
    }

    #[test]
    fn advance_requires_empty_deck_pile() {
        let mut s = session(2);
        s.advance_round().unwrap();
        assert_eq!(s.snapshot().round, 0);

        s.mark_known().unwrap();
        s.mark_unknown().unwrap();
        s.advance_round().unwrap();
        assert_eq!(s.snapshot().round, 1);
        assert_eq!(s.phase(), Phase::Learn);
    }

    #[test]
    fn entering_test_recycles_discard_and_clears_history() {
        let mut s = learn_session(3);
        // dontKnow arrived as [card-2, card-1, card-0]; discard them in that order.
        s.skip().unwrap();
        s.skip().unwrap();
        s.skip().unwrap();
        assert_eq!(ids(&s, PileId::Discard), vec!["card-0", "card-1", "card-2"]);
        assert!(!s.snapshot().history.is_empty());

        s.advance_round().unwrap();
        assert_eq!(s.phase(), Phase::Test);
        assert_eq!(ids(&s, PileId::DontKnow), vec!["card-0", "card-1", "card-2"]);
        assert!(ids(&s, PileId::Discard).is_empty());
        assert!(s.snapshot().history.is_empty());
    }

    #[test]
    fn recycling_preserves_discard_order_not_canonical() {
        let mut s = learn_session(3);
        // Discard out of canonical order: requeue by dragging before skipping.
        s.drag_move(&CardId::new("card-0"), PileId::Discard).unwrap();
        s.drag_move(&CardId::new("card-2"), PileId::Discard).unwrap();
        s.drag_move(&CardId::new("card-1"), PileId::Discard).unwrap();
        assert_eq!(ids(&s, PileId::Discard), vec!["card-1", "card-2", "card-0"]);

        s.advance_round().unwrap();
        assert_eq!(ids(&s, PileId::DontKnow), vec!["card-1", "card-2", "card-0"]);
    }

    #[test]
    fn test_phase_completes_when_everything_is_known() {
        let mut s = learn_session(2);
        s.skip().unwrap();
        s.skip().unwrap();
        s.advance_round().unwrap();
        assert_eq!(s.phase(), Phase::Test);

        s.mark_known().unwrap();
        assert!(!s.is_complete());
        s.mark_known().unwrap();
        assert!(s.is_complete());

        // Once complete, advancing is a no-op.
        let round = s.snapshot().round;
        s.advance_round().unwrap();
        assert_eq!(s.snapshot().round, round);
    }

    #[test]
    fn test_phase_loops_back_into_learn_with_leftovers() {
        let mut s = learn_session(2);
        s.skip().unwrap();
        s.skip().unwrap();
        s.advance_round().unwrap();

        // Know one, miss one.
        s.mark_known().unwrap();
        s.skip().unwrap();
        assert!(!s.is_complete());

        s.advance_round().unwrap();
        assert_eq!(s.phase(), Phase::Learn);
        assert_eq!(s.snapshot().piles.pile(PileId::DontKnow).len(), 1);
        assert!(s.snapshot().piles.pile(PileId::Discard).is_empty());
    }

    #[test]
    fn toggle_shuffle_round_trips_and_stays_unlogged() {
        let mut s = session(6);
        let original = ids(&s, PileId::Main);
        let mut rng = StdRng::seed_from_u64(42);

        s.toggle_shuffle(&mut rng).unwrap();
        s.toggle_shuffle(&mut rng).unwrap();
        assert_eq!(ids(&s, PileId::Main), original);
        assert!(s.snapshot().history.is_empty());
    }

    #[test]
    fn drag_to_other_pile_logs_drag_to_same_pile_does_not() {
        let mut s = session(3);

        s.drag_move(&CardId::new("card-1"), PileId::Know).unwrap();
        assert_eq!(ids(&s, PileId::Know), vec!["card-1"]);
        assert_eq!(s.snapshot().history.len(), 1);

        s.drag_move(&CardId::new("card-2"), PileId::Main).unwrap();
        assert_eq!(ids(&s, PileId::Main), vec!["card-2", "card-0"]);
        assert_eq!(s.snapshot().history.len(), 1);
    }

    #[test]
    fn drag_of_unknown_card_is_rejected() {
        let mut s = session(2);
        let before = s.snapshot().clone();
        let err = s.drag_move(&CardId::new("ghost"), PileId::Know).unwrap_err();
        assert!(matches!(err, SessionStateError::UnknownCard(_)));
        assert_eq!(s.snapshot(), &before);
    }

    #[test]
    fn skip_on_empty_deck_pile_is_noop() {
        let mut s = session(1);
        s.mark_known().unwrap();
        let before = s.snapshot().clone();
        s.skip().unwrap();
        s.mark_known().unwrap();
        s.mark_unknown().unwrap();
        assert_eq!(s.snapshot(), &before);
    }

    #[test]
    fn corrupt_undo_entry_is_rejected_without_popping() {
        let mut s = session(2);
        s.mark_known().unwrap();
        // Simulate corruption: rebuild the session with a history entry whose
        // card was dragged somewhere the entry does not expect.
        s.drag_move(&CardId::new("card-0"), PileId::Discard).unwrap();
        s.drag_move(&CardId::new("card-0"), PileId::DontKnow).unwrap();
        // History now ends with discard -> dontKnow; force a mismatch by
        // moving the card away without logging (same-pile drag then a crafted
        // snapshot edit is not possible from outside, so exercise the guard
        // through a snapshot with a stale entry).
        let mut snapshot = s.snapshot().clone();
        snapshot.history.push(HistoryEntry::new(
            CardId::new("card-1"),
            PileId::Main,
            PileId::Discard,
        ));
        let mut stale = StudySession::new(snapshot);
        let err = stale.undo().unwrap_err();
        assert!(matches!(err, SessionStateError::UnknownCard(_)));
        assert_eq!(stale.snapshot().history.len(), 4);
    }
}
