use study_core::model::Phase;

/// Aggregated view of study progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyProgress {
    pub round: u32,
    pub phase: Phase,
    pub deck_remaining: usize,
    pub known: usize,
    pub unknown: usize,
    pub discarded: usize,
    pub is_complete: bool,
}
