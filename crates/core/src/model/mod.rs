mod card;
mod history;
mod ids;
mod pile;
mod snapshot;

pub use card::Card;
pub use history::HistoryEntry;
pub use ids::CardId;
pub use pile::{ParsePileIdError, PileId, Piles};
pub use snapshot::{Phase, SessionSnapshot};
