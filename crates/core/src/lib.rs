#![forbid(unsafe_code)]

pub mod model;
pub mod session;

pub use session::{SessionStateError, StudySession};
