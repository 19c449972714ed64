#![forbid(unsafe_code)]

pub mod error;
pub mod study;

pub use error::StudyServiceError;
pub use study::{AutosaveService, StudyProgress, StudySessionService};
