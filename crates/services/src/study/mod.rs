mod autosave;
mod progress;
mod service;

// Public API of the study subsystem.
pub use autosave::AutosaveService;
pub use progress::StudyProgress;
pub use service::StudySessionService;
