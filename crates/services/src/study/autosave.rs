use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storage::repository::{ProgressRepository, StorageError};
use study_core::model::SessionSnapshot;
use tokio::task::JoinHandle;

const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

//
// ─── AUTOSAVE ──────────────────────────────────────────────────────────────────
//

/// Debounced background persistence for one session.
///
/// Each call to [`schedule`](Self::schedule) replaces any still-pending save,
/// so a burst of actions collapses into a single write once the session goes
/// quiet for the debounce delay. Snapshots identical to the last persisted
/// one are skipped entirely.
///
/// Background save failures are logged and swallowed; the session keeps
/// running and the next state change schedules a fresh attempt.
#[derive(Clone)]
pub struct AutosaveService {
    repo: Arc<dyn ProgressRepository>,
    session_key: String,
    delay: Duration,
    state: Arc<Mutex<AutosaveState>>,
}

#[derive(Default)]
struct AutosaveState {
    pending: Option<JoinHandle<()>>,
    last_saved: Option<u64>,
}

fn digest(snapshot: &SessionSnapshot) -> u64 {
    let mut hasher = DefaultHasher::new();
    snapshot.hash(&mut hasher);
    hasher.finish()
}

impl AutosaveService {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>, session_key: impl Into<String>) -> Self {
        Self {
            repo,
            session_key: session_key.into(),
            delay: DEFAULT_DELAY,
            state: Arc::new(Mutex::new(AutosaveState::default())),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a snapshot for saving after the debounce delay, replacing any
    /// save still waiting. Must be called from within a tokio runtime.
    pub fn schedule(&self, snapshot: SessionSnapshot) {
        let hash = digest(&snapshot);
        let Ok(mut guard) = self.state.lock() else {
            log::warn!("autosave state poisoned for {}", self.session_key);
            return;
        };
        if let Some(handle) = guard.pending.take() {
            handle.abort();
        }
        if guard.last_saved == Some(hash) {
            return;
        }

        let repo = Arc::clone(&self.repo);
        let state = Arc::clone(&self.state);
        let key = self.session_key.clone();
        let delay = self.delay;
        guard.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match repo.save_progress(&key, &snapshot).await {
                Ok(()) => {
                    if let Ok(mut guard) = state.lock() {
                        guard.last_saved = Some(hash);
                        guard.pending = None;
                    }
                }
                Err(err) => log::warn!("autosave for {key} failed: {err}"),
            }
        }));
    }

    /// Cancel any pending save and persist the given snapshot right away,
    /// unless it already matches the last saved state. Used on shutdown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the immediate save fails.
    pub async fn flush(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let hash = digest(snapshot);
        {
            let mut guard = self
                .state
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            if let Some(handle) = guard.pending.take() {
                handle.abort();
            }
            if guard.last_saved == Some(hash) {
                return Ok(());
            }
        }

        self.repo.save_progress(&self.session_key, snapshot).await?;

        let mut guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.last_saved = Some(hash);
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
