use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use services::{AutosaveService, StudyServiceError, StudySessionService};
use storage::repository::{
    CardSet, InMemoryRepository, ProgressRepository, SetRepository, Storage, StorageError,
};
use study_core::model::{Card, CardId, HistoryEntry, Phase, PileId, SessionSnapshot};

fn build_set(id: &str, count: u32) -> CardSet {
    let cards = (0..count)
        .map(|n| {
            Card::new(
                CardId::new(format!("card-{n}")),
                format!("Front {n}"),
                format!("Back {n}"),
                n,
            )
        })
        .collect();
    CardSet::new(id, format!("Set {id}"), cards)
}

async fn storage_with_set(id: &str, count: u32) -> Storage {
    let storage = Storage::in_memory();
    storage.sets.upsert_set(&build_set(id, count)).await.unwrap();
    storage
}

#[tokio::test]
async fn open_seeds_then_resumes_after_flush() {
    let storage = storage_with_set("verbs", 3).await;

    let mut service = StudySessionService::open(&storage, "verbs", "u1:verbs")
        .await
        .unwrap();
    assert_eq!(service.phase(), Phase::Assess);
    assert_eq!(service.progress().deck_remaining, 3);

    service.mark_known().unwrap();
    service.mark_unknown().unwrap();
    service.flush().await.unwrap();
    let saved = service.snapshot().clone();

    let resumed = StudySessionService::open(&storage, "verbs", "u1:verbs")
        .await
        .unwrap();
    assert_eq!(resumed.snapshot(), &saved);
    assert_eq!(resumed.progress().known, 1);
    assert_eq!(resumed.progress().unknown, 1);
}

#[tokio::test]
async fn full_walk_reaches_completion() {
    let storage = storage_with_set("verbs", 2).await;
    let mut service = StudySessionService::open(&storage, "verbs", "u1:verbs")
        .await
        .unwrap();

    // Assess: nothing is known yet.
    service.mark_unknown().unwrap();
    service.mark_unknown().unwrap();
    service.advance_round().unwrap();
    assert_eq!(service.phase(), Phase::Learn);

    // Learn: read both cards through.
    service.skip().unwrap();
    service.skip().unwrap();
    service.advance_round().unwrap();
    assert_eq!(service.phase(), Phase::Test);

    // Test: both are now known.
    service.mark_known().unwrap();
    service.mark_known().unwrap();
    assert!(service.is_complete());
    assert_eq!(service.progress().known, 2);
}

#[tokio::test]
async fn open_drops_history_that_references_missing_cards() {
    let storage = storage_with_set("verbs", 2).await;

    let mut snapshot = SessionSnapshot::seeded(build_set("verbs", 2).cards);
    snapshot.history.push(HistoryEntry::new(
        CardId::new("ghost"),
        PileId::Main,
        PileId::Know,
    ));
    storage
        .progress
        .save_progress("u1:verbs", &snapshot)
        .await
        .unwrap();

    let service = StudySessionService::open(&storage, "verbs", "u1:verbs")
        .await
        .unwrap();
    assert!(service.snapshot().history.is_empty());
    assert_eq!(service.snapshot().piles.total_cards(), 2);
}

#[tokio::test]
async fn open_rejects_empty_and_missing_sets() {
    let storage = storage_with_set("empty", 0).await;

    let err = StudySessionService::open(&storage, "empty", "u1:empty")
        .await
        .unwrap_err();
    assert!(matches!(err, StudyServiceError::EmptyDeck(_)));

    let err = StudySessionService::open(&storage, "missing", "u1:missing")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StudyServiceError::Storage(StorageError::NotFound)
    ));
}

/// Progress repository that counts writes, for observing debounce behavior.
#[derive(Clone)]
struct CountingProgressRepo {
    inner: InMemoryRepository,
    saves: Arc<AtomicUsize>,
}

#[async_trait]
impl ProgressRepository for CountingProgressRepo {
    async fn load_progress(
        &self,
        session_key: &str,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        self.inner.load_progress(session_key).await
    }

    async fn save_progress(
        &self,
        session_key: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_progress(session_key, snapshot).await
    }

    async fn delete_progress(&self, session_key: &str) -> Result<(), StorageError> {
        self.inner.delete_progress(session_key).await
    }
}

#[tokio::test]
async fn rapid_actions_collapse_into_one_save() {
    let saves = Arc::new(AtomicUsize::new(0));
    let counting = CountingProgressRepo {
        inner: InMemoryRepository::new(),
        saves: Arc::clone(&saves),
    };
    let storage = Storage {
        sets: Arc::new(InMemoryRepository::new()),
        progress: Arc::new(counting.clone()),
    };
    storage.sets.upsert_set(&build_set("verbs", 4)).await.unwrap();

    let autosave = AutosaveService::new(storage.progress.clone(), "u1:verbs")
        .with_delay(Duration::from_millis(20));
    let mut service = StudySessionService::open(&storage, "verbs", "u1:verbs")
        .await
        .unwrap()
        .with_autosave(autosave);

    service.mark_known().unwrap();
    service.mark_unknown().unwrap();
    service.skip().unwrap();
    let latest = service.snapshot().clone();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(saves.load(Ordering::SeqCst), 1);
    assert_eq!(
        counting.load_progress("u1:verbs").await.unwrap(),
        Some(latest.clone())
    );

    // Flushing an already-saved state does not write again.
    service.flush().await.unwrap();
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}
