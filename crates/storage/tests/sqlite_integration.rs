use storage::repository::{CardSet, ProgressRepository, SetRepository, StorageError};
use storage::sqlite::SqliteRepository;
use study_core::StudySession;
use study_core::model::{Card, CardId, SessionSnapshot};

fn build_set(id: &str, count: u32) -> CardSet {
    let cards = (0..count)
        .map(|n| {
            Card::new(
                CardId::new(format!("{id}-card-{n}")),
                format!("Front {n}"),
                format!("Back {n}"),
                n,
            )
        })
        .collect();
    CardSet::new(id, format!("Set {id}"), cards)
}

#[tokio::test]
async fn sqlite_roundtrip_persists_sets_in_canonical_order() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_sets?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let set = build_set("verbs", 4);
    repo.upsert_set(&set).await.unwrap();

    let fetched = repo.get_set("verbs").await.expect("fetch");
    assert_eq!(fetched, set);

    assert!(matches!(
        repo.get_set("missing").await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_upsert_replaces_card_list_wholesale() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_replace?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.upsert_set(&build_set("nouns", 5)).await.unwrap();

    let smaller = build_set("nouns", 2);
    repo.upsert_set(&smaller).await.unwrap();

    let fetched = repo.get_set("nouns").await.expect("fetch");
    assert_eq!(fetched.cards.len(), 2);
    assert_eq!(fetched, smaller);
}

#[tokio::test]
async fn sqlite_progress_roundtrip_preserves_snapshot_exactly() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.load_progress("u1:verbs").await.unwrap(), None);

    // Produce a mid-session snapshot with history entries and split piles.
    let mut session = StudySession::seeded(build_set("verbs", 3).cards);
    session.mark_known().unwrap();
    session.mark_unknown().unwrap();
    session.skip().unwrap();
    let snapshot = session.snapshot().clone();

    repo.save_progress("u1:verbs", &snapshot).await.unwrap();
    let loaded = repo.load_progress("u1:verbs").await.unwrap();
    assert_eq!(loaded, Some(snapshot.clone()));

    // Overwrite with a later state and read it back.
    session.undo().unwrap();
    let later = session.snapshot().clone();
    repo.save_progress("u1:verbs", &later).await.unwrap();
    assert_eq!(repo.load_progress("u1:verbs").await.unwrap(), Some(later));
}

#[tokio::test]
async fn sqlite_delete_progress_is_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_delete?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let snapshot = SessionSnapshot::seeded(build_set("s", 1).cards);
    repo.save_progress("u1:s", &snapshot).await.unwrap();
    repo.delete_progress("u1:s").await.unwrap();
    assert_eq!(repo.load_progress("u1:s").await.unwrap(), None);

    repo.delete_progress("u1:s").await.unwrap();
}
