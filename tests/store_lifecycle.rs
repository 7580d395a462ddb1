//! On-disk behavior: migrations from older files and durability across restarts.

use rusqlite::{params, Connection};
use std::path::Path;
use tasklist::storage::{schema_version, ItemFilter, Store, CURRENT_SCHEMA_VERSION};
use tasklist::{Category, ItemId, MutationService, TaskListError};

fn write_v1_database(path: &Path, rows: &[(&str, bool, i64)]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "
        CREATE TABLE todo_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            text TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            createdAt INTEGER NOT NULL
        );
        PRAGMA user_version = 1;
        ",
    )
    .unwrap();
    for (text, completed, created_at) in rows {
        conn.execute(
            "INSERT INTO todo_items (text, completed, createdAt) VALUES (?1, ?2, ?3)",
            params![text, completed, created_at],
        )
        .unwrap();
    }
}

fn texts(store: &Store) -> Vec<String> {
    store
        .query_items(&ItemFilter::ALL)
        .unwrap()
        .value
        .into_iter()
        .map(|item| item.text)
        .collect()
}

#[test]
fn v1_file_migrates_oldest_first_as_personal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    // Inserted out of creation order so physical order differs from age.
    write_v1_database(
        &path,
        &[("middle", false, 200), ("newest", true, 300), ("oldest", false, 100)],
    );

    let store = Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap();
    assert_eq!(store.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);

    let items = store.query_items(&ItemFilter::ALL).unwrap().value;
    let summary: Vec<_> = items
        .iter()
        .map(|i| (i.text.as_str(), i.sort_order, i.category, i.completed))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("oldest", 0, Category::Personal, false),
            ("middle", 1, Category::Personal, false),
            ("newest", 2, Category::Personal, true),
        ]
    );
}

#[test]
fn migration_keeps_ids_and_accepts_new_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    write_v1_database(&path, &[("a", false, 10), ("b", false, 10)]);

    let store = Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap();
    let service = MutationService::new(store.clone());
    let added = service.insert("c", Category::Work).unwrap();

    assert_eq!(added.sort_order, 2);
    let ids: Vec<ItemId> = store
        .query_items(&ItemFilter::ALL)
        .unwrap()
        .value
        .iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, vec![ItemId(1), ItemId(2), added.id]);
}

#[test]
fn newer_file_is_rejected_without_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 9;").unwrap();
    }

    let err = Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        TaskListError::UnsupportedSchemaVersion { found: 9, .. }
    ));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 9);
}

#[test]
fn committed_writes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    {
        let service = MutationService::new(Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap());
        let a = service.insert("alpha", Category::Work).unwrap();
        let b = service.insert("beta", Category::Health).unwrap();
        let c = service.insert("gamma", Category::Other).unwrap();
        service.toggle_completed(b.id).unwrap();
        service.reorder(&[c.id, a.id, b.id]).unwrap();
    }

    let store = Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap();
    assert_eq!(texts(&store), vec!["gamma", "alpha", "beta"]);
    let done = store.query_items(&ItemFilter::status(true)).unwrap().value;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].text, "beta");
    assert_eq!(done[0].category, Category::Health);
}

#[test]
fn pending_delete_reappears_after_crash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let pending = {
        let service = MutationService::new(Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap());
        service.insert("keep", Category::Personal).unwrap();
        let doomed = service.insert("maybe", Category::Personal).unwrap();
        service.delete_pending(doomed.id).unwrap();
        assert_eq!(texts(service.store()), vec!["keep"]);
        doomed
        // Process "crashes" here: the undo window never elapsed.
    };

    let store = Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap();
    assert!(store.pending_ids().unwrap().is_empty());
    let restored = store.get(pending.id).unwrap().unwrap();
    assert_eq!(restored.sort_order, pending.sort_order);
    assert_eq!(texts(&store), vec!["keep", "maybe"]);
}

#[test]
fn committed_delete_is_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    {
        let service = MutationService::new(Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap());
        let gone = service.insert("gone", Category::Shopping).unwrap();
        service.insert("stays", Category::Shopping).unwrap();
        service.delete_pending(gone.id).unwrap();
        assert!(service.commit_delete(gone.id).unwrap());
    }

    let store = Store::open(&path, CURRENT_SCHEMA_VERSION).unwrap();
    assert_eq!(texts(&store), vec!["stays"]);
}
