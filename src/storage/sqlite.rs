//! SQLite-backed item store.
//!
//! [`Store`] is the process-scoped handle to the database. It is created once at
//! startup with [`Store::open`] and passed explicitly to the query layer and the
//! mutation service; clones share the same connection.
//!
//! # Consistency
//!
//! A single connection sits behind a mutex. Every write runs inside one transaction
//! while holding the lock and bumps the store revision before releasing it; reads take
//! the same lock, so a read issued after a write returns always sees that write, and
//! the revision attached to a [`Snapshot`] describes exactly the data it carries.
//!
//! Commit listeners are invoked after the lock is released. They must not block.
//!
//! # Pending deletes
//!
//! Items waiting out their undo window are listed in the connection-local
//! `temp.pending_deletes` table. Every read path excludes them; the row itself stays on
//! disk until the delete is committed, so nothing is lost if the process dies inside
//! the window.

use crate::domain::error::{Result, TaskListError};
use crate::domain::{Category, Item, ItemId, NewItem};
use crate::storage::filter::ItemFilter;
use crate::storage::schema;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A value read from the store together with the revision it reflects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// Number of committed writes when the value was read.
    pub revision: u64,
    pub value: T,
}

/// Handle returned by [`Store::on_commit`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type CommitListener = Arc<dyn Fn(u64) + Send + Sync>;

struct StoreInner {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
    revision: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, CommitListener>>,
    next_listener: AtomicU64,
}

/// Shared handle to the item database.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

const ITEM_COLUMNS: &str = "id, text, completed, category, sortOrder, createdAt";
const ORDER_BY: &str = "ORDER BY sortOrder ASC, createdAt DESC, id DESC";

impl Store {
    /// Opens (or creates) the database at `path` and migrates it to `target_version`.
    ///
    /// Parent directories are created automatically.
    ///
    /// # Errors
    ///
    /// Migration problems are returned as fatal errors
    /// ([`TaskListError::is_fatal`]); the database is never exposed half migrated.
    /// I/O and SQLite failures while opening the file are returned unchanged.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tasklist::storage::{Store, CURRENT_SCHEMA_VERSION};
    ///
    /// let store = Store::open("/tmp/tasks.db", CURRENT_SCHEMA_VERSION)?;
    /// assert_eq!(store.schema_version()?, CURRENT_SCHEMA_VERSION);
    /// # Ok::<(), tasklist::TaskListError>(())
    /// ```
    pub fn open(path: impl AsRef<Path>, target_version: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!(path = ?path, target_version, "opening item store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        Self::init(conn, Some(path), target_version)
    }

    /// Creates a private in-memory database, mainly for tests.
    ///
    /// # Errors
    ///
    /// Same as [`Store::open`].
    pub fn open_in_memory(target_version: u32) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None, target_version)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>, target_version: u32) -> Result<Self> {
        let version = schema::migrate_to(&mut conn, target_version)?;

        conn.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS pending_deletes (id INTEGER PRIMARY KEY NOT NULL);",
        )?;

        tracing::debug!(version, "item store ready");

        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                conn: Mutex::new(conn),
                revision: AtomicU64::new(0),
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(1),
            }),
        })
    }

    /// Location of the database file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Schema version recorded in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection lock is poisoned or the pragma fails.
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.lock()?;
        schema::schema_version(&conn)
    }

    /// Number of writes committed through this handle.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner
            .conn
            .lock()
            .map_err(|e| TaskListError::Storage(format!("connection lock poisoned: {e}")))
    }

    /// Runs `f` against a consistent view of the database.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a storage error if the lock is poisoned.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<Snapshot<T>> {
        let conn = self.lock()?;
        let revision = self.revision();
        let value = f(&conn)?;
        drop(conn);
        Ok(Snapshot { revision, value })
    }

    /// Runs `f` inside a write transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`; otherwise it rolls back and
    /// nothing becomes visible. Commit listeners are notified after the lock is released.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or the SQLite error from begin/commit.
    pub fn write<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let _span = tracing::debug_span!("store_write", operation).entered();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        let revision = self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1;
        drop(conn);

        tracing::debug!(revision, "write committed");
        self.notify(revision);
        Ok(value)
    }

    /// Registers a callback invoked with the new revision after every commit.
    pub fn on_commit(&self, listener: impl Fn(u64) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.insert(id, Arc::new(listener));
        }
        id
    }

    /// Removes a listener registered with [`Store::on_commit`].
    pub fn remove_listener(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.remove(&id);
        }
    }

    fn notify(&self, revision: u64) {
        let listeners: Vec<CommitListener> = match self.inner.listeners.lock() {
            Ok(listeners) => listeners.values().cloned().collect(),
            Err(e) => {
                tracing::error!(error = %e, "listener registry poisoned");
                return;
            }
        };
        for listener in listeners {
            listener(revision);
        }
    }

    /// Live items matching `filter`, in global read order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query_items(&self, filter: &ItemFilter) -> Result<Snapshot<Vec<Item>>> {
        self.read(|conn| select_items(conn, filter))
    }

    /// Number of live items matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_items(&self, filter: &ItemFilter) -> Result<Snapshot<usize>> {
        self.read(|conn| count_items(conn, filter))
    }

    /// Looks up a live item.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.read(|conn| load_item(conn, id))?.value)
    }

    /// Ids currently waiting out their undo window.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn pending_ids(&self) -> Result<Vec<ItemId>> {
        Ok(self.read(pending_ids)?.value)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    let raw_category: String = row.get(3)?;
    let category = raw_category.parse::<Category>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Item {
        id: ItemId(row.get(0)?),
        text: row.get(1)?,
        completed: row.get(2)?,
        category,
        sort_order: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) fn select_items(conn: &Connection, filter: &ItemFilter) -> Result<Vec<Item>> {
    let (clause, values) = filter.where_clause();
    let sql = format!("SELECT {ITEM_COLUMNS} FROM todo_items {clause} {ORDER_BY}");
    let mut stmt = conn.prepare_cached(&sql)?;
    let items = stmt
        .query_map(params_from_iter(values.iter()), row_to_item)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

pub(crate) fn count_items(conn: &Connection, filter: &ItemFilter) -> Result<usize> {
    let (clause, values) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM todo_items {clause}");
    let count: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
    usize::try_from(count).map_err(|_| TaskListError::Storage(format!("invalid count {count}")))
}

/// Loads an item unless it is missing or pending deletion.
pub(crate) fn load_item(conn: &Connection, id: ItemId) -> Result<Option<Item>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM todo_items
         WHERE id = ?1 AND id NOT IN (SELECT id FROM temp.pending_deletes)"
    );
    Ok(conn.query_row(&sql, params![id.0], row_to_item).optional()?)
}

/// Live ids in global read order.
pub(crate) fn live_ids(conn: &Connection) -> Result<Vec<ItemId>> {
    let sql = format!(
        "SELECT id FROM todo_items WHERE id NOT IN (SELECT id FROM temp.pending_deletes) {ORDER_BY}"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let ids = stmt
        .query_map([], |row| row.get(0).map(ItemId))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Live rows other than `id` that sort strictly below `sort_order`, and whether one of
/// them already holds it.
pub(crate) fn sort_order_rank(
    conn: &Connection,
    id: ItemId,
    sort_order: i64,
) -> Result<(usize, bool)> {
    let (below, taken): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(sortOrder < ?2), 0), COALESCE(SUM(sortOrder = ?2), 0)
         FROM todo_items
         WHERE id != ?1 AND id NOT IN (SELECT id FROM temp.pending_deletes)",
        params![id.0, sort_order],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((usize::try_from(below).unwrap_or(0), taken > 0))
}

/// Highest `sortOrder` over every stored row, pending deletes included.
pub(crate) fn max_sort_order(conn: &Connection) -> Result<Option<i64>> {
    Ok(conn.query_row("SELECT MAX(sortOrder) FROM todo_items", [], |row| row.get(0))?)
}

pub(crate) fn insert_row(conn: &Connection, item: &NewItem) -> Result<Item> {
    conn.execute(
        "INSERT INTO todo_items (text, completed, category, sortOrder, createdAt)
         VALUES (?1, 0, ?2, ?3, ?4)",
        params![item.text, item.category.as_str(), item.sort_order, item.created_at],
    )?;
    Ok(Item {
        id: ItemId(conn.last_insert_rowid()),
        text: item.text.clone(),
        completed: false,
        category: item.category,
        sort_order: item.sort_order,
        created_at: item.created_at,
    })
}

/// Writes every mutable column of `item` back to its row.
pub(crate) fn write_row(conn: &Connection, item: &Item) -> Result<()> {
    let changed = conn.execute(
        "UPDATE todo_items SET text = ?2, completed = ?3, category = ?4, sortOrder = ?5
         WHERE id = ?1",
        params![
            item.id.0,
            item.text,
            item.completed,
            item.category.as_str(),
            item.sort_order
        ],
    )?;
    if changed == 0 {
        return Err(TaskListError::NotFound(item.id));
    }
    Ok(())
}

/// Assigns `sortOrder = position` for each id in `order`.
pub(crate) fn assign_sort_orders(conn: &Connection, order: &[ItemId]) -> Result<()> {
    let mut stmt = conn.prepare_cached("UPDATE todo_items SET sortOrder = ?1 WHERE id = ?2")?;
    for (position, id) in order.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|_| TaskListError::Storage("list too long".to_string()))?;
        if stmt.execute(params![position, id.0])? == 0 {
            return Err(TaskListError::NotFound(*id));
        }
    }
    Ok(())
}

pub(crate) fn pending_ids(conn: &Connection) -> Result<Vec<ItemId>> {
    let mut stmt = conn.prepare_cached("SELECT id FROM temp.pending_deletes ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0).map(ItemId))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

pub(crate) fn mark_pending(conn: &Connection, id: ItemId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO temp.pending_deletes (id) VALUES (?1)",
        params![id.0],
    )?;
    Ok(())
}

/// Returns `true` if the id was pending.
pub(crate) fn unmark_pending(conn: &Connection, id: ItemId) -> Result<bool> {
    Ok(conn.execute("DELETE FROM temp.pending_deletes WHERE id = ?1", params![id.0])? > 0)
}

pub(crate) fn delete_row(conn: &Connection, id: ItemId) -> Result<bool> {
    Ok(conn.execute("DELETE FROM todo_items WHERE id = ?1", params![id.0])? > 0)
}

/// Permanently removes every live completed item. Pending deletes are left to their timers.
pub(crate) fn delete_completed(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM todo_items
         WHERE completed = 1 AND id NOT IN (SELECT id FROM temp.pending_deletes)",
        [],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::CURRENT_SCHEMA_VERSION;
    use std::sync::atomic::AtomicUsize;

    fn store() -> Store {
        Store::open_in_memory(CURRENT_SCHEMA_VERSION).unwrap()
    }

    fn add(store: &Store, text: &str, category: Category, sort_order: i64, created_at: i64) -> Item {
        store
            .write("test_insert", |tx| {
                insert_row(
                    tx,
                    &NewItem {
                        text: text.to_string(),
                        category,
                        sort_order,
                        created_at,
                    },
                )
            })
            .unwrap()
    }

    #[test]
    fn reads_in_sort_order_then_newest_first() {
        let store = store();
        let a = add(&store, "a", Category::Work, 1, 100);
        let b = add(&store, "b", Category::Work, 0, 100);
        let c = add(&store, "c", Category::Work, 1, 200);

        let ids: Vec<ItemId> = store
            .query_items(&ItemFilter::ALL)
            .unwrap()
            .value
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);
    }

    #[test]
    fn revision_advances_per_commit_and_listeners_fire() {
        let store = store();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_listener = Arc::clone(&seen);
        let listener = store.on_commit(move |_| {
            seen_in_listener.fetch_add(1, Ordering::SeqCst);
        });

        add(&store, "a", Category::Personal, 0, 1);
        add(&store, "b", Category::Personal, 1, 2);
        assert_eq!(store.revision(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        store.remove_listener(listener);
        add(&store, "c", Category::Personal, 2, 3);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(store.query_items(&ItemFilter::ALL).unwrap().revision, 3);
    }

    #[test]
    fn failed_write_rolls_back_and_keeps_revision() {
        let store = store();
        let item = add(&store, "a", Category::Personal, 0, 1);

        let result: Result<()> = store.write("failing", |tx| {
            delete_row(tx, item.id)?;
            Err(TaskListError::Concurrency("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.revision(), 1);
        assert!(store.get(item.id).unwrap().is_some());
    }

    #[test]
    fn pending_rows_are_hidden_from_every_read() {
        let store = store();
        let keep = add(&store, "keep", Category::Health, 0, 1);
        let hide = add(&store, "hide", Category::Health, 1, 2);

        store.write("mark", |tx| mark_pending(tx, hide.id)).unwrap();

        assert!(store.get(hide.id).unwrap().is_none());
        assert_eq!(store.count_items(&ItemFilter::ALL).unwrap().value, 1);
        assert_eq!(
            store.query_items(&ItemFilter::category(Category::Health)).unwrap().value,
            vec![keep]
        );
        assert_eq!(store.pending_ids().unwrap(), vec![hide.id]);

        let max = store.read(max_sort_order).unwrap().value;
        assert_eq!(max, Some(1));
    }

    #[test]
    fn write_row_on_missing_id_is_not_found() {
        let store = store();
        let ghost = Item {
            id: ItemId(99),
            text: "ghost".into(),
            completed: false,
            category: Category::Other,
            sort_order: 0,
            created_at: 0,
        };
        let err = store.write("ghost", |tx| write_row(tx, &ghost)).unwrap_err();
        assert!(matches!(err, TaskListError::NotFound(ItemId(99))));
    }

    #[test]
    fn ids_are_never_reused() {
        let store = store();
        let first = add(&store, "a", Category::Personal, 0, 1);
        store.write("delete", |tx| delete_row(tx, first.id)).unwrap();
        let second = add(&store, "b", Category::Personal, 0, 2);
        assert!(second.id > first.id);
    }
}
