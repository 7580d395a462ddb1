//! Versioned schema and migration steps.
//!
//! The schema version is kept in SQLite's `PRAGMA user_version`. Each step moves the
//! database from `version - 1` to `version`; [`migrate_to`] applies every missing step
//! plus the version bump inside a single transaction, so callers never observe a
//! partially migrated database.
//!
//! | Version | Step |
//! |---------|------|
//! | 1 | base `todo_items` table (`id`, `text`, `completed`, `createdAt`) |
//! | 2 | `category` (default `PERSONAL`) and `sortOrder` ranked from `createdAt` |
//! | 3 | access-path indexes, no row changes |

use crate::domain::error::{Result, TaskListError};
use rusqlite::{Connection, Transaction};

/// Highest schema version this build knows how to produce.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

struct MigrationStep {
    version: u32,
    name: &'static str,
    apply: fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

const STEPS: &[MigrationStep] = &[
    MigrationStep {
        version: 1,
        name: "create items table",
        apply: create_items_table,
    },
    MigrationStep {
        version: 2,
        name: "add category and sort order",
        apply: add_category_and_order,
    },
    MigrationStep {
        version: 3,
        name: "add indexes",
        apply: add_indexes,
    },
];

fn create_items_table(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS todo_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            text TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            createdAt INTEGER NOT NULL
        );
        ",
    )
}

/// Adds `category` and `sortOrder`.
///
/// Existing rows are ranked oldest first: a row's `sortOrder` is the number of rows
/// created before it, with equal timestamps ordered by ascending `id`. The result is
/// dense (`0..n`) and independent of physical row order.
fn add_category_and_order(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "
        ALTER TABLE todo_items ADD COLUMN category TEXT NOT NULL DEFAULT 'PERSONAL';
        ALTER TABLE todo_items ADD COLUMN sortOrder INTEGER NOT NULL DEFAULT 0;
        UPDATE todo_items SET sortOrder = (
            SELECT COUNT(*) FROM todo_items AS earlier
            WHERE earlier.createdAt < todo_items.createdAt
               OR (earlier.createdAt = todo_items.createdAt AND earlier.id < todo_items.id)
        );
        ",
    )
}

fn add_indexes(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS index_todo_items_sortOrder ON todo_items(sortOrder);
        CREATE INDEX IF NOT EXISTS index_todo_items_category ON todo_items(category);
        CREATE INDEX IF NOT EXISTS index_todo_items_completed ON todo_items(completed);
        CREATE INDEX IF NOT EXISTS index_todo_items_category_completed ON todo_items(category, completed);
        CREATE INDEX IF NOT EXISTS index_todo_items_createdAt ON todo_items(createdAt);
        ",
    )
}

/// Reads the schema version recorded in the database file.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    u32::try_from(version)
        .map_err(|_| TaskListError::Storage(format!("invalid schema version {version}")))
}

/// Brings the database to `target`, applying each missing step exactly once.
///
/// Returns the version the database is at afterwards.
///
/// # Errors
///
/// - [`TaskListError::UnsupportedSchemaVersion`] if `target` is newer than this build
///   supports or the file is already past `target`.
/// - [`TaskListError::Migration`] if any step fails; the transaction is rolled back and
///   the file keeps its previous version.
pub fn migrate_to(conn: &mut Connection, target: u32) -> Result<u32> {
    if target > CURRENT_SCHEMA_VERSION {
        return Err(TaskListError::UnsupportedSchemaVersion {
            found: target,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    let found = schema_version(conn)?;
    if found > target {
        return Err(TaskListError::UnsupportedSchemaVersion {
            found,
            supported: target,
        });
    }
    if found == target {
        tracing::debug!(version = found, "schema up to date");
        return Ok(found);
    }

    let _span = tracing::info_span!("migrate_schema", from = found, to = target).entered();

    let tx = conn
        .transaction()
        .map_err(|source| TaskListError::Migration { version: target, source })?;

    for step in STEPS.iter().filter(|s| s.version > found && s.version <= target) {
        tracing::info!(version = step.version, step = step.name, "applying migration step");
        (step.apply)(&tx).map_err(|source| {
            tracing::error!(version = step.version, error = %source, "migration step failed");
            TaskListError::Migration {
                version: step.version,
                source,
            }
        })?;
    }

    tx.execute_batch(&format!("PRAGMA user_version = {target}"))
        .map_err(|source| TaskListError::Migration { version: target, source })?;
    tx.commit()
        .map_err(|source| TaskListError::Migration { version: target, source })?;

    tracing::info!(version = target, "schema migrated");
    Ok(target)
}
