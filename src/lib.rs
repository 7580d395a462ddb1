//! Tasklist: the core of a single-user, offline, ordered task list.
//!
//! The crate provides:
//! - A versioned SQLite store with forward-only schema migrations
//! - Live queries that re-emit a fresh snapshot after every committed write
//! - A validated mutation service with pending deletes, undo, and retry
//! - Drag-to-reorder and swipe-to-act gesture state machines
//! - An event/action coordinator that ties gestures to persistence

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Presentation (external)                            │  ← Renders snapshots
//! └─────────────────────────────────────────────────────┘
//!                        │ Events          ▲ Actions
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │
//! │  - handle_event state machine                       │
//! │  - Runtime executing persistence actions            │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Gestures      │   │ Query Layer   │   │ Undo Worker   │
//! │ (gesture/)    │   │ (query/)      │   │ (worker/)     │
//! │ - Reorder     │   │ - Live views  │   │ - Timers      │
//! │ - Swipe       │   │ - Dispatcher  │   │ - Flush       │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!                              │                    │
//! ┌─────────────────────────────────────────────────────┐
//! │  Mutation Service (service/) → Store (storage/)     │  ← Only write path
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain, infrastructure, observability              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: Application state machine with event/action model
//! - [`domain`]: Items, categories, and error types
//! - [`gesture`]: Reorder and swipe engines
//! - [`infrastructure`]: Data directory resolution
//! - [`query`]: Live query subscriptions
//! - [`service`]: Mutation service and retry
//! - [`storage`]: SQLite schema, filters, and the store handle
//! - [`worker`]: Undo window timers
//! - [`observability`]: OpenTelemetry tracing with file export
//!
//! # Configuration
//!
//! ```toml
//! data_dir = "~/tasks"
//! undo_window_ms = 5000
//! swipe_threshold = 120.0
//! trace_level = "debug"
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use tasklist::app::Event;
//! use tasklist::{Category, Config, TaskList};
//!
//! let config = Config::from_file("tasklist.toml")?;
//! tasklist::observability::init_tracing(&config);
//!
//! let list = TaskList::open(&config)?;
//! let mut runtime = list.runtime()?;
//! runtime.dispatch(Event::AddItem {
//!     text: "water the plants".to_string(),
//!     category: Category::Personal,
//! })?;
//! list.shutdown()?;
//! # Ok::<(), tasklist::TaskListError>(())
//! ```

pub mod app;
pub mod domain;
pub mod gesture;
pub mod infrastructure;
pub mod query;
pub mod service;
pub mod storage;
pub mod worker;

pub mod observability;

pub use app::{handle_event, Action, AppSettings, AppState, Event, Runtime};
pub use domain::{Category, Item, ItemId, Result, TaskListError};
pub use query::{QueryLayer, Subscription};
pub use service::{Mutation, MutationOutcome, MutationService};
pub use storage::{ItemFilter, Snapshot, Store, CURRENT_SCHEMA_VERSION};
pub use worker::UndoScheduler;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Runtime configuration.
///
/// Every field has a default, so a partial TOML file or an empty map is valid.
///
/// # Example
///
/// ```
/// use tasklist::Config;
///
/// let config = Config::from_toml_str("undo_window_ms = 2500\ntrace_level = \"debug\"")?;
/// assert_eq!(config.undo_window_ms, 2500);
/// assert_eq!(config.database_file, "tasks.db");
/// # Ok::<(), tasklist::TaskListError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for the database and trace files.
    ///
    /// `None` resolves through [`infrastructure::data_dir`]. A leading `~` is
    /// expanded.
    pub data_dir: Option<PathBuf>,

    /// Database file name inside the data directory. Default: `tasks.db`
    pub database_file: String,

    /// How long a swiped-away item can be restored. Default: 4000
    pub undo_window_ms: u64,

    /// Drag distance below which a drag is treated as jitter. Default: 8.0
    pub min_drag_distance: f32,

    /// Horizontal distance that arms a swipe action. Default: 96.0
    pub swipe_threshold: f32,

    /// Longest accepted item text, in characters after trimming. Default: 500
    pub max_text_length: usize,

    /// Row extent assumed until the presentation layer measures a row. Default: 72.0
    pub row_extent: f32,

    /// Tracing filter directive.
    ///
    /// Options: `trace`, `debug`, `info`, `warn`, `error`, or any `EnvFilter`
    /// directive. Default: `"info"`
    pub trace_level: Option<String>,

    /// Trace file size that triggers rotation. Default: 10 MiB
    pub trace_max_bytes: u64,

    /// Rotated trace files to keep. Default: 3
    pub trace_backups: usize,
}

impl Default for Config {
    fn default() -> Self {
        let settings = AppSettings::default();
        let rotation = observability::RotationPolicy::default();
        Self {
            data_dir: None,
            database_file: "tasks.db".to_string(),
            undo_window_ms: u64::try_from(settings.undo_window.as_millis()).unwrap_or(4000),
            min_drag_distance: settings.min_drag_distance,
            swipe_threshold: settings.swipe_threshold,
            max_text_length: settings.max_text_length,
            row_extent: settings.row_extent,
            trace_level: None,
            trace_max_bytes: rotation.max_bytes,
            trace_backups: rotation.backups,
        }
    }
}

impl Config {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Config`] if the document is not valid TOML or a value has
    /// the wrong type.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| TaskListError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Io`] if the file cannot be read, [`TaskListError::Config`]
    /// if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Builds a configuration from flat string pairs.
    ///
    /// Unknown keys are ignored and unparsable values fall back to the default.
    #[must_use]
    pub fn from_map(values: &BTreeMap<String, String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            values: &BTreeMap<String, String>,
            key: &str,
            fallback: T,
        ) -> T {
            values
                .get(key)
                .and_then(|s| s.trim().parse::<T>().ok())
                .unwrap_or(fallback)
        }

        let defaults = Self::default();
        Self {
            data_dir: values
                .get("data_dir")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            database_file: values
                .get("database_file")
                .filter(|s| !s.trim().is_empty())
                .cloned()
                .unwrap_or(defaults.database_file),
            undo_window_ms: parsed(values, "undo_window_ms", defaults.undo_window_ms),
            min_drag_distance: parsed(values, "min_drag_distance", defaults.min_drag_distance),
            swipe_threshold: parsed(values, "swipe_threshold", defaults.swipe_threshold),
            max_text_length: parsed(values, "max_text_length", defaults.max_text_length),
            row_extent: parsed(values, "row_extent", defaults.row_extent),
            trace_level: values.get("trace_level").cloned(),
            trace_max_bytes: parsed(values, "trace_max_bytes", defaults.trace_max_bytes),
            trace_backups: parsed(values, "trace_backups", defaults.trace_backups),
        }
    }

    /// The data directory with `~` expanded, or the platform default.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_ref()
            .map_or_else(infrastructure::data_dir, infrastructure::expand_tilde)
    }

    /// Full path of the database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join(&self.database_file)
    }

    #[must_use]
    pub const fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_window_ms)
    }

    /// Tunables for the application layer.
    #[must_use]
    pub const fn app_settings(&self) -> AppSettings {
        AppSettings {
            min_drag_distance: self.min_drag_distance,
            swipe_threshold: self.swipe_threshold,
            max_text_length: self.max_text_length,
            row_extent: self.row_extent,
            undo_window: self.undo_window(),
        }
    }
}

/// A fully wired task list: store, live queries, mutations, and the undo worker.
///
/// All components share the one store handle opened here.
pub struct TaskList {
    store: Store,
    queries: Arc<QueryLayer>,
    service: MutationService,
    undo: Arc<UndoScheduler>,
    settings: AppSettings,
}

impl TaskList {
    /// Opens (and migrates) the database named by `config` and starts the workers.
    ///
    /// # Errors
    ///
    /// - [`TaskListError::Io`] if the data directory cannot be created
    /// - [`TaskListError::Migration`] or [`TaskListError::UnsupportedSchemaVersion`]
    ///   if the schema cannot be brought to [`CURRENT_SCHEMA_VERSION`]
    pub fn open(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let store = Store::open(config.database_path(), CURRENT_SCHEMA_VERSION)?;
        Self::with_store(store, config.app_settings())
    }

    /// Wires the components around an already opened store.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Io`] if a worker thread cannot be spawned.
    pub fn with_store(store: Store, settings: AppSettings) -> Result<Self> {
        let queries = Arc::new(QueryLayer::new(store.clone())?);
        let service = MutationService::new(store.clone());
        let undo = Arc::new(UndoScheduler::with_service(
            service.clone(),
            settings.undo_window,
        )?);

        tracing::info!(
            path = ?store.path(),
            undo_window_ms = settings.undo_window.as_millis(),
            "task list opened"
        );
        Ok(Self {
            store,
            queries,
            service,
            undo,
            settings,
        })
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn queries(&self) -> &Arc<QueryLayer> {
        &self.queries
    }

    #[must_use]
    pub const fn service(&self) -> &MutationService {
        &self.service
    }

    #[must_use]
    pub const fn undo(&self) -> &Arc<UndoScheduler> {
        &self.undo
    }

    #[must_use]
    pub const fn settings(&self) -> AppSettings {
        self.settings
    }

    /// A coordinator for one view, sharing this list's services.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial view query fails.
    pub fn runtime(&self) -> Result<Runtime> {
        Runtime::new(
            self.service.clone(),
            Arc::clone(&self.queries),
            Arc::clone(&self.undo),
            self.settings,
        )
    }

    /// Finalizes every pending delete and stops the undo worker.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] if the undo worker panicked.
    pub fn shutdown(self) -> Result<()> {
        self.undo.shutdown()?;
        tracing::info!("task list closed");
        Ok(())
    }
}

impl std::fmt::Debug for TaskList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskList")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_app_settings() {
        let config = Config::default();
        assert_eq!(config.database_file, "tasks.db");
        assert_eq!(config.undo_window_ms, 4000);
        assert_eq!(config.trace_max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.trace_backups, 3);
        assert_eq!(config.app_settings(), AppSettings::default());
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = Config::from_toml_str(
            r#"
            data_dir = "/srv/tasks"
            swipe_threshold = 120.0
            trace_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/srv/tasks/tasks.db"));
        assert!((config.swipe_threshold - 120.0).abs() < f32::EPSILON);
        assert_eq!(config.trace_level.as_deref(), Some("debug"));
        assert_eq!(config.max_text_length, 500);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        assert!(matches!(
            Config::from_toml_str("undo_window_ms = \"soon\""),
            Err(TaskListError::Config(_))
        ));
    }

    #[test]
    fn map_values_fall_back_on_parse_failure() {
        let values: BTreeMap<String, String> = [
            ("undo_window_ms", "1500"),
            ("swipe_threshold", "wide"),
            ("database_file", "work.db"),
            ("unknown", "x"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = Config::from_map(&values);
        assert_eq!(config.undo_window(), Duration::from_millis(1500));
        assert!((config.swipe_threshold - 96.0).abs() < f32::EPSILON);
        assert_eq!(config.database_file, "work.db");
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn open_creates_directory_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: Some(dir.path().join("nested")),
            ..Config::default()
        };

        let list = TaskList::open(&config).unwrap();
        assert_eq!(list.store().schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
        list.service().insert("first", Category::Work).unwrap();
        list.shutdown().unwrap();

        assert!(config.database_path().exists());
    }
}
