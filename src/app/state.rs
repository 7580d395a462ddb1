//! Application state for one list view.
//!
//! [`AppState`] holds the latest persisted snapshot of the view together with the
//! ephemeral gesture state layered on top of it. The snapshot is the single source of
//! truth for item data: mutations are never applied optimistically to `items`, the
//! next query emission brings them in.

use crate::domain::{Item, ItemId};
use crate::gesture::{ReorderEngine, Row, SwipeEngine, SwipeState};
use crate::storage::{ItemFilter, Snapshot};
use std::collections::HashMap;
use std::time::Duration;

/// Tunables taken from [`crate::Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppSettings {
    pub min_drag_distance: f32,
    pub swipe_threshold: f32,
    pub max_text_length: usize,
    /// Extent used for rows that have not been measured yet.
    pub row_extent: f32,
    pub undo_window: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            min_drag_distance: 8.0,
            swipe_threshold: 96.0,
            max_text_length: 500,
            row_extent: 72.0,
            undo_window: Duration::from_millis(4000),
        }
    }
}

/// Category of a surfaced failure, decides what "retry" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    NotFound,
    Concurrency,
    Storage,
    Fatal,
}

impl FailureKind {
    #[must_use]
    pub fn of(err: &crate::TaskListError) -> Self {
        use crate::TaskListError as E;
        match err {
            E::Validation(_) | E::Config(_) => Self::Validation,
            E::NotFound(_) => Self::NotFound,
            E::Concurrency(_) => Self::Concurrency,
            E::Migration { .. } | E::UnsupportedSchemaVersion { .. } => Self::Fatal,
            E::Storage(_) | E::Sqlite(_) | E::Io(_) | E::Worker(_) => Self::Storage,
        }
    }

    /// Whether the failure is offered a retry affordance.
    #[must_use]
    pub const fn offers_retry(self) -> bool {
        matches!(self, Self::NotFound | Self::Storage)
    }
}

/// The failure currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Latest snapshot of the view, in display order.
    pub items: Vec<Item>,

    /// Revision of `items`; older snapshots are ignored.
    pub revision: Option<u64>,

    pub filter: ItemFilter,

    pub reorder: ReorderEngine,

    /// Swipe state per row. Rows without an entry are idle.
    pub swipes: HashMap<ItemId, SwipeEngine>,

    /// Pending deletes that can still be undone, most recent last.
    pub undo_stack: Vec<Item>,

    pub last_error: Option<ErrorNotice>,

    pub row_extents: HashMap<ItemId, f32>,

    pub settings: AppSettings,
}

impl AppState {
    #[must_use]
    pub fn new(settings: AppSettings) -> Self {
        Self {
            items: Vec::new(),
            revision: None,
            filter: ItemFilter::ALL,
            reorder: ReorderEngine::new(settings.min_drag_distance),
            swipes: HashMap::new(),
            undo_stack: Vec::new(),
            last_error: None,
            row_extents: HashMap::new(),
            settings,
        }
    }

    /// Installs a query emission. Returns `false` if it was older than what is shown.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot<Vec<Item>>) -> bool {
        if self.revision.is_some_and(|seen| snapshot.revision < seen) {
            tracing::trace!(revision = snapshot.revision, "ignoring stale snapshot");
            return false;
        }
        self.revision = Some(snapshot.revision);
        self.items.clone_from(&snapshot.value);

        let live: std::collections::HashSet<ItemId> = self.items.iter().map(|i| i.id).collect();
        self.swipes.retain(|id, swipe| {
            live.contains(id) && !matches!(swipe.state(), SwipeState::Committed(_))
        });
        self.row_extents.retain(|id, _| live.contains(id));

        let rows = self.rows();
        self.reorder.set_rows(rows);
        true
    }

    /// Rows for the reorder engine, in snapshot order.
    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.items
            .iter()
            .map(|item| Row::new(item.id, self.extent_of(item.id)))
            .collect()
    }

    #[must_use]
    pub fn extent_of(&self, id: ItemId) -> f32 {
        self.row_extents
            .get(&id)
            .copied()
            .unwrap_or(self.settings.row_extent)
    }

    pub fn set_extent(&mut self, id: ItemId, extent: f32) {
        self.row_extents.insert(id, extent);
        self.reorder.set_extent(id, extent);
    }

    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Swipe engine for `id`, created on first use.
    pub fn swipe(&mut self, id: ItemId) -> &mut SwipeEngine {
        let threshold = self.settings.swipe_threshold;
        self.swipes
            .entry(id)
            .or_insert_with(|| SwipeEngine::new(threshold))
    }

    /// Items in their current visual order, including ephemeral drag swaps.
    #[must_use]
    pub fn visible_items(&self) -> Vec<&Item> {
        self.reorder
            .order()
            .into_iter()
            .filter_map(|id| self.item(id))
            .collect()
    }
}
