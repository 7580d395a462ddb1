//! Serializable descriptions of store mutations.
//!
//! Every operation of [`super::MutationService`] can be expressed as a [`Mutation`].
//! The app layer emits them as actions, and the service remembers the last one that
//! failed with a retryable error so a single "retry" can re-issue it.

use crate::domain::{Category, Item, ItemId};
use serde::{Deserialize, Serialize};

/// One store operation, with all of its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Insert { text: String, category: Category },
    UpdateText { id: ItemId, text: String },
    UpdateCategory { id: ItemId, category: Category },
    ToggleCompleted { id: ItemId },
    /// Full permutation of the live ids.
    Reorder { ids: Vec<ItemId> },
    /// Permutation of a live subset, placed into the slots that subset occupies.
    ReorderWithin { ids: Vec<ItemId> },
    DeletePending { id: ItemId },
    CommitDelete { id: ItemId },
    Restore { id: ItemId },
    DeleteAllCompleted,
}

impl Mutation {
    /// Short operation name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::UpdateText { .. } => "update_text",
            Self::UpdateCategory { .. } => "update_category",
            Self::ToggleCompleted { .. } => "toggle_completed",
            Self::Reorder { .. } => "reorder",
            Self::ReorderWithin { .. } => "reorder_within",
            Self::DeletePending { .. } => "delete_pending",
            Self::CommitDelete { .. } => "commit_delete",
            Self::Restore { .. } => "restore",
            Self::DeleteAllCompleted => "delete_all_completed",
        }
    }
}

/// Result of a successfully applied [`Mutation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Inserted(Item),
    Updated(Item),
    /// Full resulting order of live ids.
    Reordered(Vec<ItemId>),
    PendingDelete(Item),
    /// `removed` is `false` when the id was not pending (already committed or restored).
    DeleteCommitted { id: ItemId, removed: bool },
    Restored(Item),
    CompletedPurged(usize),
}
