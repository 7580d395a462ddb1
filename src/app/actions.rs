//! Actions representing side effects produced by the event handler.
//!
//! [`handle_event`](super::handle_event) never touches the store or the undo worker
//! itself. It returns a `Vec<Action>`; persistence and timer actions are executed by
//! [`Runtime`](super::Runtime), and the presentation actions are handed to whoever
//! renders the list.
//!
//! # Example
//!
//! ```rust
//! use tasklist::app::Action;
//! use tasklist::service::Mutation;
//! use tasklist::ItemId;
//!
//! let actions = vec![Action::Persist(Mutation::ToggleCompleted { id: ItemId(1) })];
//! assert!(!actions[0].is_presentation());
//! ```

use crate::domain::{Item, ItemId};
use crate::gesture::{DragEffect, SwipeEffect};
use crate::service::Mutation;
use crate::storage::ItemFilter;
use std::time::Duration;

/// Visual hook for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Animation {
    Drag(DragEffect),
    Swipe { id: ItemId, effect: SwipeEffect },
}

/// Commands emitted by the event handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Run a mutation through the mutation service.
    Persist(Mutation),

    /// Start the undo window of a pending delete.
    ScheduleUndo {
        id: ItemId,
        window: Duration,
    },

    /// Stop the undo window of `id` without committing.
    CancelUndo { id: ItemId },

    /// Re-issue the last failed mutation.
    Retry,

    /// Replace the live view with one for `filter`.
    WatchView(ItemFilter),

    /// Presentation: gesture animation hook.
    Animate(Animation),

    /// Presentation: one discrete haptic-style signal.
    Feedback,

    /// Presentation: show the undo affordance for a pending delete.
    ShowUndo { item: Item },

    /// Presentation: no pending delete is left to undo.
    HideUndo,

    /// Presentation: surface a failure. `retry` offers a retry affordance.
    ShowError { message: String, retry: bool },
}

impl Action {
    /// Returns `true` for actions meant for the renderer rather than the runtime.
    #[must_use]
    pub const fn is_presentation(&self) -> bool {
        matches!(
            self,
            Self::Animate(_)
                | Self::Feedback
                | Self::ShowUndo { .. }
                | Self::HideUndo
                | Self::ShowError { .. }
        )
    }
}
