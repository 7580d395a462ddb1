//! Event handling and state transition logic.
//!
//! [`handle_event`] is the single coordinator between the presentation layer, the
//! gesture engines, and the mutation service. It mutates [`AppState`] and returns
//! the [`Action`]s to run, never performing I/O itself.
//!
//! # Event Types
//!
//! - **Data**: `ViewSnapshot`, `PendingSynced`, `MutationSucceeded`, `MutationFailed`
//! - **Layout**: `RowMeasured`, `ViewportChanged`, `FilterChanged`
//! - **Gestures**: `Drag`, `Swipe`, `Interrupted`
//! - **Commands**: `AddItem`, `EditText`, `EditCategory`, `ToggleCompleted`,
//!   `DeleteRequested`, `Undo`, `UndoDismissed`, `ClearCompleted`, `Retry`
//!
//! # Example
//!
//! ```rust
//! use tasklist::app::{handle_event, AppSettings, AppState, Event};
//! use tasklist::Category;
//!
//! let mut state = AppState::new(AppSettings::default());
//! let (_, actions) = handle_event(
//!     &mut state,
//!     &Event::AddItem { text: "  water plants ".into(), category: Category::Personal },
//! )?;
//! assert_eq!(actions.len(), 1);
//! # Ok::<(), tasklist::TaskListError>(())
//! ```

use crate::app::actions::Animation;
use crate::app::state::{ErrorNotice, FailureKind};
use crate::app::{Action, AppState};
use crate::domain::error::Result;
use crate::domain::{validate_edit, Category, Item, ItemId};
use crate::gesture::{DragEffect, DragEvent, SwipeAction, SwipeEffect, SwipeEvent, SwipeState, Viewport};
use crate::service::{Mutation, MutationOutcome};
use crate::storage::{ItemFilter, Snapshot};

/// Inputs to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// New emission of the live view.
    ViewSnapshot(Snapshot<Vec<Item>>),

    /// A row was laid out with the given extent.
    RowMeasured { id: ItemId, extent: f32 },

    ViewportChanged(Option<Viewport>),

    /// Switch the view to another filter.
    FilterChanged(ItemFilter),

    Drag(DragEvent),

    Swipe { id: ItemId, event: SwipeEvent },

    AddItem { text: String, category: Category },

    EditText { id: ItemId, text: String },

    EditCategory { id: ItemId, category: Category },

    ToggleCompleted { id: ItemId },

    /// Long-press delete. Goes through the same pending-delete path as a swipe.
    DeleteRequested { id: ItemId },

    /// Restore the most recent pending delete.
    Undo,

    /// The undo affordance was dismissed; commit every pending delete now.
    UndoDismissed,

    ClearCompleted,

    Retry,

    MutationSucceeded(MutationOutcome),

    MutationFailed {
        mutation: Mutation,
        kind: FailureKind,
        message: String,
    },

    /// Ids the store still holds for undo. Anything else on the undo stack was
    /// committed by the undo timer.
    PendingSynced(Vec<ItemId>),

    /// The app lost focus or the gesture system was reset.
    Interrupted,
}

/// Processes an event, mutates state, and returns `(should_render, actions)`.
///
/// # Errors
///
/// Currently infallible; the `Result` leaves room for handlers that need I/O-free
/// validation to abort the whole event.
#[allow(clippy::too_many_lines)]
pub fn handle_event(state: &mut AppState, event: &Event) -> Result<(bool, Vec<Action>)> {
    let _span = tracing::debug_span!("handle_event", event_type = event_name(event)).entered();

    match event {
        Event::ViewSnapshot(snapshot) => Ok((state.apply_snapshot(snapshot), vec![])),

        Event::RowMeasured { id, extent } => {
            state.set_extent(*id, *extent);
            Ok((false, vec![]))
        }

        Event::ViewportChanged(viewport) => {
            state.reorder.set_viewport(*viewport);
            Ok((false, vec![]))
        }

        Event::FilterChanged(filter) => {
            if *filter == state.filter {
                return Ok((false, vec![]));
            }
            let effects = state.reorder.cancel();
            let mut actions = drag_actions(state, effects);
            actions.extend(cancel_swipes(state));
            state.filter = *filter;
            state.swipes.clear();
            state.revision = None;
            tracing::debug!(?filter, "view filter changed");
            actions.push(Action::WatchView(*filter));
            Ok((true, actions))
        }

        Event::Drag(drag) => {
            if matches!(drag, DragEvent::Start { .. }) && any_swipe_active(state) {
                tracing::debug!("ignoring drag start while a row is being swiped");
                return Ok((false, vec![]));
            }
            let effects = state.reorder.handle(*drag);
            let render = !effects.is_empty();
            Ok((render, drag_actions(state, effects)))
        }

        Event::Swipe { id, event } => {
            if state.reorder.is_dragging() {
                return Ok((false, vec![]));
            }
            if state.item(*id).is_none() {
                tracing::debug!(item_id = %id, "ignoring swipe on unknown row");
                return Ok((false, vec![]));
            }
            let effects = state.swipe(*id).handle(*event);
            let render = !effects.is_empty();
            Ok((render, swipe_actions(*id, effects)))
        }

        Event::AddItem { text, category } => {
            match validate_edit(text, state.settings.max_text_length) {
                Ok(text) => Ok((
                    false,
                    vec![Action::Persist(Mutation::Insert {
                        text,
                        category: *category,
                    })],
                )),
                Err(e) => Ok((true, vec![surface(state, FailureKind::Validation, e.to_string())])),
            }
        }

        Event::EditText { id, text } => {
            match validate_edit(text, state.settings.max_text_length) {
                Ok(text) => Ok((false, vec![Action::Persist(Mutation::UpdateText { id: *id, text })])),
                Err(e) => Ok((true, vec![surface(state, FailureKind::Validation, e.to_string())])),
            }
        }

        Event::EditCategory { id, category } => Ok((
            false,
            vec![Action::Persist(Mutation::UpdateCategory {
                id: *id,
                category: *category,
            })],
        )),

        Event::ToggleCompleted { id } => {
            Ok((false, vec![Action::Persist(Mutation::ToggleCompleted { id: *id })]))
        }

        Event::DeleteRequested { id } => Ok((false, vec![Action::Persist(Mutation::DeletePending { id: *id })])),

        Event::Undo => {
            let Some(item) = state.undo_stack.pop() else {
                return Ok((false, vec![]));
            };
            tracing::debug!(item_id = %item.id, "undoing delete");
            let mut actions = vec![
                Action::CancelUndo { id: item.id },
                Action::Persist(Mutation::Restore { id: item.id }),
            ];
            actions.push(undo_banner(state));
            Ok((true, actions))
        }

        Event::UndoDismissed => {
            let mut actions = Vec::new();
            for item in state.undo_stack.drain(..) {
                actions.push(Action::CancelUndo { id: item.id });
                actions.push(Action::Persist(Mutation::CommitDelete { id: item.id }));
            }
            actions.push(Action::HideUndo);
            Ok((true, actions))
        }

        Event::ClearCompleted => Ok((false, vec![Action::Persist(Mutation::DeleteAllCompleted)])),

        Event::Retry => {
            let Some(notice) = state.last_error.take() else {
                return Ok((false, vec![]));
            };
            match notice.kind {
                FailureKind::Storage => Ok((true, vec![Action::Retry])),
                FailureKind::NotFound => {
                    state.revision = None;
                    Ok((true, vec![Action::WatchView(state.filter)]))
                }
                _ => Ok((true, vec![])),
            }
        }

        Event::MutationSucceeded(outcome) => Ok(on_success(state, outcome)),

        Event::MutationFailed {
            mutation,
            kind,
            message,
        } => Ok((true, on_failure(state, mutation, *kind, message))),

        Event::PendingSynced(pending) => {
            let before = state.undo_stack.len();
            state.undo_stack.retain(|item| pending.contains(&item.id));
            if state.undo_stack.len() == before {
                return Ok((false, vec![]));
            }
            tracing::debug!(
                expired = before - state.undo_stack.len(),
                "undo entries committed by timer"
            );
            Ok((true, vec![undo_banner(state)]))
        }

        Event::Interrupted => {
            let effects = state.reorder.cancel();
            let mut actions = drag_actions(state, effects);
            actions.extend(cancel_swipes(state));
            Ok((!actions.is_empty(), actions))
        }
    }
}

const fn event_name(event: &Event) -> &'static str {
    match event {
        Event::ViewSnapshot(_) => "view_snapshot",
        Event::RowMeasured { .. } => "row_measured",
        Event::ViewportChanged(_) => "viewport_changed",
        Event::FilterChanged(_) => "filter_changed",
        Event::Drag(_) => "drag",
        Event::Swipe { .. } => "swipe",
        Event::AddItem { .. } => "add_item",
        Event::EditText { .. } => "edit_text",
        Event::EditCategory { .. } => "edit_category",
        Event::ToggleCompleted { .. } => "toggle_completed",
        Event::DeleteRequested { .. } => "delete_requested",
        Event::Undo => "undo",
        Event::UndoDismissed => "undo_dismissed",
        Event::ClearCompleted => "clear_completed",
        Event::Retry => "retry",
        Event::MutationSucceeded(_) => "mutation_succeeded",
        Event::MutationFailed { .. } => "mutation_failed",
        Event::PendingSynced(_) => "pending_synced",
        Event::Interrupted => "interrupted",
    }
}

fn any_swipe_active(state: &AppState) -> bool {
    state
        .swipes
        .values()
        .any(|s| matches!(s.state(), SwipeState::Swiping { .. }))
}

fn drag_actions(state: &AppState, effects: Vec<DragEffect>) -> Vec<Action> {
    effects
        .into_iter()
        .map(|effect| match effect {
            DragEffect::Commit { order } => {
                let mutation = if state.filter.is_all() {
                    Mutation::Reorder { ids: order }
                } else {
                    Mutation::ReorderWithin { ids: order }
                };
                Action::Persist(mutation)
            }
            other => Action::Animate(Animation::Drag(other)),
        })
        .collect()
}

fn swipe_actions(id: ItemId, effects: Vec<SwipeEffect>) -> Vec<Action> {
    effects
        .into_iter()
        .map(|effect| match effect {
            SwipeEffect::Feedback => Action::Feedback,
            SwipeEffect::Commit(SwipeAction::ToggleComplete) => {
                Action::Persist(Mutation::ToggleCompleted { id })
            }
            SwipeEffect::Commit(SwipeAction::Delete) => Action::Persist(Mutation::DeletePending { id }),
            other => Action::Animate(Animation::Swipe { id, effect: other }),
        })
        .collect()
}

fn cancel_swipes(state: &mut AppState) -> Vec<Action> {
    let mut actions = Vec::new();
    for (id, swipe) in &mut state.swipes {
        for effect in swipe.cancel() {
            actions.push(Action::Animate(Animation::Swipe { id: *id, effect }));
        }
    }
    actions
}

fn undo_banner(state: &AppState) -> Action {
    state
        .undo_stack
        .last()
        .map_or(Action::HideUndo, |item| Action::ShowUndo { item: item.clone() })
}

fn surface(state: &mut AppState, kind: FailureKind, message: String) -> Action {
    let retry = kind.offers_retry();
    state.last_error = Some(ErrorNotice {
        kind,
        message: message.clone(),
    });
    Action::ShowError { message, retry }
}

fn on_success(state: &mut AppState, outcome: &MutationOutcome) -> (bool, Vec<Action>) {
    match outcome {
        MutationOutcome::PendingDelete(item) => {
            state.undo_stack.retain(|pending| pending.id != item.id);
            state.undo_stack.push(item.clone());
            (
                true,
                vec![
                    Action::ScheduleUndo {
                        id: item.id,
                        window: state.settings.undo_window,
                    },
                    Action::ShowUndo { item: item.clone() },
                ],
            )
        }
        MutationOutcome::DeleteCommitted { id, .. } => {
            let before = state.undo_stack.len();
            state.undo_stack.retain(|pending| pending.id != *id);
            if state.undo_stack.len() == before {
                return (false, vec![]);
            }
            (true, vec![undo_banner(state)])
        }
        _ => {
            if state
                .last_error
                .as_ref()
                .is_some_and(|notice| notice.kind == FailureKind::Storage)
            {
                state.last_error = None;
            }
            (false, vec![])
        }
    }
}

fn on_failure(state: &mut AppState, mutation: &Mutation, kind: FailureKind, message: &str) -> Vec<Action> {
    tracing::debug!(op = mutation.name(), ?kind, %message, "mutation failed");
    let mut actions = Vec::new();

    match mutation {
        Mutation::Reorder { .. } | Mutation::ReorderWithin { .. } => {
            let rows = state.rows();
            state.reorder.set_rows(rows);
            actions.push(Action::Animate(Animation::Drag(DragEffect::Revert {
                order: state.reorder.order(),
            })));
        }
        Mutation::Restore { id } if kind == FailureKind::NotFound => {
            state.undo_stack.retain(|pending| pending.id != *id);
        }
        Mutation::ToggleCompleted { id } | Mutation::DeletePending { id } => {
            // No snapshot follows a failed write, so a committed swipe would stay stuck.
            if let Some(swipe) = state.swipes.get_mut(id) {
                if matches!(swipe.state(), SwipeState::Committed(_)) {
                    swipe.reset();
                    actions.push(Action::Animate(Animation::Swipe {
                        id: *id,
                        effect: SwipeEffect::SnapBack,
                    }));
                }
            }
        }
        _ => {}
    }

    actions.push(surface(state, kind, message.to_string()));
    actions
}
