//! Executes the actions produced by [`handle_event`].
//!
//! [`Runtime`] owns an [`AppState`] and the live view subscription. Persistence and
//! timer actions run against the services; their results are fed back as events
//! until the queue is drained. Whatever is left for the renderer is returned.

use crate::app::state::{AppSettings, FailureKind};
use crate::app::{handle_event, Action, AppState, Event};
use crate::domain::error::Result;
use crate::domain::Item;
use crate::query::{QueryLayer, Subscription};
use crate::service::{Mutation, MutationService};
use crate::storage::ItemFilter;
use crate::worker::UndoScheduler;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub struct Runtime {
    state: AppState,
    service: MutationService,
    queries: Arc<QueryLayer>,
    undo: Arc<UndoScheduler>,
    view: Subscription<Vec<Item>>,
}

impl Runtime {
    /// Opens the unfiltered view and installs its first snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn new(
        service: MutationService,
        queries: Arc<QueryLayer>,
        undo: Arc<UndoScheduler>,
        settings: AppSettings,
    ) -> Result<Self> {
        let view = queries.watch_items(ItemFilter::ALL)?;
        let mut runtime = Self {
            state: AppState::new(settings),
            service,
            queries,
            undo,
            view,
        };
        runtime.poll()?;
        Ok(runtime)
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Handles `event` and everything it causes. Returns presentation actions.
    ///
    /// # Errors
    ///
    /// Fatal store errors and undo worker failures. Non-fatal mutation failures are
    /// turned into [`Event::MutationFailed`] instead.
    pub fn dispatch(&mut self, event: Event) -> Result<Vec<Action>> {
        let mut queue = VecDeque::from([event]);
        let mut output = Vec::new();

        while let Some(event) = queue.pop_front() {
            let (changed, actions) = handle_event(&mut self.state, &event)?;
            if changed
                && matches!(event, Event::ViewSnapshot(_))
                && !self.state.undo_stack.is_empty()
            {
                // The undo worker commits behind the coordinator's back.
                let pending = self.service.store().pending_ids()?;
                queue.push_back(Event::PendingSynced(pending));
            }
            for action in actions {
                self.execute(action, &mut queue, &mut output)?;
            }
        }
        Ok(output)
    }

    fn execute(
        &mut self,
        action: Action,
        queue: &mut VecDeque<Event>,
        output: &mut Vec<Action>,
    ) -> Result<()> {
        match action {
            Action::Persist(mutation) => match self.service.apply(&mutation) {
                Ok(outcome) => queue.push_back(Event::MutationSucceeded(outcome)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => queue.push_back(failed(mutation, &e)),
            },
            Action::Retry => {
                let remembered = self.service.last_failed();
                match self.service.retry_last() {
                    Ok(Some(outcome)) => queue.push_back(Event::MutationSucceeded(outcome)),
                    Ok(None) => tracing::debug!("nothing to retry"),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        if let Some(mutation) = remembered {
                            queue.push_back(failed(mutation, &e));
                        }
                    }
                }
            }
            Action::ScheduleUndo { id, window } => self.undo.schedule_in(id, window)?,
            Action::CancelUndo { id } => self.undo.cancel(id)?,
            Action::WatchView(filter) => {
                self.view = self.queries.watch_items(filter)?;
                self.drain_view(queue);
            }
            presentation => output.push(presentation),
        }
        Ok(())
    }

    fn drain_view(&mut self, queue: &mut VecDeque<Event>) {
        while let Some(snapshot) = self.view.try_recv() {
            queue.push_back(Event::ViewSnapshot(snapshot));
        }
    }

    /// Delivers every queued view emission.
    ///
    /// # Errors
    ///
    /// Same as [`Runtime::dispatch`].
    pub fn poll(&mut self) -> Result<Vec<Action>> {
        let mut output = Vec::new();
        while let Some(snapshot) = self.view.try_recv() {
            output.extend(self.dispatch(Event::ViewSnapshot(snapshot))?);
        }
        Ok(output)
    }

    /// Waits until the view reflects every commit made so far, then delivers it.
    ///
    /// # Errors
    ///
    /// [`crate::TaskListError::Worker`] if the emission does not arrive in time.
    pub fn sync(&mut self, timeout: Duration) -> Result<Vec<Action>> {
        let revision = self.service.store().revision();
        let snapshot = self.view.wait_for_revision(revision, timeout)?;
        let mut output = self.dispatch(Event::ViewSnapshot(snapshot))?;
        output.extend(self.poll()?);
        Ok(output)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("filter", &self.state.filter)
            .field("items", &self.state.items.len())
            .field("revision", &self.state.revision)
            .finish_non_exhaustive()
    }
}

fn failed(mutation: Mutation, err: &crate::TaskListError) -> Event {
    Event::MutationFailed {
        mutation,
        kind: FailureKind::of(err),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ItemId};
    use crate::gesture::{DragEvent, SwipeEvent};
    use crate::storage::{Store, CURRENT_SCHEMA_VERSION};

    const WAIT: Duration = Duration::from_secs(5);

    fn runtime(window: Duration) -> Runtime {
        let store = Store::open_in_memory(CURRENT_SCHEMA_VERSION).unwrap();
        let service = MutationService::new(store.clone());
        let queries = Arc::new(QueryLayer::new(store).unwrap());
        let undo = Arc::new(UndoScheduler::with_service(service.clone(), window).unwrap());
        Runtime::new(
            service,
            queries,
            undo,
            AppSettings {
                min_drag_distance: 0.0,
                swipe_threshold: 50.0,
                row_extent: 100.0,
                undo_window: window,
                ..AppSettings::default()
            },
        )
        .unwrap()
    }

    fn add(rt: &mut Runtime, text: &str) {
        rt.dispatch(Event::AddItem {
            text: text.into(),
            category: Category::Work,
        })
        .unwrap();
    }

    fn texts(rt: &Runtime) -> Vec<String> {
        rt.state().items.iter().map(|i| i.text.clone()).collect()
    }

    #[test]
    fn drag_reorder_round_trips_through_store() {
        let mut rt = runtime(Duration::from_secs(60));
        add(&mut rt, "a");
        add(&mut rt, "b");
        add(&mut rt, "c");
        rt.sync(WAIT).unwrap();
        assert_eq!(texts(&rt), ["a", "b", "c"]);

        rt.dispatch(Event::Drag(DragEvent::Start { index: 0 })).unwrap();
        rt.dispatch(Event::Drag(DragEvent::Move { delta_y: 260.0 })).unwrap();
        rt.dispatch(Event::Drag(DragEvent::End)).unwrap();
        rt.sync(WAIT).unwrap();

        assert_eq!(texts(&rt), ["b", "c", "a"]);
        let orders: Vec<i64> = rt.state().items.iter().map(|i| i.sort_order).collect();
        assert_eq!(orders, [0, 1, 2]);
    }

    #[test]
    fn swipe_delete_then_undo_restores_item() {
        let mut rt = runtime(Duration::from_secs(60));
        add(&mut rt, "keep");
        add(&mut rt, "gone");
        rt.sync(WAIT).unwrap();
        let id = rt.state().items[1].id;

        rt.dispatch(Event::Swipe { id, event: SwipeEvent::Start }).unwrap();
        rt.dispatch(Event::Swipe {
            id,
            event: SwipeEvent::Move { delta_x: -70.0 },
        })
        .unwrap();
        let shown = rt.dispatch(Event::Swipe { id, event: SwipeEvent::End }).unwrap();
        assert!(shown.iter().any(|a| matches!(a, Action::ShowUndo { .. })));
        rt.sync(WAIT).unwrap();
        assert_eq!(texts(&rt), ["keep"]);

        rt.dispatch(Event::Undo).unwrap();
        rt.sync(WAIT).unwrap();
        assert_eq!(texts(&rt), ["keep", "gone"]);
        assert_eq!(rt.state().items[1].sort_order, 1);
    }

    #[test]
    fn undo_window_expiry_commits_delete() {
        let mut rt = runtime(Duration::from_millis(20));
        add(&mut rt, "short-lived");
        rt.sync(WAIT).unwrap();
        let id = rt.state().items[0].id;

        rt.dispatch(Event::DeleteRequested { id }).unwrap();
        assert_eq!(rt.state().undo_stack.len(), 1);
        let deadline = std::time::Instant::now() + WAIT;
        while !rt.service.store().pending_ids().unwrap().is_empty() {
            assert!(std::time::Instant::now() < deadline, "undo timer never fired");
            std::thread::sleep(Duration::from_millis(10));
        }

        let shown = rt.sync(WAIT).unwrap();
        assert!(rt.state().undo_stack.is_empty());
        assert!(shown.contains(&Action::HideUndo));
        assert!(rt.service.store().get(id).unwrap().is_none());

        assert!(rt.dispatch(Event::Undo).unwrap().is_empty());
        assert!(rt.state().last_error.is_none());
    }

    #[test]
    fn concurrent_delete_surfaces_not_found() {
        let mut rt = runtime(Duration::from_secs(60));
        let shown = rt.dispatch(Event::ToggleCompleted { id: ItemId(404) }).unwrap();
        assert_eq!(
            shown,
            vec![Action::ShowError {
                message: "Item not found: 404".into(),
                retry: true
            }]
        );
    }

    #[test]
    fn filter_change_rebinds_view() {
        let mut rt = runtime(Duration::from_secs(60));
        add(&mut rt, "report");
        rt.dispatch(Event::AddItem {
            text: "apples".into(),
            category: Category::Shopping,
        })
        .unwrap();
        rt.sync(WAIT).unwrap();

        rt.dispatch(Event::FilterChanged(ItemFilter::category(Category::Shopping)))
            .unwrap();
        assert_eq!(texts(&rt), ["apples"]);
    }
}
