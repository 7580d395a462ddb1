//! Undo-window timers for pending deletes.
//!
//! Each scheduled id is committed exactly once when its window elapses, unless it is
//! cancelled first. The thread owns the timer table; callers only send
//! [`UndoMessage`]s, so scheduling never blocks on the store.

use crate::domain::error::{Result, TaskListError};
use crate::domain::ItemId;
use crate::service::MutationService;
use crate::worker::messages::{TraceContext, UndoMessage};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Finalizes one pending delete. Returns whether anything was removed.
pub type Committer = Box<dyn FnMut(ItemId) -> Result<bool> + Send>;

struct Timer {
    deadline: Instant,
    trace_context: Option<TraceContext>,
}

/// Background thread that commits pending deletes after their undo window.
pub struct UndoScheduler {
    tx: Mutex<Sender<UndoMessage>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    window: Duration,
}

impl UndoScheduler {
    /// Starts the worker with an arbitrary committer.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Io`] if the thread cannot be spawned.
    pub fn new(
        window: Duration,
        committer: impl FnMut(ItemId) -> Result<bool> + Send + 'static,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let committer: Committer = Box::new(committer);
        let handle = std::thread::Builder::new()
            .name("tasklist-undo".to_string())
            .spawn(move || UndoWorker::new(committer).run(&rx))?;

        tracing::debug!(window_ms = window.as_millis(), "undo scheduler started");
        Ok(Self {
            tx: Mutex::new(tx),
            handle: Mutex::new(Some(handle)),
            window,
        })
    }

    /// Starts the worker committing through [`MutationService::commit_delete`].
    ///
    /// # Errors
    ///
    /// [`TaskListError::Io`] if the thread cannot be spawned.
    pub fn with_service(service: MutationService, window: Duration) -> Result<Self> {
        Self::new(window, move |id| service.commit_delete(id))
    }

    /// Default undo window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    fn send(&self, message: UndoMessage) -> Result<()> {
        let kind = message.kind();
        self.tx
            .lock()
            .map_err(|e| TaskListError::Worker(format!("undo channel poisoned: {e}")))?
            .send(message)
            .map_err(|_| TaskListError::Worker(format!("undo worker stopped, cannot {kind}")))
    }

    /// Schedules `id` for commit after the default window.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] if the worker has stopped.
    pub fn schedule(&self, id: ItemId) -> Result<()> {
        self.schedule_in(id, self.window)
    }

    /// Schedules `id` for commit after `window`.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] if the worker has stopped.
    pub fn schedule_in(&self, id: ItemId, window: Duration) -> Result<()> {
        self.send(UndoMessage::schedule(id, window))
    }

    /// Cancels the timer for `id`. A no-op if it already fired.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] if the worker has stopped.
    pub fn cancel(&self, id: ItemId) -> Result<()> {
        self.send(UndoMessage::Cancel { id })
    }

    /// Commits every scheduled delete now. Returns the number of timers fired.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] if the worker has stopped.
    pub fn flush(&self) -> Result<usize> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(UndoMessage::Flush(reply_tx))?;
        reply_rx
            .recv()
            .map_err(|_| TaskListError::Worker("undo worker stopped during flush".to_string()))
    }

    /// Commits everything still scheduled and stops the worker. Idempotent.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] if the worker thread panicked.
    pub fn shutdown(&self) -> Result<()> {
        let handle = self
            .handle
            .lock()
            .map_err(|e| TaskListError::Worker(format!("undo handle poisoned: {e}")))?
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };
        let _ = self.send(UndoMessage::Shutdown);
        handle
            .join()
            .map_err(|_| TaskListError::Worker("undo worker panicked".to_string()))
    }
}

impl Drop for UndoScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "undo scheduler did not stop cleanly");
        }
    }
}

impl std::fmt::Debug for UndoScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoScheduler")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

struct UndoWorker {
    committer: Committer,
    timers: HashMap<ItemId, Timer>,
}

impl UndoWorker {
    fn new(committer: Committer) -> Self {
        Self {
            committer,
            timers: HashMap::new(),
        }
    }

    fn run(mut self, rx: &Receiver<UndoMessage>) {
        loop {
            let message = match self.next_deadline() {
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            };

            match message {
                Ok(UndoMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    let committed = self.fire_all();
                    tracing::debug!(committed, "undo worker exiting");
                    return;
                }
                Ok(message) => self.handle(message),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.fire_due(Instant::now());
        }
    }

    fn handle(&mut self, message: UndoMessage) {
        match message {
            UndoMessage::Schedule {
                id,
                window,
                trace_context,
            } => {
                tracing::debug!(item_id = %id, window_ms = window.as_millis(), "undo timer armed");
                self.timers.insert(
                    id,
                    Timer {
                        deadline: Instant::now() + window,
                        trace_context,
                    },
                );
            }
            UndoMessage::Cancel { id } => {
                if self.timers.remove(&id).is_some() {
                    tracing::debug!(item_id = %id, "undo timer cancelled");
                }
            }
            UndoMessage::Flush(reply) => {
                let committed = self.fire_all();
                let _ = reply.send(committed);
            }
            UndoMessage::Shutdown => {}
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.deadline).min()
    }

    fn fire_due(&mut self, now: Instant) {
        let mut due: Vec<(ItemId, Instant)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .map(|(id, t)| (*id, t.deadline))
            .collect();
        due.sort_by_key(|(_, deadline)| *deadline);
        for (id, _) in due {
            self.fire(id);
        }
    }

    fn fire_all(&mut self) -> usize {
        let ids: Vec<ItemId> = self.timers.keys().copied().collect();
        ids.into_iter().filter(|id| self.fire(*id)).count()
    }

    /// Removes the timer before committing so each id fires at most once.
    fn fire(&mut self, id: ItemId) -> bool {
        let Some(timer) = self.timers.remove(&id) else {
            return false;
        };
        let _context_guard = timer.trace_context.as_ref().and_then(TraceContext::attach);
        let _span = tracing::debug_span!("undo_window_elapsed", item_id = %id).entered();

        match (self.committer)(id) {
            Ok(removed) => {
                tracing::debug!(removed, "pending delete finalized");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to finalize pending delete");
                false
            }
        }
    }
}
