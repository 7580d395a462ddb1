//! Subscription handles and the observer registry behind them.

use crate::domain::error::{Result, TaskListError};
use crate::domain::Item;
use crate::storage::{ItemFilter, Snapshot};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

/// Which registry table a subscription lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Shape {
    Items(ItemFilter),
    Count(ItemFilter),
}

type Observers<T> = HashMap<ItemFilter, Vec<(u64, Sender<Snapshot<T>>)>>;

/// Observers grouped by query shape so each shape is evaluated once per commit.
#[derive(Default)]
pub(crate) struct RegistryInner {
    next_id: u64,
    pub(crate) items: Observers<Vec<Item>>,
    pub(crate) counts: Observers<usize>,
}

impl RegistryInner {
    pub(crate) fn add_items(&mut self, filter: ItemFilter, tx: Sender<Snapshot<Vec<Item>>>) -> u64 {
        self.next_id += 1;
        self.items.entry(filter).or_default().push((self.next_id, tx));
        self.next_id
    }

    pub(crate) fn add_count(&mut self, filter: ItemFilter, tx: Sender<Snapshot<usize>>) -> u64 {
        self.next_id += 1;
        self.counts.entry(filter).or_default().push((self.next_id, tx));
        self.next_id
    }

    fn remove(&mut self, shape: Shape, id: u64) {
        match shape {
            Shape::Items(filter) => remove_observer(&mut self.items, filter, id),
            Shape::Count(filter) => remove_observer(&mut self.counts, filter, id),
        }
    }

    /// Number of live subscriptions across both tables.
    pub(crate) fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum::<usize>()
            + self.counts.values().map(Vec::len).sum::<usize>()
    }
}

fn remove_observer<T>(table: &mut Observers<T>, filter: ItemFilter, id: u64) {
    if let Some(observers) = table.get_mut(&filter) {
        observers.retain(|(observer, _)| *observer != id);
        if observers.is_empty() {
            table.remove(&filter);
        }
    }
}

/// Sends `snapshot` to every observer of one shape, dropping disconnected ones.
pub(crate) fn broadcast<T: Clone>(observers: &mut Vec<(u64, Sender<Snapshot<T>>)>, snapshot: &Snapshot<T>) {
    observers.retain(|(_, tx)| tx.send(snapshot.clone()).is_ok());
}

#[derive(Default)]
pub(crate) struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, RegistryInner>> {
        self.inner
            .lock()
            .map_err(|e| TaskListError::Worker(format!("subscription registry poisoned: {e}")))
    }
}

/// A live view. Receives the current snapshot immediately, then one per commit.
///
/// Snapshots older than or equal to the last one delivered are skipped, so the
/// revision observed through one subscription never goes backwards. Dropping the
/// handle (or calling [`Subscription::cancel`]) unregisters it.
pub struct Subscription<T> {
    rx: Receiver<Snapshot<T>>,
    shape: Shape,
    id: u64,
    registry: Weak<Registry>,
    latest: Option<Snapshot<T>>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(rx: Receiver<Snapshot<T>>, shape: Shape, id: u64, registry: Weak<Registry>) -> Self {
        Self {
            rx,
            shape,
            id,
            registry,
            latest: None,
        }
    }

    /// The filter this subscription was created for.
    #[must_use]
    pub const fn filter(&self) -> ItemFilter {
        match self.shape {
            Shape::Items(filter) | Shape::Count(filter) => filter,
        }
    }

    fn accept(&mut self, snapshot: Snapshot<T>) -> Option<Snapshot<T>> {
        if self
            .latest
            .as_ref()
            .is_some_and(|seen| snapshot.revision <= seen.revision)
        {
            return None;
        }
        self.latest = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Blocks until the next snapshot arrives.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] once the query layer has shut down.
    pub fn recv(&mut self) -> Result<Snapshot<T>> {
        loop {
            let snapshot = self.rx.recv().map_err(|_| disconnected())?;
            if let Some(snapshot) = self.accept(snapshot) {
                return Ok(snapshot);
            }
        }
    }

    /// Waits up to `timeout` for the next snapshot.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] once the query layer has shut down.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Snapshot<T>>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(snapshot) => {
                    if let Some(snapshot) = self.accept(snapshot) {
                        return Ok(Some(snapshot));
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(disconnected()),
            }
        }
    }

    /// Returns the next queued snapshot without blocking.
    pub fn try_recv(&mut self) -> Option<Snapshot<T>> {
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => {
                    if let Some(snapshot) = self.accept(snapshot) {
                        return Some(snapshot);
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Drains everything queued and returns the newest snapshot seen so far.
    pub fn latest(&mut self) -> Option<&Snapshot<T>> {
        while self.try_recv().is_some() {}
        self.latest.as_ref()
    }

    /// Blocks until a snapshot at or after `revision` arrives, or `timeout` passes.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Worker`] on timeout or once the query layer has shut down.
    pub fn wait_for_revision(&mut self, revision: u64, timeout: Duration) -> Result<Snapshot<T>> {
        if let Some(seen) = self.latest.as_ref().filter(|s| s.revision >= revision) {
            return Ok(seen.clone());
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.recv_timeout(remaining)? {
                Some(snapshot) if snapshot.revision >= revision => return Ok(snapshot),
                Some(_) => {}
                None => {
                    return Err(TaskListError::Worker(format!(
                        "timed out waiting for revision {revision}"
                    )))
                }
            }
        }
    }

    /// Unregisters the subscription. Equivalent to dropping it.
    pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut inner) = registry.lock() {
                inner.remove(self.shape, self.id);
            }
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("shape", &self.shape)
            .field("id", &self.id)
            .field("revision", &self.latest.as_ref().map(|s| s.revision))
            .finish()
    }
}

fn disconnected() -> TaskListError {
    TaskListError::Worker("query layer shut down".to_string())
}
