//! Live, ordered, filtered views over the [`Store`].
//!
//! A [`QueryLayer`] owns a dispatcher thread. The store notifies it after every commit;
//! the dispatcher re-runs each registered query shape once and pushes the fresh
//! [`Snapshot`] to every [`Subscription`] of that shape. Bursts of commits are
//! coalesced, so a slow consumer sees the latest revision rather than every
//! intermediate one.
//!
//! Mutations never wait on the dispatcher: the commit listener only posts a signal.
//!
//! # Modules
//!
//! - `subscription`: [`Subscription`] handle and the observer registry

pub mod subscription;

use crate::domain::error::{Result, TaskListError};
use crate::domain::{Category, Item};
use crate::storage::sqlite::{self, ListenerId, Store};
use crate::storage::{ItemFilter, Snapshot};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use subscription::{broadcast, Registry, Shape};

pub use subscription::Subscription;

enum Signal {
    Changed(u64),
    Shutdown,
}

/// Factory for live queries. Dropping it stops the dispatcher; existing
/// subscriptions then report disconnection.
pub struct QueryLayer {
    store: Store,
    registry: Arc<Registry>,
    listener: ListenerId,
    signals: Mutex<Sender<Signal>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl QueryLayer {
    /// Starts the dispatcher thread and hooks it to `store` commits.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Io`] if the thread cannot be spawned.
    pub fn new(store: Store) -> Result<Self> {
        let registry = Arc::new(Registry::default());
        let (tx, rx) = mpsc::channel();

        let dispatcher = std::thread::Builder::new()
            .name("tasklist-query".to_string())
            .spawn({
                let store = store.clone();
                let registry = Arc::clone(&registry);
                move || dispatch_loop(&store, &registry, &rx)
            })?;

        let listener_tx = Mutex::new(tx.clone());
        let listener = store.on_commit(move |revision| {
            if let Ok(tx) = listener_tx.lock() {
                let _ = tx.send(Signal::Changed(revision));
            }
        });

        tracing::debug!("query layer started");
        Ok(Self {
            store,
            registry,
            listener,
            signals: Mutex::new(tx),
            dispatcher: Some(dispatcher),
        })
    }

    /// Every live item in global order.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn all(&self) -> Result<Subscription<Vec<Item>>> {
        self.watch_items(ItemFilter::ALL)
    }

    /// Live items of one category, in global order.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn by_category(&self, category: Category) -> Result<Subscription<Vec<Item>>> {
        self.watch_items(ItemFilter::category(category))
    }

    /// Live items with the given completion state, in global order.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn by_status(&self, completed: bool) -> Result<Subscription<Vec<Item>>> {
        self.watch_items(ItemFilter::status(completed))
    }

    /// Live items matching both constraints, in global order.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn by_category_and_status(
        &self,
        category: Category,
        completed: bool,
    ) -> Result<Subscription<Vec<Item>>> {
        self.watch_items(ItemFilter::category_and_status(category, completed))
    }

    /// Live count of all items.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn count(&self) -> Result<Subscription<usize>> {
        self.watch_count(ItemFilter::ALL)
    }

    /// Live count of one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn count_by_category(&self, category: Category) -> Result<Subscription<usize>> {
        self.watch_count(ItemFilter::category(category))
    }

    /// Subscribes to an arbitrary item filter.
    ///
    /// The initial snapshot is read and the observer registered under the registry
    /// lock, so no commit can fall between the two.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn watch_items(&self, filter: ItemFilter) -> Result<Subscription<Vec<Item>>> {
        let (tx, rx) = mpsc::channel();
        let mut registry = self.registry.lock()?;
        let snapshot = self.store.read(|conn| sqlite::select_items(conn, &filter))?;
        tracing::debug!(?filter, revision = snapshot.revision, "items subscription opened");
        let _ = tx.send(snapshot);
        let id = registry.add_items(filter, tx);
        drop(registry);
        Ok(Subscription::new(rx, Shape::Items(filter), id, Arc::downgrade(&self.registry)))
    }

    /// Subscribes to the count of an arbitrary filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub fn watch_count(&self, filter: ItemFilter) -> Result<Subscription<usize>> {
        let (tx, rx) = mpsc::channel();
        let mut registry = self.registry.lock()?;
        let snapshot = self.store.read(|conn| sqlite::count_items(conn, &filter))?;
        let _ = tx.send(snapshot);
        let id = registry.add_count(filter, tx);
        drop(registry);
        Ok(Subscription::new(rx, Shape::Count(filter), id, Arc::downgrade(&self.registry)))
    }

    /// One-shot read of `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn snapshot(&self, filter: &ItemFilter) -> Result<Snapshot<Vec<Item>>> {
        self.store.query_items(filter)
    }

    /// One-shot count of `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_now(&self, filter: &ItemFilter) -> Result<Snapshot<usize>> {
        self.store.count_items(filter)
    }

    /// Number of open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().map_or(0, |inner| inner.len())
    }
}

impl Drop for QueryLayer {
    fn drop(&mut self) {
        self.store.remove_listener(self.listener);
        if let Ok(tx) = self.signals.lock() {
            let _ = tx.send(Signal::Shutdown);
        }
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                tracing::error!("query dispatcher panicked");
            }
        }
        tracing::debug!("query layer stopped");
    }
}

impl std::fmt::Debug for QueryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryLayer")
            .field("store", &self.store)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

fn dispatch_loop(store: &Store, registry: &Registry, rx: &Receiver<Signal>) {
    while let Ok(signal) = rx.recv() {
        let Signal::Changed(mut revision) = signal else {
            break;
        };
        let mut shutdown = false;
        while let Ok(next) = rx.try_recv() {
            match next {
                Signal::Changed(later) => revision = revision.max(later),
                Signal::Shutdown => shutdown = true,
            }
        }
        if shutdown {
            break;
        }

        let _span = tracing::debug_span!("refresh_queries", revision).entered();
        if let Err(e) = refresh(store, registry) {
            tracing::warn!(error = %e, "failed to refresh live queries");
        }
    }
    tracing::debug!("query dispatcher exiting");
}

fn refresh(store: &Store, registry: &Registry) -> Result<()> {
    let mut inner = registry.lock()?;

    let mut failure: Option<TaskListError> = None;
    for (filter, observers) in &mut inner.items {
        match store.read(|conn| sqlite::select_items(conn, filter)) {
            Ok(snapshot) => broadcast(observers, &snapshot),
            Err(e) => failure = Some(e),
        }
    }
    for (filter, observers) in &mut inner.counts {
        match store.read(|conn| sqlite::count_items(conn, filter)) {
            Ok(snapshot) => broadcast(observers, &snapshot),
            Err(e) => failure = Some(e),
        }
    }
    inner.items.retain(|_, observers| !observers.is_empty());
    inner.counts.retain(|_, observers| !observers.is_empty());

    failure.map_or(Ok(()), Err)
}
