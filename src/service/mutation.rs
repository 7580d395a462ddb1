//! The only write path into the store.
//!
//! [`MutationService`] validates input, runs each operation as one store transaction,
//! and keeps the data-model invariants:
//!
//! - new items go to the end of the global order (`max + 1`, or `0` when empty);
//! - text, category, and completion are edited independently, each as a full
//!   read-modify-write of the row inside one transaction;
//! - a reorder rewrites `sortOrder` to `0..n` over every live item and is rejected
//!   with [`TaskListError::Concurrency`] when computed from a stale id set;
//! - deletes go through the pending state first and can be restored with the exact
//!   previous `sortOrder`.

use crate::domain::error::{Result, TaskListError};
use crate::domain::{normalize_text, Category, Item, ItemId, NewItem};
use crate::service::commands::{Mutation, MutationOutcome};
use crate::storage::sqlite::{self, Store};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Source of creation timestamps in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Validated, transactional mutations over a [`Store`].
///
/// Cloning is cheap; clones share the store and the remembered failed operation.
///
/// # Examples
///
/// ```
/// use tasklist::{Category, MutationService};
/// use tasklist::storage::{Store, CURRENT_SCHEMA_VERSION};
///
/// let store = Store::open_in_memory(CURRENT_SCHEMA_VERSION)?;
/// let service = MutationService::new(store);
/// let milk = service.insert("buy milk", Category::Shopping)?;
/// let done = service.toggle_completed(milk.id)?;
/// assert!(done.completed);
/// # Ok::<(), tasklist::TaskListError>(())
/// ```
#[derive(Clone)]
pub struct MutationService {
    store: Store,
    clock: Clock,
    last_failed: Arc<Mutex<Option<Mutation>>>,
}

impl MutationService {
    /// Creates a service stamping items with the wall clock.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, Arc::new(|| chrono::Utc::now().timestamp_millis()))
    }

    /// Creates a service with a custom timestamp source.
    #[must_use]
    pub fn with_clock(store: Store, clock: Clock) -> Self {
        Self {
            store,
            clock,
            last_failed: Arc::new(Mutex::new(None)),
        }
    }

    /// The underlying store handle.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Creates an item at the end of the global order.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Validation`] if `text` is blank (nothing is written), or a
    /// storage error.
    pub fn insert(&self, text: &str, category: Category) -> Result<Item> {
        let text = normalize_text(text)?;
        let created_at = (self.clock)();
        let result = self.store.write("insert", |tx| {
            let sort_order = sqlite::max_sort_order(tx)?.map_or(0, |max| max + 1);
            sqlite::insert_row(
                tx,
                &NewItem {
                    text: text.clone(),
                    category,
                    sort_order,
                    created_at,
                },
            )
        });
        if let Ok(item) = &result {
            tracing::debug!(item_id = %item.id, sort_order = item.sort_order, "item inserted");
        }
        self.track(|| Mutation::Insert { text, category }, result)
    }

    /// Replaces the text of an item.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Validation`] for blank text, [`TaskListError::NotFound`] if the
    /// item is gone or pending deletion, or a storage error.
    pub fn update_text(&self, id: ItemId, text: &str) -> Result<Item> {
        let text = normalize_text(text)?;
        let result = self.modify("update_text", id, |item| item.text.clone_from(&text));
        self.track(|| Mutation::UpdateText { id, text }, result)
    }

    /// Changes the category of an item.
    ///
    /// # Errors
    ///
    /// [`TaskListError::NotFound`] or a storage error.
    pub fn update_category(&self, id: ItemId, category: Category) -> Result<Item> {
        let result = self.modify("update_category", id, |item| item.category = category);
        self.track(|| Mutation::UpdateCategory { id, category }, result)
    }

    /// Flips the completion flag of an item.
    ///
    /// # Errors
    ///
    /// [`TaskListError::NotFound`] or a storage error.
    pub fn toggle_completed(&self, id: ItemId) -> Result<Item> {
        let result = self.modify("toggle_completed", id, |item| item.completed = !item.completed);
        self.track(|| Mutation::ToggleCompleted { id }, result)
    }

    fn modify(&self, operation: &'static str, id: ItemId, edit: impl FnOnce(&mut Item)) -> Result<Item> {
        self.store.write(operation, |tx| {
            let mut item = sqlite::load_item(tx, id)?.ok_or(TaskListError::NotFound(id))?;
            edit(&mut item);
            sqlite::write_row(tx, &item)?;
            Ok(item)
        })
    }

    /// Rewrites the global order to `ids`, which must be exactly the live id set.
    ///
    /// Returns the order that was written.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Concurrency`] if `ids` is not a permutation of the current live
    /// ids (nothing is written), or a storage error.
    pub fn reorder(&self, ids: &[ItemId]) -> Result<Vec<ItemId>> {
        let _span = tracing::debug_span!("reorder", count = ids.len()).entered();
        let result = self.store.write("reorder", |tx| {
            let live = sqlite::live_ids(tx)?;
            ensure_permutation(&live, ids)?;
            sqlite::assign_sort_orders(tx, ids)?;
            Ok(ids.to_vec())
        });
        self.track(|| Mutation::Reorder { ids: ids.to_vec() }, result)
    }

    /// Reorders a subset of live items (for example one category) inside the slots
    /// the subset already occupies, then renumbers every live item densely.
    ///
    /// Returns the full order that was written.
    ///
    /// # Errors
    ///
    /// [`TaskListError::Concurrency`] if an id is unknown, pending, or repeated.
    pub fn reorder_within(&self, ids: &[ItemId]) -> Result<Vec<ItemId>> {
        let _span = tracing::debug_span!("reorder_within", count = ids.len()).entered();
        let result = self.store.write("reorder_within", |tx| {
            let live = sqlite::live_ids(tx)?;
            let order = merge_subset_order(&live, ids)?;
            sqlite::assign_sort_orders(tx, &order)?;
            Ok(order)
        });
        self.track(|| Mutation::ReorderWithin { ids: ids.to_vec() }, result)
    }

    /// Hides an item from every query and holds it for undo.
    ///
    /// The caller is responsible for eventually calling [`Self::commit_delete`]
    /// (normally via [`crate::worker::UndoScheduler`]) or [`Self::restore`].
    ///
    /// # Errors
    ///
    /// [`TaskListError::NotFound`] if the item is gone or already pending.
    pub fn delete_pending(&self, id: ItemId) -> Result<Item> {
        let result = self.store.write("delete_pending", |tx| {
            let item = sqlite::load_item(tx, id)?.ok_or(TaskListError::NotFound(id))?;
            sqlite::mark_pending(tx, id)?;
            Ok(item)
        });
        if result.is_ok() {
            tracing::debug!(item_id = %id, "item pending deletion");
        }
        self.track(|| Mutation::DeletePending { id }, result)
    }

    /// Permanently removes a pending item.
    ///
    /// Idempotent: returns `Ok(false)` if the id is not pending (already committed or
    /// restored), without touching the store.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn commit_delete(&self, id: ItemId) -> Result<bool> {
        let result = self.store.write("commit_delete", |tx| {
            if !sqlite::unmark_pending(tx, id)? {
                return Ok(false);
            }
            sqlite::delete_row(tx, id)
        });
        if let Ok(removed) = result {
            tracing::debug!(item_id = %id, removed, "pending delete committed");
        }
        self.track(|| Mutation::CommitDelete { id }, result)
    }

    /// Cancels a pending delete.
    ///
    /// The item keeps its previous `sortOrder` unless a reorder handed that value to
    /// another live item meanwhile. In that case it goes in front of the items that
    /// held the same or a higher value, and the live order is renumbered densely.
    ///
    /// # Errors
    ///
    /// [`TaskListError::NotFound`] if the id is not pending any more.
    pub fn restore(&self, id: ItemId) -> Result<Item> {
        let result = self.store.write("restore", |tx| {
            if !sqlite::unmark_pending(tx, id)? {
                return Err(TaskListError::NotFound(id));
            }
            let item = sqlite::load_item(tx, id)?.ok_or(TaskListError::NotFound(id))?;
            let (slot, taken) = sqlite::sort_order_rank(tx, id, item.sort_order)?;
            if !taken {
                return Ok(item);
            }
            let mut order = sqlite::live_ids(tx)?;
            order.retain(|live| *live != id);
            order.insert(slot.min(order.len()), id);
            sqlite::assign_sort_orders(tx, &order)?;
            sqlite::load_item(tx, id)?.ok_or(TaskListError::NotFound(id))
        });
        if result.is_ok() {
            tracing::debug!(item_id = %id, "pending delete restored");
        }
        self.track(|| Mutation::Restore { id }, result)
    }

    /// Permanently removes every completed item. Not undo-protected.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub fn delete_all_completed(&self) -> Result<usize> {
        let result = self
            .store
            .write("delete_all_completed", |tx| sqlite::delete_completed(tx));
        if let Ok(count) = result {
            tracing::debug!(count, "completed items purged");
        }
        self.track(|| Mutation::DeleteAllCompleted, result)
    }

    /// Applies a described mutation.
    ///
    /// # Errors
    ///
    /// Whatever the corresponding typed method returns.
    pub fn apply(&self, mutation: &Mutation) -> Result<MutationOutcome> {
        let _span = tracing::debug_span!("apply_mutation", op = mutation.name()).entered();
        match mutation {
            Mutation::Insert { text, category } => {
                self.insert(text, *category).map(MutationOutcome::Inserted)
            }
            Mutation::UpdateText { id, text } => {
                self.update_text(*id, text).map(MutationOutcome::Updated)
            }
            Mutation::UpdateCategory { id, category } => self
                .update_category(*id, *category)
                .map(MutationOutcome::Updated),
            Mutation::ToggleCompleted { id } => {
                self.toggle_completed(*id).map(MutationOutcome::Updated)
            }
            Mutation::Reorder { ids } => self.reorder(ids).map(MutationOutcome::Reordered),
            Mutation::ReorderWithin { ids } => {
                self.reorder_within(ids).map(MutationOutcome::Reordered)
            }
            Mutation::DeletePending { id } => {
                self.delete_pending(*id).map(MutationOutcome::PendingDelete)
            }
            Mutation::CommitDelete { id } => self
                .commit_delete(*id)
                .map(|removed| MutationOutcome::DeleteCommitted { id: *id, removed }),
            Mutation::Restore { id } => self.restore(*id).map(MutationOutcome::Restored),
            Mutation::DeleteAllCompleted => self
                .delete_all_completed()
                .map(MutationOutcome::CompletedPurged),
        }
    }

    /// The most recent operation that failed with a retryable error, if any.
    #[must_use]
    pub fn last_failed(&self) -> Option<Mutation> {
        self.last_failed.lock().ok().and_then(|slot| slot.clone())
    }

    /// Re-issues the remembered failed operation once.
    ///
    /// Returns `Ok(None)` when there is nothing to retry. On success the remembered
    /// operation is cleared; if it fails again with a retryable error it stays
    /// remembered.
    ///
    /// # Errors
    ///
    /// The error of the re-issued operation.
    pub fn retry_last(&self) -> Result<Option<MutationOutcome>> {
        let pending = match self.last_failed.lock() {
            Ok(mut slot) => slot.take(),
            Err(e) => return Err(TaskListError::Storage(format!("retry slot poisoned: {e}"))),
        };
        let Some(mutation) = pending else {
            return Ok(None);
        };
        tracing::info!(op = mutation.name(), "retrying failed mutation");
        self.apply(&mutation).map(Some)
    }

    fn track<T>(&self, describe: impl FnOnce() -> Mutation, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_retryable() {
                let mutation = describe();
                tracing::warn!(op = mutation.name(), error = %err, "mutation failed, remembered for retry");
                if let Ok(mut slot) = self.last_failed.lock() {
                    *slot = Some(mutation);
                }
            } else {
                tracing::debug!(error = %err, "mutation rejected");
            }
        }
        result
    }
}

impl fmt::Debug for MutationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationService")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

fn ensure_permutation(live: &[ItemId], supplied: &[ItemId]) -> Result<()> {
    let live_set: HashSet<ItemId> = live.iter().copied().collect();
    let supplied_set: HashSet<ItemId> = supplied.iter().copied().collect();
    if supplied.len() != live.len() || supplied_set.len() != supplied.len() || live_set != supplied_set {
        return Err(TaskListError::Concurrency(format!(
            "reorder of {} ids does not match the {} live items",
            supplied.len(),
            live.len()
        )));
    }
    Ok(())
}

/// Places `subset` (in its new order) into the positions its ids occupy in `global`.
///
/// Ids outside the subset keep their positions.
///
/// # Errors
///
/// [`TaskListError::Concurrency`] if `subset` repeats an id or names one that is not in
/// `global`.
pub fn merge_subset_order(global: &[ItemId], subset: &[ItemId]) -> Result<Vec<ItemId>> {
    let wanted: HashSet<ItemId> = subset.iter().copied().collect();
    if wanted.len() != subset.len() {
        return Err(TaskListError::Concurrency(
            "reorder names the same item twice".to_string(),
        ));
    }

    let slots: Vec<usize> = global
        .iter()
        .enumerate()
        .filter(|(_, id)| wanted.contains(id))
        .map(|(slot, _)| slot)
        .collect();
    if slots.len() != subset.len() {
        return Err(TaskListError::Concurrency(format!(
            "{} of {} reordered items are no longer live",
            subset.len() - slots.len(),
            subset.len()
        )));
    }

    let mut order = global.to_vec();
    for (slot, id) in slots.into_iter().zip(subset) {
        order[slot] = *id;
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ItemFilter, CURRENT_SCHEMA_VERSION};
    use std::sync::atomic::{AtomicI64, Ordering};

    fn service() -> MutationService {
        let store = Store::open_in_memory(CURRENT_SCHEMA_VERSION).unwrap();
        let tick = Arc::new(AtomicI64::new(1_000));
        MutationService::with_clock(store, Arc::new(move || tick.fetch_add(1, Ordering::SeqCst)))
    }

    fn ids(items: &[Item]) -> Vec<ItemId> {
        items.iter().map(|i| i.id).collect()
    }

    fn all(service: &MutationService) -> Vec<Item> {
        service.store().query_items(&ItemFilter::ALL).unwrap().value
    }

    #[test]
    fn insert_appends_to_order() {
        let service = service();
        let a = service.insert("a", Category::Work).unwrap();
        let b = service.insert("  b  ", Category::Work).unwrap();
        assert_eq!(a.sort_order, 0);
        assert_eq!(b.sort_order, 1);
        assert_eq!(b.text, "b");
        assert!(!b.completed);
        assert_eq!(all(&service), vec![a, b]);
    }

    #[test]
    fn blank_insert_writes_nothing() {
        let service = service();
        let err = service.insert("   ", Category::Other).unwrap_err();
        assert!(matches!(err, TaskListError::Validation(_)));
        assert_eq!(service.store().revision(), 0);
        assert!(service.last_failed().is_none());
    }

    #[test]
    fn attribute_edits_do_not_touch_other_fields() {
        let service = service();
        let item = service.insert("walk", Category::Health).unwrap();

        let recat = service.update_category(item.id, Category::Personal).unwrap();
        assert_eq!(
            (&recat.text, recat.completed, recat.sort_order),
            (&item.text, item.completed, item.sort_order)
        );

        let toggled = service.toggle_completed(item.id).unwrap();
        assert!(toggled.completed);
        assert_eq!(
            (&toggled.text, toggled.category, toggled.sort_order),
            (&recat.text, recat.category, recat.sort_order)
        );

        let renamed = service.update_text(item.id, "run").unwrap();
        assert_eq!(renamed.text, "run");
        assert_eq!(
            (renamed.category, renamed.completed, renamed.sort_order, renamed.created_at),
            (toggled.category, toggled.completed, toggled.sort_order, item.created_at)
        );
    }

    #[test]
    fn edits_on_missing_items_are_not_found() {
        let service = service();
        assert!(matches!(
            service.toggle_completed(ItemId(7)),
            Err(TaskListError::NotFound(ItemId(7)))
        ));
        assert!(matches!(
            service.update_text(ItemId(7), "x"),
            Err(TaskListError::NotFound(_))
        ));
    }

    #[test]
    fn reorder_rewrites_dense_order() {
        let service = service();
        let a = service.insert("a", Category::Work).unwrap();
        let b = service.insert("b", Category::Work).unwrap();
        let c = service.insert("c", Category::Work).unwrap();

        service.reorder(&[c.id, a.id, b.id]).unwrap();

        let items = all(&service);
        assert_eq!(ids(&items), vec![c.id, a.id, b.id]);
        assert_eq!(
            items.iter().map(|i| i.sort_order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn stale_reorder_is_rejected_without_writing() {
        let service = service();
        let a = service.insert("a", Category::Work).unwrap();
        let b = service.insert("b", Category::Work).unwrap();
        let revision = service.store().revision();

        let missing = service.reorder(&[b.id]).unwrap_err();
        assert!(matches!(missing, TaskListError::Concurrency(_)));
        let duplicated = service.reorder(&[a.id, a.id]).unwrap_err();
        assert!(matches!(duplicated, TaskListError::Concurrency(_)));
        let unknown = service.reorder(&[a.id, ItemId(99)]).unwrap_err();
        assert!(matches!(unknown, TaskListError::Concurrency(_)));

        assert_eq!(service.store().revision(), revision);
        assert_eq!(ids(&all(&service)), vec![a.id, b.id]);
    }

    #[test]
    fn reorder_within_keeps_other_slots() {
        let service = service();
        let w1 = service.insert("w1", Category::Work).unwrap();
        let p1 = service.insert("p1", Category::Personal).unwrap();
        let w2 = service.insert("w2", Category::Work).unwrap();
        let p2 = service.insert("p2", Category::Personal).unwrap();

        let order = service.reorder_within(&[w2.id, w1.id]).unwrap();
        assert_eq!(order, vec![w2.id, p1.id, w1.id, p2.id]);
        assert_eq!(ids(&all(&service)), order);
    }

    #[test]
    fn merge_rejects_unknown_and_duplicate_ids() {
        let global = [ItemId(1), ItemId(2), ItemId(3)];
        assert!(merge_subset_order(&global, &[ItemId(4)]).is_err());
        assert!(merge_subset_order(&global, &[ItemId(1), ItemId(1)]).is_err());
        assert_eq!(
            merge_subset_order(&global, &[ItemId(3), ItemId(1)]).unwrap(),
            vec![ItemId(3), ItemId(2), ItemId(1)]
        );
    }

    #[test]
    fn delete_then_restore_reproduces_prior_state() {
        let service = service();
        let a = service.insert("a", Category::Work).unwrap();
        let b = service.insert("b", Category::Work).unwrap();
        let c = service.insert("c", Category::Work).unwrap();
        let before = all(&service);

        service.delete_pending(b.id).unwrap();
        assert_eq!(ids(&all(&service)), vec![a.id, c.id]);
        assert!(matches!(
            service.toggle_completed(b.id),
            Err(TaskListError::NotFound(_))
        ));

        let restored = service.restore(b.id).unwrap();
        assert_eq!(restored, b);
        assert_eq!(all(&service), before);
    }

    #[test]
    fn commit_delete_is_idempotent() {
        let service = service();
        let a = service.insert("a", Category::Work).unwrap();
        service.delete_pending(a.id).unwrap();

        assert!(service.commit_delete(a.id).unwrap());
        assert!(!service.commit_delete(a.id).unwrap());
        assert!(matches!(
            service.restore(a.id),
            Err(TaskListError::NotFound(_))
        ));
        assert!(service.store().get(a.id).unwrap().is_none());
    }

    #[test]
    fn insert_during_undo_window_does_not_collide_with_pending_order() {
        let service = service();
        service.insert("a", Category::Work).unwrap();
        let b = service.insert("b", Category::Work).unwrap();
        service.delete_pending(b.id).unwrap();

        let c = service.insert("c", Category::Work).unwrap();
        assert_eq!(c.sort_order, 2);
        assert_eq!(service.restore(b.id).unwrap().sort_order, 1);
    }

    #[test]
    fn delete_all_completed_is_permanent() {
        let service = service();
        let a = service.insert("a", Category::Work).unwrap();
        let b = service.insert("b", Category::Work).unwrap();
        service.toggle_completed(a.id).unwrap();

        assert_eq!(service.delete_all_completed().unwrap(), 1);
        assert_eq!(ids(&all(&service)), vec![b.id]);
    }

    #[test]
    fn apply_dispatches_described_mutations() {
        let service = service();
        let outcome = service
            .apply(&Mutation::Insert {
                text: "via apply".into(),
                category: Category::Shopping,
            })
            .unwrap();
        let MutationOutcome::Inserted(item) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(
            service.apply(&Mutation::ToggleCompleted { id: item.id }).unwrap(),
            MutationOutcome::Updated(Item {
                completed: true,
                ..item
            })
        );
    }

    #[test]
    fn retry_with_nothing_remembered_is_noop() {
        let service = service();
        assert!(service.retry_last().unwrap().is_none());
    }

    #[test]
    fn restore_after_reorder_keeps_order_dense() {
        let service = service();
        let a = service.insert("a", Category::Work).unwrap();
        let b = service.insert("b", Category::Work).unwrap();
        let c = service.insert("c", Category::Work).unwrap();

        service.delete_pending(b.id).unwrap();
        service.reorder(&[c.id, a.id]).unwrap();
        let restored = service.restore(b.id).unwrap();

        assert_eq!(restored.sort_order, 1);
        let orders: Vec<(String, i64)> = all(&service)
            .into_iter()
            .map(|i| (i.text, i.sort_order))
            .collect();
        assert_eq!(
            orders,
            vec![("c".into(), 0), ("b".into(), 1), ("a".into(), 2)]
        );
    }

    #[test]
    fn restore_into_a_gap_keeps_prior_sort_order() {
        let service = service();
        let a = service.insert("a", Category::Work).unwrap();
        let b = service.insert("b", Category::Work).unwrap();
        let c = service.insert("c", Category::Work).unwrap();

        service.delete_pending(c.id).unwrap();
        service.delete_pending(b.id).unwrap();
        service.commit_delete(b.id).unwrap();

        assert_eq!(service.restore(c.id).unwrap().sort_order, 2);
        assert_eq!(ids(&all(&service)), vec![a.id, c.id]);
        assert_eq!(all(&service)[0].sort_order, 0);
    }

    fn hide_items_table(service: &MutationService, hidden: bool) {
        let (from, to) = if hidden {
            ("todo_items", "todo_items_away")
        } else {
            ("todo_items_away", "todo_items")
        };
        service
            .store()
            .write("rename_table", |tx| {
                tx.execute_batch(&format!("ALTER TABLE {from} RENAME TO {to}"))?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn storage_failure_is_remembered_and_retried_once() {
        let service = service();
        hide_items_table(&service, true);

        let err = service.insert("groceries", Category::Shopping).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            service.last_failed(),
            Some(Mutation::Insert {
                text: "groceries".into(),
                category: Category::Shopping,
            })
        );

        // Still broken: the retry fails and the operation stays remembered.
        assert!(service.retry_last().is_err());
        assert!(service.last_failed().is_some());

        hide_items_table(&service, false);
        let outcome = service.retry_last().unwrap();
        assert!(matches!(
            outcome,
            Some(MutationOutcome::Inserted(ref item)) if item.text == "groceries"
        ));
        assert!(service.last_failed().is_none());
        assert!(service.retry_last().unwrap().is_none());
        assert_eq!(all(&service).len(), 1);
    }

    #[test]
    fn rejected_input_is_not_remembered() {
        let service = service();
        assert!(service.update_text(ItemId(7), "x").is_err());
        assert!(service.reorder(&[ItemId(1)]).is_err());
        assert!(service.last_failed().is_none());
    }
}
