//! Drag-to-reorder with magnetic snapping.
//!
//! The engine keeps the rows of one view laid out contiguously from offset `0`. While
//! a row is dragged, its projected center is its rest position plus half its extent
//! plus the accumulated finger offset. When that center crosses the midpoint of the
//! next visible row in the direction of travel, the two rows swap immediately and the
//! offset is compensated by the neighbor's extent, so the dragged row does not jump on
//! screen. Swaps are ephemeral; only [`DragEvent::End`] produces a single
//! [`DragEffect::Commit`] with the final order.

use crate::domain::ItemId;

/// One row of the view being reordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    pub id: ItemId,
    /// Height of the row along the drag axis.
    pub extent: f32,
}

impl Row {
    #[must_use]
    pub const fn new(id: ItemId, extent: f32) -> Self {
        Self { id, extent }
    }
}

/// Visible window along the drag axis, in the same coordinates as the rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub start: f32,
    pub extent: f32,
}

impl Viewport {
    fn intersects(&self, top: f32, extent: f32) -> bool {
        top < self.start + self.extent && top + extent > self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        active_index: usize,
        accumulated_offset: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragEvent {
    Start { index: usize },
    Move { delta_y: f32 },
    End,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragEffect {
    /// The dragged row moved from one index to another in the ephemeral order.
    Moved { id: ItemId, from: usize, to: usize },
    /// The drag ended with a changed order; persist it exactly once.
    Commit { order: Vec<ItemId> },
    /// The view must show this persisted order again.
    Revert { order: Vec<ItemId> },
}

/// Everything a drag transition reads and rewrites.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DragSession {
    pub state: DragState,
    /// Rows in their current, possibly ephemeral, order.
    pub rows: Vec<Row>,
    /// Last persisted order.
    pub committed: Vec<Row>,
    /// Persisted order that arrived mid-drag.
    pub deferred: Option<Vec<Row>>,
    /// Set once the offset first leaves the jitter band.
    pub engaged: bool,
}

/// Fixed inputs of a drag transition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DragGeometry {
    pub viewport: Option<Viewport>,
    pub min_drag_distance: f32,
}

/// Pure transition: `(session, event) -> (session, effects)`.
#[must_use]
pub fn transition(
    mut session: DragSession,
    event: DragEvent,
    geometry: DragGeometry,
) -> (DragSession, Vec<DragEffect>) {
    let effects = match event {
        DragEvent::Start { index } => start(&mut session, index),
        DragEvent::Move { delta_y } => drag_move(&mut session, delta_y, geometry),
        DragEvent::End => end(&mut session),
        DragEvent::Cancel => cancel(&mut session),
    };
    (session, effects)
}

fn start(session: &mut DragSession, index: usize) -> Vec<DragEffect> {
    if matches!(session.state, DragState::Dragging { .. }) || index >= session.rows.len() {
        tracing::debug!(index, rows = session.rows.len(), "ignoring drag start");
        return Vec::new();
    }
    session.state = DragState::Dragging {
        active_index: index,
        accumulated_offset: 0.0,
    };
    session.engaged = false;
    Vec::new()
}

fn drag_move(session: &mut DragSession, delta_y: f32, geometry: DragGeometry) -> Vec<DragEffect> {
    let DragState::Dragging {
        active_index,
        accumulated_offset,
    } = session.state
    else {
        return Vec::new();
    };
    if !delta_y.is_finite() {
        tracing::trace!(delta_y, "ignoring non-finite drag delta");
        return Vec::new();
    }

    let mut offset = accumulated_offset + delta_y;
    if !session.engaged && offset.abs() < geometry.min_drag_distance {
        session.state = DragState::Dragging {
            active_index,
            accumulated_offset: offset,
        };
        return Vec::new();
    }
    session.engaged = true;

    let from = active_index;
    let mut index = active_index;
    while let Some(neighbor) = snap_target(&session.rows, geometry.viewport, index, offset) {
        let extent = session.rows[neighbor].extent;
        session.rows.swap(index, neighbor);
        if neighbor > index {
            offset -= extent;
        } else {
            offset += extent;
        }
        index = neighbor;
    }

    session.state = DragState::Dragging {
        active_index: index,
        accumulated_offset: offset,
    };
    if index == from {
        return Vec::new();
    }
    let id = session.rows[index].id;
    tracing::trace!(item_id = %id, from, to = index, "magnetic snap");
    vec![DragEffect::Moved { id, from, to: index }]
}

/// Adjacent row in the travel direction whose midpoint the projected center has
/// crossed.
fn snap_target(
    rows: &[Row],
    viewport: Option<Viewport>,
    index: usize,
    offset: f32,
) -> Option<usize> {
    let neighbor = if offset > 0.0 {
        index.checked_add(1).filter(|n| *n < rows.len())?
    } else if offset < 0.0 {
        index.checked_sub(1)?
    } else {
        return None;
    };

    let center = rest_top(rows, index) + rows[index].extent / 2.0 + offset;
    let top = rest_top(rows, neighbor);
    let extent = rows[neighbor].extent;
    if let Some(viewport) = viewport {
        if !viewport.intersects(top, extent) {
            return None;
        }
    }

    let midpoint = top + extent / 2.0;
    let crossed = if neighbor > index {
        center > midpoint
    } else {
        center < midpoint
    };
    crossed.then_some(neighbor)
}

fn end(session: &mut DragSession) -> Vec<DragEffect> {
    if !matches!(session.state, DragState::Dragging { .. }) {
        return Vec::new();
    }
    session.state = DragState::Idle;
    session.engaged = false;

    let order = ids(&session.rows);
    if order != ids(&session.committed) {
        session.deferred = None;
        session.committed.clone_from(&session.rows);
        tracing::debug!(count = order.len(), "drag committed new order");
        return vec![DragEffect::Commit { order }];
    }

    match session.deferred.take() {
        Some(rows) => {
            session.committed.clone_from(&rows);
            session.rows = rows;
            vec![DragEffect::Revert {
                order: ids(&session.rows),
            }]
        }
        None => Vec::new(),
    }
}

fn cancel(session: &mut DragSession) -> Vec<DragEffect> {
    if !matches!(session.state, DragState::Dragging { .. }) {
        return Vec::new();
    }
    session.state = DragState::Idle;
    session.engaged = false;

    if let Some(rows) = session.deferred.take() {
        session.committed = rows;
    }
    session.rows.clone_from(&session.committed);
    tracing::debug!("drag cancelled");
    vec![DragEffect::Revert {
        order: ids(&session.rows),
    }]
}

fn rest_top(rows: &[Row], index: usize) -> f32 {
    rows.iter().take(index).map(|r| r.extent).sum()
}

/// Drag gesture state machine for one list view.
#[derive(Debug, Clone)]
pub struct ReorderEngine {
    session: DragSession,
    geometry: DragGeometry,
}

impl ReorderEngine {
    /// Creates an idle engine. Offsets smaller than `min_drag_distance` are treated
    /// as jitter.
    #[must_use]
    pub fn new(min_drag_distance: f32) -> Self {
        Self {
            session: DragSession::default(),
            geometry: DragGeometry {
                viewport: None,
                min_drag_distance: min_drag_distance.max(0.0),
            },
        }
    }

    #[must_use]
    pub const fn state(&self) -> DragState {
        self.session.state
    }

    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.session.state, DragState::Dragging { .. })
    }

    /// Rows in their current (possibly ephemeral) order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.session.rows
    }

    /// Ids in their current (possibly ephemeral) order.
    #[must_use]
    pub fn order(&self) -> Vec<ItemId> {
        ids(&self.session.rows)
    }

    /// Installs the persisted order. During a drag it is held back until the drag
    /// ends or is cancelled.
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        if self.is_dragging() {
            tracing::trace!(rows = rows.len(), "deferring order update until drag ends");
            self.session.deferred = Some(rows);
        } else {
            self.session.committed.clone_from(&rows);
            self.session.rows = rows;
        }
    }

    /// Limits snap candidates to rows intersecting `viewport`. `None` makes every row
    /// a candidate.
    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.geometry.viewport = viewport;
    }

    /// Updates the measured extent of one row.
    pub fn set_extent(&mut self, id: ItemId, extent: f32) {
        let session = &mut self.session;
        for row in session
            .rows
            .iter_mut()
            .chain(session.committed.iter_mut())
            .chain(session.deferred.iter_mut().flatten())
        {
            if row.id == id {
                row.extent = extent;
            }
        }
    }

    /// Rest position of the row at `index`.
    #[must_use]
    pub fn rest_top(&self, index: usize) -> f32 {
        rest_top(&self.session.rows, index)
    }

    /// Feeds one event and returns the effects to render.
    pub fn handle(&mut self, event: DragEvent) -> Vec<DragEffect> {
        let (session, effects) =
            transition(std::mem::take(&mut self.session), event, self.geometry);
        self.session = session;
        effects
    }

    pub fn start(&mut self, index: usize) -> Vec<DragEffect> {
        self.handle(DragEvent::Start { index })
    }

    pub fn drag_move(&mut self, delta_y: f32) -> Vec<DragEffect> {
        self.handle(DragEvent::Move { delta_y })
    }

    pub fn end(&mut self) -> Vec<DragEffect> {
        self.handle(DragEvent::End)
    }

    pub fn cancel(&mut self) -> Vec<DragEffect> {
        self.handle(DragEvent::Cancel)
    }
}

fn ids(rows: &[Row]) -> Vec<ItemId> {
    rows.iter().map(|r| r.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const H: f32 = 100.0;

    fn engine(n: i64) -> ReorderEngine {
        let mut engine = ReorderEngine::new(8.0);
        engine.set_rows((0..n).map(|i| Row::new(ItemId(i), H)).collect());
        engine
    }

    fn order(engine: &ReorderEngine) -> Vec<i64> {
        engine.order().into_iter().map(|id| id.0).collect()
    }

    #[test]
    fn jitter_below_threshold_has_no_effect() {
        let mut e = engine(3);
        e.start(1);
        assert!(e.drag_move(5.0).is_empty());
        assert!(e.drag_move(-2.0).is_empty());
        assert_eq!(
            e.state(),
            DragState::Dragging {
                active_index: 1,
                accumulated_offset: 3.0
            }
        );
        assert!(e.end().is_empty());
    }

    #[test]
    fn crossing_an_edge_is_not_enough() {
        let mut e = engine(4);
        e.start(1);
        // Center enters row 2's span but stays above its midpoint.
        assert!(e.drag_move(60.0).is_empty());
        assert!(e.drag_move(40.0).is_empty());
        assert_eq!(order(&e), vec![0, 1, 2, 3]);
    }

    #[test]
    fn successive_midpoints_snap_once_each_and_commit_once() {
        let mut e = engine(6);
        e.start(2);

        let first = e.drag_move(101.0);
        assert_eq!(
            first,
            vec![DragEffect::Moved {
                id: ItemId(2),
                from: 2,
                to: 3
            }]
        );
        assert_eq!(
            e.state(),
            DragState::Dragging {
                active_index: 3,
                accumulated_offset: 1.0
            }
        );
        assert!(e.drag_move(40.0).is_empty());

        let second = e.drag_move(60.0);
        assert_eq!(
            second,
            vec![DragEffect::Moved {
                id: ItemId(2),
                from: 3,
                to: 4
            }]
        );

        let done = e.end();
        assert_eq!(
            done,
            vec![DragEffect::Commit {
                order: [0, 1, 3, 4, 2, 5].map(ItemId).to_vec()
            }]
        );
        assert_eq!(e.state(), DragState::Idle);
    }

    #[test]
    fn one_large_move_collapses_into_single_jump() {
        let mut e = engine(5);
        e.start(0);
        let effects = e.drag_move(360.0);
        assert_eq!(
            effects,
            vec![DragEffect::Moved {
                id: ItemId(0),
                from: 0,
                to: 3
            }]
        );
        assert_eq!(order(&e), vec![1, 2, 3, 0, 4]);
    }

    #[test]
    fn upward_drag_uses_neighbor_extent() {
        let mut e = ReorderEngine::new(0.0);
        e.set_rows(vec![
            Row::new(ItemId(1), 40.0),
            Row::new(ItemId(2), 200.0),
        ]);
        e.start(1);
        // Center of row 2 rests at 140; row 1 midpoint is at 20.
        assert!(e.drag_move(-110.0).is_empty());
        assert_eq!(e.drag_move(-15.0).len(), 1);
        assert_eq!(
            e.state(),
            DragState::Dragging {
                active_index: 0,
                accumulated_offset: -85.0
            }
        );
    }

    #[test]
    fn cancel_restores_persisted_order_without_commit() {
        let mut e = engine(3);
        e.start(0);
        e.drag_move(160.0);
        assert_eq!(order(&e), vec![1, 0, 2]);
        assert_eq!(
            e.cancel(),
            vec![DragEffect::Revert {
                order: [0, 1, 2].map(ItemId).to_vec()
            }]
        );
        assert_eq!(order(&e), vec![0, 1, 2]);
    }

    #[test]
    fn drag_back_to_start_writes_nothing() {
        let mut e = engine(3);
        e.start(0);
        e.drag_move(160.0);
        e.drag_move(-170.0);
        assert_eq!(order(&e), vec![0, 1, 2]);
        assert!(e.end().is_empty());
    }

    #[test]
    fn rows_arriving_mid_drag_are_deferred() {
        let mut e = engine(3);
        e.start(0);
        e.set_rows(vec![Row::new(ItemId(9), H), Row::new(ItemId(0), H)]);
        assert_eq!(order(&e), vec![0, 1, 2]);

        assert_eq!(
            e.end(),
            vec![DragEffect::Revert {
                order: vec![ItemId(9), ItemId(0)]
            }]
        );
        assert_eq!(order(&e), vec![9, 0]);
    }

    #[test]
    fn rows_outside_viewport_are_not_candidates() {
        let mut e = engine(4);
        e.set_viewport(Some(Viewport {
            start: 0.0,
            extent: 200.0,
        }));
        e.start(1);
        assert!(e.drag_move(180.0).is_empty());
        assert_eq!(order(&e), vec![0, 1, 2, 3]);
    }

    #[test]
    fn events_outside_a_drag_are_ignored() {
        let mut e = engine(2);
        assert!(e.handle(DragEvent::Move { delta_y: 300.0 }).is_empty());
        assert!(e.handle(DragEvent::End).is_empty());
        assert!(e.handle(DragEvent::Start { index: 5 }).is_empty());
        assert_eq!(e.state(), DragState::Idle);
    }

    #[test]
    fn non_finite_deltas_leave_the_drag_untouched() {
        let mut e = engine(3);
        e.start(0);
        e.drag_move(20.0);
        for delta in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(e.drag_move(delta).is_empty());
        }
        assert_eq!(
            e.state(),
            DragState::Dragging {
                active_index: 0,
                accumulated_offset: 20.0
            }
        );
        assert_eq!(e.drag_move(140.0).len(), 1);
        assert_eq!(order(&e), vec![1, 0, 2]);
    }

    #[test]
    fn transition_is_pure_over_the_session() {
        let geometry = DragGeometry {
            viewport: None,
            min_drag_distance: 0.0,
        };
        let rows: Vec<Row> = (0..3).map(|i| Row::new(ItemId(i), H)).collect();
        let idle = DragSession {
            rows: rows.clone(),
            committed: rows,
            ..DragSession::default()
        };

        let (dragging, effects) =
            transition(idle.clone(), DragEvent::Start { index: 2 }, geometry);
        assert!(effects.is_empty());
        let (moved, effects) =
            transition(dragging.clone(), DragEvent::Move { delta_y: -110.0 }, geometry);
        assert_eq!(
            effects,
            vec![DragEffect::Moved {
                id: ItemId(2),
                from: 2,
                to: 1
            }]
        );
        // The input session is a value; replaying it gives the same answer.
        assert_eq!(
            transition(dragging, DragEvent::Move { delta_y: -110.0 }, geometry),
            (moved.clone(), effects)
        );

        let (done, effects) = transition(moved, DragEvent::End, geometry);
        assert_eq!(
            effects,
            vec![DragEffect::Commit {
                order: [0, 2, 1].map(ItemId).to_vec()
            }]
        );
        assert_eq!(done.state, DragState::Idle);
        assert_eq!(ids(&done.committed), ids(&done.rows));
        assert_ne!(done, idle);
    }

    proptest! {
        #[test]
        fn any_drag_commits_a_permutation(
            n in 1_i64..12,
            start in 0_usize..12,
            moves in proptest::collection::vec(-400.0_f32..400.0, 0..20),
        ) {
            let mut e = engine(n);
            e.start(start % n as usize);
            for delta in moves {
                e.drag_move(delta);
            }
            let mut result: Vec<i64> = match e.end().pop() {
                Some(DragEffect::Commit { order }) => order.into_iter().map(|id| id.0).collect(),
                _ => order(&e),
            };
            result.sort_unstable();
            prop_assert_eq!(result, (0..n).collect::<Vec<_>>());
        }
    }
}
