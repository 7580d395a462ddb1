//! Gesture state machines.
//!
//! Both engines are in-memory only. They never touch the store; the app layer turns
//! their terminal effects into mutations.
//!
//! - `reorder`: drag-to-reorder with magnetic snapping
//! - `swipe`: per-row swipe-to-act

pub mod reorder;
pub mod swipe;

pub use reorder::{
    DragEffect, DragEvent, DragGeometry, DragSession, DragState, ReorderEngine, Row, Viewport,
};
pub use swipe::{
    SwipeAction, SwipeDirection, SwipeEffect, SwipeEngine, SwipeEvent, SwipeState,
};
