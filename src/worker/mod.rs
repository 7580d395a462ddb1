//! Background worker for undo-window timers.
//!
//! Pending deletes are finalized on a dedicated thread so gesture handling never
//! waits on a timer. Trace context is propagated across the thread boundary.
//!
//! # Architecture
//!
//! - `messages`: Request protocol with trace context propagation
//! - `undo`: [`UndoScheduler`] and its timer loop

pub mod messages;
pub mod undo;

pub use messages::{TraceContext, UndoMessage};
pub use undo::{Committer, UndoScheduler};
