//! Application layer coordinating state, events, and actions.
//!
//! Sits between the presentation layer and the services. Presentation events and
//! query emissions go in; mutations, undo timers, and animation hooks come out.
//!
//! # Architecture
//!
//! ```text
//! UI Input → Events → handle_event → Gesture Engines → Actions → Runtime
//!              ↑                                                   │
//!              └──── Query emissions / mutation outcomes ──────────┘
//! ```
//!
//! # Modules
//!
//! - [`actions`]: Side effect commands emitted by the event handler
//! - [`handler`]: Event processing and state transitions
//! - [`runtime`]: Executes persistence and timer actions against the services
//! - [`state`]: View state, gesture engines, undo stack, and surfaced errors

pub mod actions;
pub mod handler;
pub mod runtime;
pub mod state;

pub use actions::{Action, Animation};
pub use handler::{handle_event, Event};
pub use runtime::Runtime;
pub use state::{AppSettings, AppState, ErrorNotice, FailureKind};
