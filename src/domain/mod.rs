//! Domain layer for the task list.
//!
//! Holds the item model and error types, independent of SQLite and of the
//! gesture engines.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`item`]: Item, category, and text rules
//!
//! # Examples
//!
//! ```
//! use tasklist::domain::{normalize_text, Category, Result};
//!
//! fn prepare(text: &str) -> Result<(String, Category)> {
//!     Ok((normalize_text(text)?, Category::Work))
//! }
//! ```

pub mod error;
pub mod item;

pub use error::{Result, TaskListError};
pub use item::{normalize_text, validate_edit, Category, Item, ItemId, NewItem};
