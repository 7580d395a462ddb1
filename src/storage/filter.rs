//! Query shapes.
//!
//! An [`ItemFilter`] names which items a view wants. Filters are evaluated in SQL so
//! the database indexes do the work; [`ItemFilter::matches`] mirrors the same rule in
//! memory for tests and assertions.

use crate::domain::{Category, Item};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Category and completion constraints for a view. `None` means "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub category: Option<Category>,
    pub completed: Option<bool>,
}

impl ItemFilter {
    /// Every live item.
    pub const ALL: Self = Self {
        category: None,
        completed: None,
    };

    #[must_use]
    pub const fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            completed: None,
        }
    }

    #[must_use]
    pub const fn status(completed: bool) -> Self {
        Self {
            category: None,
            completed: Some(completed),
        }
    }

    #[must_use]
    pub const fn category_and_status(category: Category, completed: bool) -> Self {
        Self {
            category: Some(category),
            completed: Some(completed),
        }
    }

    /// Returns `true` when no constraint is set.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        self.category.is_none() && self.completed.is_none()
    }

    /// In-memory evaluation of the filter.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.category.map_or(true, |c| item.category == c)
            && self.completed.map_or(true, |done| item.completed == done)
    }

    /// Builds the `WHERE` clause (pending deletes always excluded) and its parameters.
    pub(crate) fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clause =
            String::from("WHERE id NOT IN (SELECT id FROM temp.pending_deletes)");
        let mut params = Vec::new();

        if let Some(category) = self.category {
            params.push(Value::Text(category.as_str().to_string()));
            clause.push_str(&format!(" AND category = ?{}", params.len()));
        }
        if let Some(completed) = self.completed {
            params.push(Value::Integer(i64::from(completed)));
            clause.push_str(&format!(" AND completed = ?{}", params.len()));
        }

        (clause, params)
    }
}
