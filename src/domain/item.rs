//! Item domain model.
//!
//! An [`Item`] is one task in the list. Items are created and changed only through
//! [`crate::service::MutationService`]; this module holds the value types and the
//! text rules shared by the service and the edit boundary.

use crate::domain::error::{Result, TaskListError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable store-assigned identity of an item. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of item categories.
///
/// Stored as the upper-case variant name. The display color and icon are fixed
/// per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    Personal,
    Work,
    Shopping,
    Health,
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Self; 5] = [
        Self::Personal,
        Self::Work,
        Self::Shopping,
        Self::Health,
        Self::Other,
    ];

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "PERSONAL",
            Self::Work => "WORK",
            Self::Shopping => "SHOPPING",
            Self::Health => "HEALTH",
            Self::Other => "OTHER",
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Work => "Work",
            Self::Shopping => "Shopping",
            Self::Health => "Health",
            Self::Other => "Other",
        }
    }

    /// Display color as `0xAARRGGBB`.
    #[must_use]
    pub const fn color(self) -> u32 {
        match self {
            Self::Personal => 0xFF6B_8AFD,
            Self::Work => 0xFFF5_9E0B,
            Self::Shopping => 0xFF10_B981,
            Self::Health => 0xFFEF_4444,
            Self::Other => 0xFF8B_5CF6,
        }
    }

    /// Icon name understood by the presentation layer.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Personal => "person",
            Self::Work => "work",
            Self::Shopping => "shopping_cart",
            Self::Health => "favorite",
            Self::Other => "label",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = TaskListError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| TaskListError::Storage(format!("unknown category: {s}")))
    }
}

/// A persisted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Store-assigned identity.
    pub id: ItemId,

    /// Trimmed, non-blank task text.
    pub text: String,

    /// Completion flag.
    pub completed: bool,

    /// Category, independent of text and order.
    pub category: Category,

    /// Position in the global manual order (ascending).
    pub sort_order: i64,

    /// Creation time in epoch milliseconds. Immutable.
    pub created_at: i64,
}

/// Values supplied by the caller when creating an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub text: String,
    pub category: Category,
    pub sort_order: i64,
    pub created_at: i64,
}

/// Trims `text` and rejects it if nothing is left.
///
/// # Errors
///
/// Returns [`TaskListError::Validation`] when the text is empty or whitespace only.
pub fn normalize_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TaskListError::Validation(
            "task text must not be blank".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Edit-boundary check: blank text and text longer than `max_chars` characters are rejected.
///
/// # Errors
///
/// Returns [`TaskListError::Validation`] describing the problem.
pub fn validate_edit(text: &str, max_chars: usize) -> Result<String> {
    let text = normalize_text(text)?;
    let len = text.chars().count();
    if len > max_chars {
        return Err(TaskListError::Validation(format!(
            "task text is {len} characters, the limit is {max_chars}"
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PERSONAL", Category::Personal)]
    #[case("work", Category::Work)]
    #[case("Shopping", Category::Shopping)]
    #[case("HEALTH", Category::Health)]
    #[case("other", Category::Other)]
    fn category_parses_stored_and_display_names(#[case] raw: &str, #[case] expected: Category) {
        assert_eq!(raw.parse::<Category>().unwrap(), expected);
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!("URGENT".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_as_stored_name() {
        let json = serde_json::to_string(&Category::Shopping).unwrap();
        assert_eq!(json, "\"SHOPPING\"");
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn blank_text_is_invalid(#[case] text: &str) {
        assert!(matches!(
            normalize_text(text),
            Err(TaskListError::Validation(_))
        ));
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(normalize_text("  buy milk ").unwrap(), "buy milk");
    }

    #[test]
    fn edit_length_counts_characters() {
        assert_eq!(validate_edit("héllo", 5).unwrap(), "héllo");
        assert!(validate_edit("héllo!", 5).is_err());
    }
}
