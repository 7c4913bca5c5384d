//! Sort keys and multi-key feature ordering.

use std::cmp::Ordering;

use serde_json::Value;

use super::value::sort_order;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One `{property, direction}` sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Property to sort by.
    pub property: String,
    /// Sort direction.
    pub direction: Direction,
}

impl SortKey {
    /// Ascending key on `property`.
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    /// Descending key on `property`.
    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Descending,
        }
    }

    /// Parse a comma-separated `sortby` list such as `+name,-pop,area`.
    ///
    /// A leading `-` sorts descending; `+` or no prefix sorts ascending.
    /// Empty entries are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoprovider_core::query::SortKey;
    ///
    /// let keys = SortKey::parse_list("+name, -pop");
    /// assert_eq!(keys, vec![SortKey::ascending("name"), SortKey::descending("pop")]);
    /// ```
    pub fn parse_list(input: &str) -> Vec<Self> {
        input
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                if let Some(property) = entry.strip_prefix('-') {
                    Self::descending(property.trim())
                } else {
                    Self::ascending(entry.trim_start_matches('+').trim())
                }
            })
            .collect()
    }
}

/// Compare two rows key by key; `values` yields each row's value for a key.
///
/// Ties on every key compare equal so a stable sort keeps insertion order.
pub(crate) fn compare_rows<T, F>(left: &T, right: &T, keys: &[SortKey], values: F) -> Ordering
where
    F: Fn(&T, &str) -> Option<Value>,
{
    keys.iter()
        .map(|key| {
            let ordering = sort_order(
                values(left, &key.property).as_ref(),
                values(right, &key.property).as_ref(),
            );
            match key.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}
