//! Attribute values and type-aware comparison.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute name → value mapping, ordered by name so that deltas and
/// operations come out in a stable order.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A single attribute value as carried through the engine.
///
/// The value itself is untyped beyond its shape; how two values compare is
/// decided by the [`Compare`] mode the owning kind's option table assigns to
/// the attribute.
///
/// # Examples
///
/// ```
/// use winstate_cli::model::AttrValue;
///
/// let servers = AttrValue::list(["10.0.0.1", "10.0.0.2"]);
/// assert_eq!(servers.to_string(), "[10.0.0.1, 10.0.0.2]");
/// assert_eq!(AttrValue::from(true).to_string(), "true");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Free text, names, enum choices.
    Text(String),
    /// List of text values (e.g. `dns_servers`).
    List(Vec<String>),
}

impl AttrValue {
    /// Build a list value from anything yielding string-like items.
    #[must_use]
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Return the text payload, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Return the list payload, if this is a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Return the boolean payload, if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `true` for an empty list or blank text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(|i| i.trim().is_empty()),
            Self::Bool(_) | Self::Int(_) => false,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// How two values of one attribute are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compare {
    /// Byte-for-byte equality.
    Exact,
    /// Case-insensitive; a single trailing `.` (FQDN root) is ignored.
    CaseInsensitive,
    /// Set equality: order and duplicates are not significant, entries are
    /// trimmed and case-folded.
    Set,
}

impl Compare {
    /// Compare `current` against `desired` under this mode.
    ///
    /// Values of different shapes are never equal, except that a scalar text
    /// compared in [`Set`](Self::Set) mode is treated as a one-element list.
    ///
    /// # Examples
    ///
    /// ```
    /// use winstate_cli::model::{AttrValue, Compare};
    ///
    /// let a = AttrValue::list(["10.0.0.1", "10.0.0.2"]);
    /// let b = AttrValue::list(["10.0.0.2", "10.0.0.1", "10.0.0.1"]);
    /// assert!(Compare::Set.equal(&a, &b));
    /// assert!(!Compare::Exact.equal(&a, &b));
    ///
    /// let zone = AttrValue::from("Corp.Example.COM.");
    /// assert!(Compare::CaseInsensitive.equal(&zone, &AttrValue::from("corp.example.com")));
    /// ```
    #[must_use]
    pub fn equal(self, current: &AttrValue, desired: &AttrValue) -> bool {
        match self {
            Self::Exact => current == desired,
            Self::CaseInsensitive => match (current, desired) {
                (AttrValue::Text(a), AttrValue::Text(b)) => fold_name(a) == fold_name(b),
                _ => current == desired,
            },
            Self::Set => match (as_set(current), as_set(desired)) {
                (Some(a), Some(b)) => a == b,
                _ => current == desired,
            },
        }
    }
}

/// Normalise a name for case-insensitive comparison.
fn fold_name(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

fn as_set(value: &AttrValue) -> Option<BTreeSet<String>> {
    match value {
        AttrValue::List(items) => Some(
            items
                .iter()
                .map(|i| i.trim().to_ascii_lowercase())
                .filter(|i| !i.is_empty())
                .collect(),
        ),
        AttrValue::Text(s) => Some(std::iter::once(s.trim().to_ascii_lowercase()).collect()),
        AttrValue::Bool(_) | AttrValue::Int(_) => None,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn set_compare_ignores_order_and_duplicates() {
        let a = AttrValue::list(["A", "B"]);
        let b = AttrValue::list(["b", "a", "a"]);
        assert!(Compare::Set.equal(&a, &b));
    }

    #[test]
    fn set_compare_detects_missing_member() {
        let a = AttrValue::list(["10.0.0.1", "10.0.0.2"]);
        let b = AttrValue::list(["10.0.0.1"]);
        assert!(!Compare::Set.equal(&a, &b));
    }

    #[test]
    fn set_compare_scalar_against_single_element_list() {
        assert!(Compare::Set.equal(
            &AttrValue::from("10.0.0.1"),
            &AttrValue::list(["10.0.0.1"])
        ));
    }

    #[test]
    fn case_insensitive_compare_ignores_trailing_dot() {
        assert!(Compare::CaseInsensitive.equal(
            &AttrValue::from("EXAMPLE.com."),
            &AttrValue::from("example.COM")
        ));
        assert!(!Compare::CaseInsensitive.equal(
            &AttrValue::from("example.com"),
            &AttrValue::from("example.org")
        ));
    }

    #[test]
    fn exact_compare_is_case_sensitive() {
        assert!(!Compare::Exact.equal(&AttrValue::from("Users"), &AttrValue::from("users")));
    }

    #[test]
    fn mismatched_shapes_are_not_equal() {
        assert!(!Compare::Exact.equal(&AttrValue::Bool(true), &AttrValue::from("true")));
        assert!(!Compare::Set.equal(&AttrValue::Int(1), &AttrValue::list(["1"])));
    }

    #[test]
    fn empty_values() {
        assert!(AttrValue::list(Vec::<String>::new()).is_empty());
        assert!(AttrValue::list(["  "]).is_empty());
        assert!(AttrValue::from(" ").is_empty());
        assert!(!AttrValue::Bool(false).is_empty());
    }

    #[test]
    fn untagged_json_round_trip_shapes() {
        let v: AttrValue = serde_json::from_str("[\"a\",\"b\"]").unwrap();
        assert_eq!(v, AttrValue::list(["a", "b"]));
        let v: AttrValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, AttrValue::Bool(true));
        let v: AttrValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, AttrValue::Int(42));
        let v: AttrValue = serde_json::from_str("\"x\"").unwrap();
        assert_eq!(v, AttrValue::from("x"));
    }
}
