//! Header multimap shared by requests and responses.
//!
//! # Design
//! Each name maps to a set of values. Ordered collections keep iteration and
//! flattening deterministic, but order carries no meaning. Multiple values are
//! joined with `", "` only at the transport boundary ([`HeaderMultimap::joined`]);
//! the map itself never stores joined strings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

static EMPTY: BTreeSet<String> = BTreeSet::new();

/// Mapping from header name to the set of its values.
///
/// Names compare by exact string equality unless a lookup says otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMultimap {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl HeaderMultimap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the set for `name`, creating the set if absent.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(name.into())
            .or_default()
            .insert(value.into());
    }

    /// Replaces the whole set for `name` with `{value}`.
    pub fn replace(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .insert(name.into(), BTreeSet::from([value.into()]));
    }

    /// Values for `name`, or an empty set.
    pub fn get(&self, name: &str) -> &BTreeSet<String> {
        self.entries.get(name).unwrap_or(&EMPTY)
    }

    /// Like [`get`](Self::get), falling back to an ASCII case-insensitive match.
    pub fn get_ignore_case(&self, name: &str) -> &BTreeSet<String> {
        if let Some(values) = self.entries.get(name) {
            return values;
        }
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
            .unwrap_or(&EMPTY)
    }

    pub fn contains(&self, name: &str, value: &str) -> bool {
        self.get(name).contains(value)
    }

    /// All values for `name` flattened into one header line value.
    pub fn joined(&self, name: &str) -> Option<String> {
        self.entries.get(name).map(join_values)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(name, values)| (name.as_str(), values))
    }

    /// Every name paired with its flattened value.
    pub fn flattened(&self) -> impl Iterator<Item = (&str, String)> {
        self.iter().map(|(name, values)| (name, join_values(values)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn join_values(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl<K, V> FromIterator<(K, V)> for HeaderMultimap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMultimap::new();
        for (name, value) in iter {
            map.append(name, value);
        }
        map
    }
}

impl fmt::Display for HeaderMultimap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (name, values)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}=[{}]", join_values(values))?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_accumulates_values() {
        let mut map = HeaderMultimap::new();
        map.append("Accept", "text/html");
        map.append("Accept", "application/json");
        assert_eq!(map.get("Accept").len(), 2);
        assert!(map.contains("Accept", "text/html"));
        assert!(map.contains("Accept", "application/json"));
    }

    #[test]
    fn append_does_not_fold_case_of_values() {
        let mut map = HeaderMultimap::new();
        map.append("X-Tag", "a");
        map.append("X-Tag", "A");
        map.append("X-Tag", "a");
        assert_eq!(map.get("X-Tag").len(), 2);
    }

    #[test]
    fn replace_leaves_single_value() {
        let mut map = HeaderMultimap::new();
        map.append("Content-Type", "text/plain");
        map.append("Content-Type", "text/css");
        map.replace("Content-Type", "application/json");
        assert_eq!(
            map.get("Content-Type"),
            &BTreeSet::from(["application/json".to_string()])
        );
    }

    #[test]
    fn missing_name_yields_empty_set() {
        let map = HeaderMultimap::new();
        assert!(map.get("Nope").is_empty());
        assert!(map.joined("Nope").is_none());
    }

    #[test]
    fn exact_lookup_is_case_sensitive() {
        let map: HeaderMultimap = [("content-type", "text/plain")].into_iter().collect();
        assert!(map.get("Content-Type").is_empty());
        assert!(map.get_ignore_case("Content-Type").contains("text/plain"));
    }

    #[test]
    fn joined_uses_comma_space() {
        let map: HeaderMultimap = [("Accept", "b"), ("Accept", "a")].into_iter().collect();
        assert_eq!(map.joined("Accept").as_deref(), Some("a, b"));
    }

    #[test]
    fn display_lists_every_entry() {
        let map: HeaderMultimap = [("A", "1"), ("B", "2"), ("B", "3")].into_iter().collect();
        assert_eq!(map.to_string(), "[A=[1], B=[2, 3]]");
    }
}
