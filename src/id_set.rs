//! Unordered sets of opaque video identifiers

use std::collections::HashSet;
use std::collections::hash_set;

/// A set of unique string identifiers (video ids)
///
/// Set operations never mutate their operands; they always build a new set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdSet {
    ids: HashSet<String>,
}

impl IdSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identifiers in the set
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when the set holds no identifiers
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Membership test
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Add an identifier, returning false if it was already present
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Identifiers present in `self` but absent from `other`
    pub fn difference(&self, other: &IdSet) -> IdSet {
        self.ids.difference(&other.ids).cloned().collect()
    }

    /// Identifiers present in either set
    pub fn union(&self, other: &IdSet) -> IdSet {
        self.ids.union(&other.ids).cloned().collect()
    }

    /// Identifiers present in both sets
    pub fn intersection(&self, other: &IdSet) -> IdSet {
        self.ids.intersection(&other.ids).cloned().collect()
    }

    /// Borrowing iterator in unspecified order
    pub fn iter(&self) -> hash_set::Iter<'_, String> {
        self.ids.iter()
    }

    /// Copy the identifiers into a vector, in unspecified order
    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Consume the set into a vector, in unspecified order
    pub fn into_vec(self) -> Vec<String> {
        self.ids.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for IdSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for IdSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.ids.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for IdSet {
    type Item = String;
    type IntoIter = hash_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a IdSet {
    type Item = &'a String;
    type IntoIter = hash_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
