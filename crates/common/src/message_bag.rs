//! Ordered field-error collection
//!
//! A `MessageBag` maps a form or field name to one or more human-readable
//! validation messages. Keys keep their insertion order so rendered error
//! bodies list fields in the order they were reported.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping from field name to validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageBag {
    messages: IndexMap<String, Vec<String>>,
}

impl MessageBag {
    /// Create an empty message bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message for a field.
    ///
    /// A message already recorded for the same field is not added twice.
    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) -> &mut Self {
        let message = message.into();
        let entry = self.messages.entry(key.into()).or_default();
        if !entry.contains(&message) {
            entry.push(message);
        }
        self
    }

    /// Builder form of [`MessageBag::add`]
    pub fn with(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(key, message);
        self
    }

    /// Merge another bag into this one, keeping per-field uniqueness
    pub fn merge(&mut self, other: MessageBag) -> &mut Self {
        for (key, messages) in other.messages {
            for message in messages {
                self.add(key.clone(), message);
            }
        }
        self
    }

    /// Whether any message exists for `key`
    pub fn has(&self, key: &str) -> bool {
        self.messages.get(key).is_some_and(|m| !m.is_empty())
    }

    /// All messages for `key`, empty if the field has none
    pub fn get(&self, key: &str) -> &[String] {
        self.messages.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// First message for `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).first().map(String::as_str)
    }

    /// Field names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    /// Every message, flattened in field order
    pub fn all(&self) -> Vec<&str> {
        self.messages
            .values()
            .flat_map(|m| m.iter().map(String::as_str))
            .collect()
    }

    /// Number of fields with messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Total number of messages across all fields
    pub fn count(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Vec<String>> {
        self.messages.iter()
    }

    pub fn into_inner(self) -> IndexMap<String, Vec<String>> {
        self.messages
    }
}

impl From<IndexMap<String, Vec<String>>> for MessageBag {
    fn from(messages: IndexMap<String, Vec<String>>) -> Self {
        messages.into_iter().collect()
    }
}

impl<K, V, M> FromIterator<(K, V)> for MessageBag
where
    K: Into<String>,
    V: IntoIterator<Item = M>,
    M: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = MessageBag::new();
        for (key, messages) in iter {
            let key = key.into();
            for message in messages {
                bag.add(key.clone(), message);
            }
        }
        bag
    }
}

impl<'a> IntoIterator for &'a MessageBag {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = indexmap::map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
