//! Ordered HTTP header list with case-insensitive replacement.

use serde::Serialize;

/// Request headers in insertion order.
///
/// Setting a header whose name matches an existing one, ignoring ASCII case,
/// replaces the earlier value in place.
///
/// # Examples
/// ```
/// use tabula_core::HeaderSet;
///
/// let mut headers = HeaderSet::new();
/// headers.set("authorization", "Token a");
/// headers.set("Authorization", "Bearer b");
/// assert_eq!(headers.len(), 1);
/// assert_eq!(headers.get("AUTHORIZATION"), Some("Bearer b"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderSet(Vec<(String, String)>);

impl HeaderSet {
    /// An empty header list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => *slot = (name, value),
            None => self.0.push((name, value)),
        }
    }

    /// Builder form of [`HeaderSet::set`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Apply every header in `overrides`, replacing clashing names.
    pub fn merge<I, K, V>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in overrides {
            self.set(name, value);
        }
    }

    /// Value of `name`, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterate over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no headers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        headers.merge(iter);
        headers
    }
}
