//! Batched key/value input for header and parameter setters

use std::collections::{BTreeMap, HashMap};

/// Ordered list of string pairs
///
/// Built from a mapping, a sequence of pairs, or separate key and value
/// slices with an explicit count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues(Vec<(String, String)>);

impl KeyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair up to `count` keys with values, stopping early if either runs out
    pub fn from_parallel<K, V>(keys: &[K], values: &[V], count: usize) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self(
            keys.iter()
                .zip(values)
                .take(count)
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl IntoIterator for KeyValues {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for KeyValues {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for KeyValues {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<String>> From<HashMap<K, V>> for KeyValues {
    fn from(map: HashMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

/// Keys come out sorted
impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for KeyValues {
    fn from(map: BTreeMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}
