//! Call metadata.

use std::collections::BTreeMap;

/// Case-insensitive, multi-valued string map carried beside each call.
///
/// Keys are stored lower-cased, so `Set-Cookie` and `set-cookie` name the
/// same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values stored under `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace every value of `key` with `value`.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.set(key, vec![value.into()]);
    }

    /// Replace every value of `key` with `values`.
    pub fn set(&mut self, key: impl AsRef<str>, values: Vec<String>) {
        self.entries.insert(key.as_ref().to_ascii_lowercase(), values);
    }

    pub fn append(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(key.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    /// Iterate keys with all their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MetadataMap
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = MetadataMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let mut md = MetadataMap::new();
        md.append("X-Trace", "a");
        md.append("x-trace", "b");

        assert_eq!(md.get("X-TRACE"), Some("a"));
        assert_eq!(md.get_all("x-trace"), ["a".to_string(), "b".to_string()]);
        assert_eq!(md.len(), 1);
    }

    #[test]
    fn insert_replaces_values() {
        let mut md: MetadataMap = [("k", "1"), ("k", "2")].into_iter().collect();
        md.insert("K", "3");
        assert_eq!(md.get_all("k"), ["3".to_string()]);

        assert!(md.remove("k").is_some());
        assert!(md.is_empty());
        assert!(md.get_all("k").is_empty());
    }
}
