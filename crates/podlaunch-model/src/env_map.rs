use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};

use crate::KeyValue;

/// Environment map delivered with the hand-off documents.
///
/// Stored as an ordered list of key–value pairs; the wire form is a JSON object whose
/// document order is preserved. Read-only once the hand-off completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentMap(Vec<KeyValue>);

impl EnvironmentMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all entries in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Get the value for a key, returning the last matching entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|kv| kv.key() == key)
    }

    /// Append an entry. Later entries override earlier ones when queried via
    /// [`EnvironmentMap::get`].
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Keep only the declared keys that are present, in the order of `keys`.
    ///
    /// Keys missing from the map are skipped rather than defaulted.
    pub fn project<'a, I>(&self, keys: I) -> EnvironmentMap
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = EnvironmentMap::new();
        for key in keys {
            if let Some(value) = self.get(key) {
                out.push(key, value);
            }
        }
        out
    }

    /// Merge two maps, entries from `other` win.
    pub fn merged(&self, other: &EnvironmentMap) -> EnvironmentMap {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        EnvironmentMap(out)
    }

    /// Collapse into `(key, value)` pairs with overrides resolved, keeping first-seen key order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::with_capacity(self.0.len());
        for kv in &self.0 {
            match out.iter_mut().find(|(k, _)| k == kv.key()) {
                Some(slot) => slot.1 = kv.value().to_string(),
                None => out.push((kv.key().to_string(), kv.value().to_string())),
            }
        }
        out
    }
}

impl Default for EnvironmentMap {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for EnvironmentMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }
}

impl Serialize for EnvironmentMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let pairs = self.to_pairs();
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (k, v) in &pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EnvironmentMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EnvVisitor;

        impl<'de> Visitor<'de> for EnvVisitor {
            type Value = EnvironmentMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of string keys to string values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut out = EnvironmentMap(Vec::with_capacity(access.size_hint().unwrap_or(0)));
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    out.push(k, v);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(EnvVisitor)
    }
}
