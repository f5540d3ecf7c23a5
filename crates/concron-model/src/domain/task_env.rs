use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Environment vector handed to a task's child process.
///
/// Stored as an ordered list of key–value pairs; later entries override earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskEnv(pub Vec<KeyValue>);

impl TaskEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build an environment from `(key, value)` pairs, e.g. `std::env::vars()`.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(vars.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all key–value pairs.
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

    /// Append a key–value pair to the environment.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Environment containing only `key`.
    ///
    /// The key is always present in the result; a key missing from `self` is carried with an empty value.
    pub fn only(&self, key: &str) -> TaskEnv {
        let mut out = TaskEnv::new();
        out.push(key, self.get(key).unwrap_or_default());
        out
    }

    /// Pairs in insertion order, suitable for `Command::envs`.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|kv| (kv.key(), kv.value()))
    }
}

impl Default for TaskEnv {
    fn default() -> Self {
        Self::new()
    }
}
