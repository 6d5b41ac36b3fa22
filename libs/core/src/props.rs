use std::collections::hash_map::{self, HashMap};

use serde::{Deserialize, Serialize};

/// Owner user name
pub const USER_NAME: &str = "user";
/// Owner group name
pub const GROUP_NAME: &str = "group";
/// Octal permission string, e.g. `0644`
pub const PERMISSION: &str = "permission";
/// `true` when a writer prefers data blocks on its own node
pub const PREFER_LOCAL_WRITES: &str = "prefer-local-writes";

/// File properties: string keys are unique, iteration order is unspecified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(HashMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set `key`, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.get(USER_NAME)
    }

    pub fn group_name(&self) -> Option<&str> {
        self.get(GROUP_NAME)
    }

    /// Permission bits parsed from the octal [`PERMISSION`] property
    pub fn permission(&self) -> Option<u32> {
        self.get(PERMISSION)
            .and_then(|raw| u32::from_str_radix(raw, 8).ok())
    }

    pub fn prefer_local_writes(&self) -> bool {
        self.get(PREFER_LOCAL_WRITES)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Properties {
    type Item = (String, String);
    type IntoIter = hash_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a String);
    type IntoIter = hash_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<HashMap<String, String>> for Properties {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}
