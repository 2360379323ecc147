use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Field holding the alias of a host.
pub const HOST: &str = "host";

/// One remote machine: a flat mapping of field name to value.
///
/// Unrecognized fields are carried along untouched so that registries written
/// by newer versions survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct HostRecord {
    fields: BTreeMap<String, String>,
}

impl HostRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record with only the alias filled in.
    pub fn with_alias(alias: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.set(HOST, alias);
        record
    }

    /// The alias, if it has been resolved already.
    pub fn alias(&self) -> Option<&str> {
        self.get(HOST)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Like [`HostRecord::get`], but treats an empty value as absent.
    pub fn non_empty(&self, field: &str) -> Option<&str> {
        self.get(field).filter(|value| !value.is_empty())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Overwrites this record's fields with every field of `overrides`.
    pub fn merge(&mut self, overrides: &HostRecord) {
        for (field, value) in overrides.iter() {
            self.set(field, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HostRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// All known hosts, keyed by alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Registry {
    hosts: BTreeMap<String, HostRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a host, failing with [`ConfigError::MissingHost`] if unknown.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingHost` if no entry exists for `alias`.
    pub fn get(&self, alias: &str) -> Result<&HostRecord, ConfigError> {
        self.hosts
            .get(alias)
            .ok_or_else(|| ConfigError::MissingHost(alias.to_string()))
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.hosts.contains_key(alias)
    }

    /// Replaces the whole entry for `alias`.
    pub fn insert(&mut self, alias: impl Into<String>, record: HostRecord) {
        self.hosts.insert(alias.into(), record);
    }

    pub fn remove(&mut self, alias: &str) -> Option<HostRecord> {
        self.hosts.remove(alias)
    }

    /// Adds every entry of `other`, replacing entries with the same alias.
    pub fn extend(&mut self, other: Registry) {
        self.hosts.extend(other.hosts);
    }

    pub fn aliases(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, HostRecord> {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl IntoIterator for Registry {
    type Item = (String, HostRecord);
    type IntoIter = btree_map::IntoIter<String, HostRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.into_iter()
    }
}

impl FromIterator<(String, HostRecord)> for Registry {
    fn from_iter<I: IntoIterator<Item = (String, HostRecord)>>(iter: I) -> Self {
        Self {
            hosts: iter.into_iter().collect(),
        }
    }
}
