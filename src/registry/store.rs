//! Concurrent entry store.
//!
//! Sharded map from service name to [`RegistryEntry`]. Report handling, the
//! sweep and query handlers all go through it without an outer lock; a shard
//! is only locked for the duration of a single closure.

use dashmap::DashMap;

use crate::registry::entry::RegistryEntry;
use crate::registry::status::ServiceStatus;

#[derive(Debug, Default)]
pub struct EntryStore {
    entries: DashMap<String, RegistryEntry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&self, entry: RegistryEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Run `f` on the named entry under its shard lock.
    ///
    /// Returns `None` if the entry does not exist.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut RegistryEntry) -> R) -> Option<R> {
        self.entries.get_mut(name).map(|mut entry| f(entry.value_mut()))
    }

    /// Remove the named entry if `predicate` holds for it.
    pub fn remove_if(&self, name: &str, predicate: impl FnOnce(&RegistryEntry) -> bool) -> bool {
        self.entries.remove_if(name, |_, entry| predicate(entry)).is_some()
    }

    /// Visit every entry mutably, dropping those for which `f` returns false.
    pub fn retain(&self, mut f: impl FnMut(&mut RegistryEntry) -> bool) {
        self.entries.retain(|_, entry| f(entry));
    }

    pub fn snapshot(&self, name: &str) -> Option<ServiceStatus> {
        self.entries.get(name).map(|entry| entry.to_status())
    }

    pub fn snapshots(&self) -> Vec<ServiceStatus> {
        self.entries.iter().map(|entry| entry.to_status()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
