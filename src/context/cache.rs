//! Remote context fetch memoization
//!
//! One cache per run, owned by the deployment context. Guarantees exactly
//! one fetch attempt per distinct remote path for the lifetime of the run;
//! "file not found" is cached as an explicit empty mapping by the caller.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_yaml_ng::Value;

use super::resolver::ContextError;

/// Memoizes parsed per-host context files by remote path. Entries are never
/// evicted; the cache lives for a single deployment run.
#[derive(Debug, Default)]
pub struct ContextCache {
    entries: HashMap<String, Value>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized value for `path`, invoking `fetch` on first use.
    ///
    /// A failed fetch is not cached: the error propagates and a later call
    /// retries.
    pub fn get_or_fetch<F>(&mut self, path: &str, fetch: F) -> Result<&Value, ContextError>
    where
        F: FnOnce() -> Result<Value, ContextError>,
    {
        match self.entries.entry(path.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(fetch()?)),
        }
    }

    /// Number of cached paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
