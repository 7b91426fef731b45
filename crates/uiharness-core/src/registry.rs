//! Widget registry
//!
//! Maps textual widget ids to host handles. Entries live in a fixed-capacity
//! arena so iteration follows registration order, which is also the hit-test
//! order for coordinate clicks.

use crate::error::HarnessError;
use std::collections::HashMap;
use uiharness_protocol::MAX_ID_LEN;

#[derive(Debug, Clone)]
struct Entry<H> {
    id: String,
    handle: H,
}

/// Fixed-capacity id to handle map
#[derive(Debug, Clone)]
pub struct WidgetRegistry<H> {
    entries: Vec<Entry<H>>,
    index: HashMap<String, usize>,
    capacity: usize,
}

impl<H> WidgetRegistry<H> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Associate `id` with `handle`
    ///
    /// Re-registering an id replaces its handle and keeps its position.
    pub fn register(&mut self, id: &str, handle: H) -> Result<(), HarnessError> {
        if id.is_empty() {
            return Err(HarnessError::InvalidParam("widget id is empty".into()));
        }
        if id.len() > MAX_ID_LEN {
            return Err(HarnessError::InvalidParam(format!(
                "widget id '{}' exceeds {} bytes",
                id, MAX_ID_LEN
            )));
        }

        if let Some(&slot) = self.index.get(id) {
            tracing::warn!("Widget '{}' re-registered, replacing previous handle", id);
            self.entries[slot].handle = handle;
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            return Err(HarnessError::InvalidParam(format!(
                "registry full ({} widgets), cannot register '{}'",
                self.capacity, id
            )));
        }

        self.index.insert(id.to_string(), self.entries.len());
        self.entries.push(Entry {
            id: id.to_string(),
            handle,
        });
        tracing::debug!("Registered widget '{}'", id);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<&H, HarnessError> {
        self.index
            .get(id)
            .map(|&slot| &self.entries[slot].handle)
            .ok_or_else(|| HarnessError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    /// Entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &H)> {
        self.entries.iter().map(|e| (e.id.as_str(), &e.handle))
    }
}
