//! Thread-safe association from a Vulkan handle to the layer's record for it.
//!
//! Keys are the handle values themselves (identity, not structure). Records
//! are handed out as `Arc`s so no map shard stays locked while a hook calls
//! down into the driver.

use std::hash::Hash;
use std::sync::Arc;

use ash::vk::Handle;
use dashmap::DashMap;
use tracing::warn;

use crate::error::LayerError;

pub struct Registry<H, R> {
    kind: &'static str,
    records: DashMap<H, Arc<R>>,
}

impl<H, R> Registry<H, R>
where
    H: Handle + Copy + Eq + Hash,
{
    /// `kind` names the handle type in diagnostics, e.g. "VkDevice".
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            records: DashMap::new(),
        }
    }

    /// Register the record for a freshly created handle.
    pub fn insert(&self, handle: H, record: R) -> Arc<R> {
        let record = Arc::new(record);
        if self.records.insert(handle, Arc::clone(&record)).is_some() {
            warn!("{} {:#x} registered twice", self.kind, handle.as_raw());
        }
        record
    }

    /// Look up the record for a handle a creation hook has registered.
    pub fn get(&self, handle: H) -> Result<Arc<R>, LayerError> {
        self.records
            .get(&handle)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| self.not_found(handle))
    }

    /// Unregister a handle, returning its record.
    pub fn remove(&self, handle: H) -> Result<Arc<R>, LayerError> {
        self.records
            .remove(&handle)
            .map(|(_, r)| r)
            .ok_or_else(|| self.not_found(handle))
    }

    pub fn contains(&self, handle: H) -> bool {
        self.records.contains_key(&handle)
    }

    /// Drop every record for which `keep` returns false.
    pub fn retain(&self, mut keep: impl FnMut(&H, &R) -> bool) {
        self.records.retain(|h, r| keep(h, r));
    }

    /// Handles whose record satisfies `pred`.
    pub fn handles_where(&self, mut pred: impl FnMut(&R) -> bool) -> Vec<H> {
        self.records
            .iter()
            .filter(|entry| pred(entry.value()))
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    fn not_found(&self, handle: H) -> LayerError {
        LayerError::HandleNotFound {
            kind: self.kind,
            raw: handle.as_raw(),
        }
    }
}
