//! Fixed-bucket hash table keyed by [`ResourceId`].
//!
//! The id is already a hash of the resource name, so the bucket is picked
//! straight from its low bits. Buckets are small vectors searched linearly.
//! Keys are unique: inserting an id that is present hands the value back.

use crate::id::ResourceId;

/// Default bucket count of the resource index.
pub const DEFAULT_BUCKETS: usize = 256;

/// Id-keyed table with `BUCKETS` chained buckets.
pub struct ResourceTable<V, const BUCKETS: usize = DEFAULT_BUCKETS> {
    buckets: Vec<Vec<(ResourceId, V)>>,
    len: usize,
}

impl<V, const BUCKETS: usize> ResourceTable<V, BUCKETS> {
    pub fn new() -> Self {
        assert!(BUCKETS > 0, "resource table needs at least one bucket");
        Self {
            buckets: (0..BUCKETS).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    fn bucket_of(id: ResourceId) -> usize {
        id.0 as usize % BUCKETS
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ResourceId) -> Option<&V> {
        self.buckets[Self::bucket_of(id)]
            .iter()
            .find(|(k, _)| *k == id)
            .map(|(_, v)| v)
    }

    /// Inserts a new entry. Returns the value back if the id is taken.
    pub fn insert(&mut self, id: ResourceId, value: V) -> Result<(), V> {
        let bucket = &mut self.buckets[Self::bucket_of(id)];
        if bucket.iter().any(|(k, _)| *k == id) {
            return Err(value);
        }
        bucket.push((id, value));
        self.len += 1;
        Ok(())
    }

    /// Removes an entry, returning its value.
    pub fn remove(&mut self, id: ResourceId) -> Option<V> {
        let bucket = &mut self.buckets[Self::bucket_of(id)];
        let pos = bucket.iter().position(|(k, _)| *k == id)?;
        self.len -= 1;
        Some(bucket.swap_remove(pos).1)
    }

    /// Iterates all entries, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &V)> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|(k, v)| (*k, v)))
    }

    /// Removes every entry and returns them.
    pub fn drain(&mut self) -> Vec<(ResourceId, V)> {
        self.len = 0;
        self.buckets.iter_mut().flat_map(|b| b.drain(..)).collect()
    }
}

impl<V, const BUCKETS: usize> Default for ResourceTable<V, BUCKETS> {
    fn default() -> Self {
        Self::new()
    }
}
