use std::collections::BTreeMap;
use std::ops::{Bound, Deref, DerefMut};

use tracing::trace;

use crate::{Entry, KvStore, Result};

/// Write buffer layered over another store.
///
/// Reads see buffered writes first. Nothing reaches the parent until
/// [`CacheStore::commit`]; dropping the cache discards every buffered write.
/// The parent handle may be a shared reference, in which case the cache is a
/// scratch branch that can never be committed.
pub struct CacheStore<P> {
    parent: P,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<P> CacheStore<P>
where
    P: Deref,
    P::Target: KvStore,
{
    pub fn new(parent: P) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Number of buffered writes and deletes.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }
}

impl<P> CacheStore<P>
where
    P: DerefMut,
    P::Target: KvStore,
{
    /// Applies buffered writes to the parent in key order.
    pub fn commit(self) -> Result<()> {
        let Self { mut parent, writes } = self;
        let count = writes.len();
        for (key, value) in writes {
            match value {
                Some(value) => parent.set(&key, value)?,
                None => parent.delete(&key)?,
            }
        }
        trace!(target: "storage", writes = count, "cache committed");
        Ok(())
    }
}

impl<P> KvStore for CacheStore<P>
where
    P: Deref,
    P::Target: KvStore,
{
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.writes.insert(key.to_vec(), Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<Entry>> {
        if end.is_some_and(|end| end <= start) {
            return Ok(Vec::new());
        }
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.range(start, end)?.into_iter().collect();
        let upper = match end {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        for (key, value) in self.writes.range::<[u8], _>((Bound::Included(start), upper)) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}
