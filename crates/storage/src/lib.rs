//! Ordered key-value storage for the reward engine.
//!
//! Everything the distribution module persists goes through [`KvStore`]:
//! keys are raw bytes compared lexicographically, values are JSON documents.
//! Three backends are provided: [`MemoryStore`] for tests and genesis tooling,
//! [`SledStore`] for on-disk persistence and [`CacheStore`], a write buffer
//! over any other store used to make a multi-step operation all-or-nothing.

use serde::de::DeserializeOwned;
use serde::Serialize;

mod cache;
mod memory;
mod sled_store;

pub use cache::CacheStore;
pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A key/value pair returned from range scans.
pub type Entry = (Vec<u8>, Vec<u8>);

/// Byte-ordered key-value store.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()>;
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Entries with `start <= key < end` in ascending key order.
    /// A missing `end` scans to the end of the keyspace.
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<Entry>>;

    /// All entries whose key begins with `prefix`, ascending.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>> {
        let end = prefix_end(prefix);
        self.range(prefix, end.as_deref())
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Smallest key strictly greater than every key starting with `prefix`.
/// `None` when the prefix is empty or all `0xff`.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// JSON helpers available on every store.
pub trait JsonStore: KvStore {
    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes)
    }
}

impl<S: KvStore + ?Sized> JsonStore for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_end_increments_last_byte() {
        assert_eq!(prefix_end(&[0x05, 0x01]), Some(vec![0x05, 0x02]));
        assert_eq!(prefix_end(&[0x05, 0xff]), Some(vec![0x06]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(&[]), None);
    }

    #[test]
    fn json_helpers_roundtrip() {
        let mut store = MemoryStore::new();
        store.set_json(b"k", &vec![1u64, 2, 3]).unwrap();
        let back: Option<Vec<u64>> = store.get_json(b"k").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
        let missing: Option<Vec<u64>> = store.get_json(b"absent").unwrap();
        assert!(missing.is_none());
    }
}
