use stakeflow_storage::{CacheStore, KvStore};
use stakeflow_types::{BlockHeader, Height, Timestamp};

use crate::errors::Result;

/// Store handle plus the header of the block being executed.
///
/// Every keeper operation takes one of these; the keeper itself holds no
/// chain state between calls.
pub struct Context<'a> {
    store: &'a mut (dyn KvStore + 'a),
    header: BlockHeader,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a mut (dyn KvStore + 'a), header: BlockHeader) -> Self {
        Self { store, header }
    }

    pub fn header(&self) -> BlockHeader {
        self.header
    }

    pub fn height(&self) -> Height {
        self.header.height
    }

    pub fn time(&self) -> Timestamp {
        self.header.time
    }

    pub fn store(&self) -> &(dyn KvStore + 'a) {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut (dyn KvStore + 'a) {
        &mut *self.store
    }

    /// Runs `op` on a write-buffered branch and commits only if it succeeds.
    pub fn transact<T>(&mut self, op: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        let header = self.header;
        let mut cache = CacheStore::new(&mut *self.store);
        let value = {
            let mut branch = Context::new(&mut cache, header);
            op(&mut branch)?
        };
        cache.commit()?;
        Ok(value)
    }

    /// Runs `op` on a throwaway branch; nothing it writes is kept.
    pub fn simulate<T>(&self, op: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        let mut scratch = CacheStore::new(&*self.store);
        let mut branch = Context::new(&mut scratch, self.header);
        op(&mut branch)
    }
}
