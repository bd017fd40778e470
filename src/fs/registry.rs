//! in-memory user and group tables
//!
//! A [Registry] answers lookups both by id and by name. Both indices are only
//! ever changed together, through [Registry::insert], [Registry::remove] and [Registry::modify].
use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::{
    error::{FsError, Result},
    utils::traits::FixedSizeRecord,
};

use super::{BLOCK_SIZE, CREDENTIALS_PER_BLOCK, NONE};

/// a record with a numeric id and a unique name
pub trait Credential {
    fn id(&self) -> u32;
    fn name(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct Registry<T> {
    by_id: BTreeMap<u32, T>,
    by_name: HashMap<String, u32>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            by_id: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T: Credential> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// how many records fit in one table block
    pub const fn capacity(&self) -> usize {
        CREDENTIALS_PER_BLOCK
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// records in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.by_id.values()
    }

    /// smallest id above every id in use
    pub fn next_id(&self) -> u32 {
        self.by_id.keys().next_back().map_or(0, |id| id + 1)
    }

    pub fn insert(&mut self, record: T) -> Result<()> {
        let (id, name) = (record.id(), record.name());
        if id == NONE {
            return Err(FsError::Validation(format!("id {id} is reserved")));
        }
        if name.is_empty() {
            return Err(FsError::Validation("name must not be empty".to_string()));
        }
        if self.by_id.contains_key(&id) {
            return Err(FsError::AlreadyExists(format!("id {id}")));
        }
        if self.by_name.contains_key(&name) {
            return Err(FsError::AlreadyExists(format!("'{name}'")));
        }
        if self.len() >= self.capacity() {
            return Err(FsError::Capacity(format!(
                "a table block holds at most {} records",
                self.capacity()
            )));
        }
        self.by_name.insert(name, id);
        self.by_id.insert(id, record);
        Ok(())
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        let record = self.by_id.remove(&id)?;
        self.by_name.remove(&record.name());
        Some(record)
    }

    /// change the record `id` in place, renaming is allowed as long as the new name is unused
    ///
    /// `f` must not change the id
    pub fn modify<F>(&mut self, id: u32, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let mut updated = self
            .remove(id)
            .ok_or_else(|| FsError::NotFound(format!("id {id}")))?;
        let old_name = updated.name();
        f(&mut updated);

        if updated.id() != id {
            let message = format!("id {id} cannot be changed to {}", updated.id());
            self.restore(old_name, id, updated);
            return Err(FsError::Validation(message));
        }
        let new_name = updated.name();
        if new_name.is_empty() || self.by_name.contains_key(&new_name) {
            let message = format!("'{new_name}' is empty or already in use");
            self.restore(old_name, id, updated);
            return Err(FsError::Validation(message));
        }
        self.by_name.insert(new_name, id);
        self.by_id.insert(id, updated);
        Ok(())
    }

    // put back a record whose update was rejected, under its old name
    fn restore(&mut self, old_name: String, id: u32, record: T) {
        self.by_name.insert(old_name, id);
        self.by_id.insert(id, record);
    }
}

/// persistence as one block: a 4 byte record count followed by fixed size records
impl<T: Credential + FixedSizeRecord> Registry<T> {
    pub fn to_block(&self) -> Result<Vec<u8>> {
        let mut block = vec![0u8; BLOCK_SIZE as usize];
        let mut offset = 4;
        let mut written: u32 = 0;
        for record in self.iter() {
            if offset + T::SIZE > block.len() {
                warn!(
                    "table block is full, record {} ('{}') is not persisted",
                    record.id(),
                    record.name()
                );
                continue;
            }
            record.encode_into(&mut block[offset..offset + T::SIZE])?;
            offset += T::SIZE;
            written += 1;
        }
        block[..4].copy_from_slice(&written.to_be_bytes());
        Ok(block)
    }

    pub fn from_block(block: &[u8]) -> Result<Self> {
        let prefix: [u8; 4] = block
            .get(..4)
            .and_then(|p| p.try_into().ok())
            .ok_or_else(|| FsError::Codec("table block is shorter than its count".to_string()))?;
        let count = u32::from_be_bytes(prefix) as usize;
        let fits = (block.len() - 4) / T::SIZE;
        if count > fits {
            warn!("table block claims {count} records but only {fits} fit, reading {fits}");
        }

        let mut registry = Registry::new();
        for slot in block[4..].chunks_exact(T::SIZE).take(count.min(fits)) {
            let record = T::from_bytes(slot)?;
            if record.id() == NONE {
                continue;
            }
            if let Err(e) = registry.insert(record) {
                warn!("skipping table record: {e}");
            }
        }
        Ok(registry)
    }
}
