//! Cache of attribute values, with per channel validity.

use std::{collections::HashMap, fmt::Debug, hash::Hash};

use crate::{InstrumentError, Value};

/// One cached attribute value.
///
/// An entry starts out unset and invalid. It becomes valid after a successful read or a write,
/// and invalid again when it is invalidated. Invalidation keeps the last value around.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    value: Option<Value>,
    valid: bool,
}

impl CacheEntry {
    /// The last known value, if any was ever read or written.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Whether the value still reflects the instrument state.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Cache entries keyed by attribute and slot.
///
/// Every attribute owns a fixed number of slots that is set when the attribute is allocated:
/// one per output channel for indexed attributes, a single one otherwise.
#[derive(Debug, Clone)]
pub struct CacheStore<K> {
    entries: HashMap<K, Vec<CacheEntry>>,
}

impl<K> Default for CacheStore<K> {
    fn default() -> Self {
        CacheStore {
            entries: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + Debug> CacheStore<K> {
    /// Create an empty cache store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `slots` unset entries for `key`, replacing any entries it had.
    pub fn allocate(&mut self, key: K, slots: usize) {
        self.entries.insert(key, vec![CacheEntry::default(); slots]);
    }

    /// Get the entry of `key` in `slot`, if it is allocated.
    pub fn entry(&self, key: K, slot: usize) -> Option<&CacheEntry> {
        self.entries.get(&key).and_then(|slots| slots.get(slot))
    }

    /// Whether `key` in `slot` holds a valid value.
    pub fn is_valid(&self, key: K, slot: usize) -> bool {
        self.entry(key, slot).is_some_and(CacheEntry::is_valid)
    }

    /// The last known value of `key` in `slot`, valid or not.
    pub fn value(&self, key: K, slot: usize) -> Option<&Value> {
        self.entry(key, slot).and_then(CacheEntry::value)
    }

    /// Store `value` for `key` in `slot` and mark it valid.
    pub fn store(&mut self, key: K, slot: usize, value: Value) -> Result<(), InstrumentError> {
        let entry = self.entry_mut(key, slot)?;
        entry.value = Some(value);
        entry.valid = true;
        Ok(())
    }

    /// Mark `key` in `slot` invalid.
    pub fn invalidate(&mut self, key: K, slot: usize) -> Result<(), InstrumentError> {
        self.entry_mut(key, slot)?.valid = false;
        Ok(())
    }

    /// Mark every slot of `key` invalid.
    pub fn invalidate_key(&mut self, key: K) {
        if let Some(slots) = self.entries.get_mut(&key) {
            slots.iter_mut().for_each(|entry| entry.valid = false);
        }
    }

    /// Mark every entry in the store invalid.
    pub fn invalidate_all(&mut self) {
        self.entries
            .values_mut()
            .flat_map(|slots| slots.iter_mut())
            .for_each(|entry| entry.valid = false);
    }

    fn entry_mut(&mut self, key: K, slot: usize) -> Result<&mut CacheEntry, InstrumentError> {
        let slots = self.entries.get_mut(&key).ok_or_else(|| {
            InstrumentError::InvalidArgument(format!("No cache allocated for attribute {key:?}"))
        })?;
        let nof_channels = slots.len();
        slots
            .get_mut(slot)
            .ok_or(InstrumentError::ChannelIndexOutOfRange {
                idx: slot,
                nof_channels,
            })
    }
}
