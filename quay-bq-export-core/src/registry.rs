//! Destination-keyed registry of open writers.
//!
//! The map lock only guards lookup, insertion and removal. Each writer sits
//! behind its own async mutex, so writes and closes on one destination never
//! block other destinations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub type Slot<W> = Arc<tokio::sync::Mutex<W>>;

pub struct KeyedRegistry<W> {
    slots: Mutex<HashMap<String, Slot<W>>>,
}

impl<W> Default for KeyedRegistry<W> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<W> KeyedRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer for `key`, opening one with `open` if none is registered.
    pub fn acquire_or_insert_with(&self, key: &str, open: impl FnOnce() -> W) -> Slot<W> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(open())))
            .clone()
    }

    /// Unregister `key`, handing the writer back for finalization.
    pub fn release(&self, key: &str) -> Option<Slot<W>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
