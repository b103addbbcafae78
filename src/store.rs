//! Durable and transient key-value persistence
//!
//! Form records live in a durable store (LocalStorage on web) and the
//! post-delete message lives in a transient store (SessionStorage on web)
//! until the next load consumes it. Backend failures are logged and
//! treated as absence; nothing here returns an error to the saver.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::field::FormRecord;

/// Prefix for every key the saver writes
pub const KEY_PREFIX: &str = "formSaver-";
/// Suffix for a form's one-shot message key
pub const MESSAGE_SUFFIX: &str = "-formSaverMessage";

/// Durable key for a form's record
pub fn record_key(form_id: &str) -> String {
    format!("{KEY_PREFIX}{form_id}")
}

/// Transient key for a form's pending message
pub fn message_key(form_id: &str) -> String {
    format!("{KEY_PREFIX}{form_id}{MESSAGE_SUFFIX}")
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable")]
    Unavailable,
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key-value storage primitive
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store, used for headless runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// Record and message persistence over a durable and a transient store
#[derive(Clone)]
pub struct PersistenceStore {
    durable: Rc<dyn KeyValueStore>,
    transient: Rc<dyn KeyValueStore>,
}

impl PersistenceStore {
    pub fn new(durable: Rc<dyn KeyValueStore>, transient: Rc<dyn KeyValueStore>) -> Self {
        Self { durable, transient }
    }

    /// Two fresh in-memory stores
    pub fn in_memory() -> Self {
        Self::new(Rc::new(MemoryStore::new()), Rc::new(MemoryStore::new()))
    }

    /// Write `record`, replacing whatever was stored under `key`
    pub fn save(&self, key: &str, record: &FormRecord) {
        let result = serde_json::to_string(record)
            .map_err(StoreError::from)
            .and_then(|json| self.durable.set_item(key, &json));
        if let Err(e) = result {
            log::warn!("Failed to save {key}: {e}");
        }
    }

    /// Delete `key`; a missing key is fine
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.durable.remove_item(key) {
            log::warn!("Failed to remove {key}: {e}");
        }
    }

    /// Read the record under `key`. Missing, unreadable and corrupted
    /// entries all come back as `None`.
    pub fn load(&self, key: &str) -> Option<FormRecord> {
        let json = match self.durable.get_item(key) {
            Ok(json) => json?,
            Err(e) => {
                log::warn!("Failed to read {key}: {e}");
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Discarding corrupted record {key}: {e}");
                None
            }
        }
    }

    pub fn transient_set(&self, key: &str, value: &str) {
        if let Err(e) = self.transient.set_item(key, value) {
            log::warn!("Failed to stash {key}: {e}");
        }
    }

    pub fn transient_get(&self, key: &str) -> Option<String> {
        self.transient.get_item(key).unwrap_or_else(|e| {
            log::warn!("Failed to read {key}: {e}");
            None
        })
    }

    pub fn transient_clear(&self, key: &str) {
        if let Err(e) = self.transient.remove_item(key) {
            log::warn!("Failed to clear {key}: {e}");
        }
    }
}
