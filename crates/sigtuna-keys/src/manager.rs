#![forbid(unsafe_code)]

//! Keys manager: the trusted keys consulted during verification.

use crate::key::Key;
use sigtuna_core::Error;

/// An unordered collection of trusted keys.  Adopting a key moves it into
/// the manager, which owns it from then on.
#[derive(Debug, Default)]
pub struct KeysManager {
    keys: Vec<Key>,
}

impl KeysManager {
    /// Create an empty keys manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `key`.  Names must be unique within a manager.
    pub fn adopt(&mut self, key: Key) -> Result<(), Error> {
        if let Some(name) = key.name.as_deref() {
            if self.find_by_name(name).is_some() {
                tracing::debug!(name, "duplicate key name");
                return Err(Error::KeysManager("adopt key failed".into()));
            }
        }
        self.keys.push(key);
        Ok(())
    }

    /// Find a key by name.
    pub fn find_by_name(&self, name: &str) -> Option<&Key> {
        self.keys.iter().find(|k| k.name.as_deref() == Some(name))
    }

    /// Keys whose public component equals `key`'s.
    pub fn find_by_public_key(&self, key: &Key) -> Vec<&Key> {
        self.keys
            .iter()
            .filter(|k| k.data.same_public(&key.data))
            .collect()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Build a manager adopting `keys` in order.  Either every key is adopted
/// or the whole manager, with the keys adopted so far, is dropped.
pub fn create_keys_manager(keys: Vec<Key>) -> Result<KeysManager, Error> {
    let mut manager = KeysManager::new();
    for (index, key) in keys.into_iter().enumerate() {
        if let Err(e) = manager.adopt(key) {
            tracing::debug!(index, error = %e, "keys manager creation aborted");
            return Err(Error::KeysManager("create keys manager failed".into()));
        }
    }
    tracing::debug!(keys = manager.len(), "created keys manager");
    Ok(manager)
}
