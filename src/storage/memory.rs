//! In-memory session store

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{SessionIdentity, SessionStore, StorageResult};

/// Non-durable store; `save` only promotes staged slots
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    saved: Mutex<HashMap<String, SessionIdentity>>,
    staged: Mutex<HashMap<String, SessionIdentity>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value as of the last `save`
    pub fn saved(&self, key: &str) -> Option<SessionIdentity> {
        self.saved.lock().get(key).cloned()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> StorageResult<Option<SessionIdentity>> {
        if let Some(value) = self.staged.lock().get(key) {
            return Ok(Some(value.clone()));
        }
        Ok(self.saved(key))
    }

    fn set(&self, key: &str, value: SessionIdentity) -> StorageResult<()> {
        self.staged.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn save(&self) -> StorageResult<()> {
        let staged: Vec<_> = self.staged.lock().drain().collect();
        self.saved.lock().extend(staged);
        Ok(())
    }
}
