use crate::infra::{KeyValueStorage, StorageError};
use std::sync::Arc;

pub const ACCOUNT_STORAGE_KEY: &str = "chatsystem.account-name";
pub const GUEST_DISPLAY_NAME: &str = "Guest user";

/// Locally remembered display name. There is no authentication behind it.
pub struct QuickAccount {
    storage: Arc<dyn KeyValueStorage>,
    name: String,
}

impl QuickAccount {
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let name = storage.get(ACCOUNT_STORAGE_KEY).unwrap_or_default();
        Self { storage, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn display_name(&self) -> &str {
        if self.is_ready() {
            self.name.trim()
        } else {
            GUEST_DISPLAY_NAME
        }
    }

    /// Name to attach to outgoing messages and to match own messages by.
    pub fn viewer_name(&self) -> Option<&str> {
        self.is_ready().then(|| self.name.trim())
    }

    pub fn save(&mut self, value: &str) -> Result<(), StorageError> {
        let normalized = value.trim().to_string();
        if normalized.is_empty() {
            self.storage.remove(ACCOUNT_STORAGE_KEY)?;
        } else {
            self.storage.set(ACCOUNT_STORAGE_KEY, &normalized)?;
        }
        self.name = normalized;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.save("")
    }
}
