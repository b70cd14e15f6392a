//! Password lookup for work items
//!
//! Credentials live in a JSON document shaped `{system: {user: {client: password}}}`.
//! The store is read once at startup and never modified during a run.

use crate::errors::AutomationError;
use crate::types::WorkItem;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Anything that can produce the password for a work item.
///
/// `None` means the item has no usable password and must be skipped.
pub trait PasswordResolver {
    fn resolve(&self, item: &WorkItem) -> Option<String>;
}

impl<F> PasswordResolver for F
where
    F: Fn(&WorkItem) -> Option<String>,
{
    fn resolve(&self, item: &WorkItem) -> Option<String> {
        self(item)
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CredentialStore {
    systems: HashMap<String, HashMap<String, HashMap<String, String>>>,
}

impl CredentialStore {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the store from disk, keeping "file missing" and "bad JSON" apart in the error text.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AutomationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AutomationError::Credentials {
            path: path.display().to_string(),
            message: if e.kind() == std::io::ErrorKind::NotFound {
                "file not found, please create it".to_string()
            } else {
                e.to_string()
            },
        })?;
        let store = Self::from_json_str(&content).map_err(|e| AutomationError::Credentials {
            path: path.display().to_string(),
            message: format!("invalid JSON, check its format: {e}"),
        })?;
        if store.is_empty() {
            warn!(
                "Credentials file '{}' has no entries. Every item will be skipped.",
                path.display()
            );
        }
        info!(
            systems = store.systems.len(),
            "Credentials file '{}' loaded",
            path.display()
        );
        Ok(store)
    }

    /// Exact lookup on system, user and client. Empty passwords count as missing.
    pub fn password(&self, system: &str, user: &str, client: &str) -> Option<&str> {
        let found = self
            .systems
            .get(system)
            .and_then(|users| users.get(user))
            .and_then(|clients| clients.get(client))
            .map(String::as_str)
            .filter(|p| !p.is_empty());
        if found.is_none() {
            debug!(system, user, client, "no credential entry");
        }
        found
    }

    pub fn insert(
        &mut self,
        system: impl Into<String>,
        user: impl Into<String>,
        client: impl Into<String>,
        password: impl Into<String>,
    ) {
        self.systems
            .entry(system.into())
            .or_default()
            .entry(user.into())
            .or_default()
            .insert(client.into(), password.into());
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl PasswordResolver for CredentialStore {
    fn resolve(&self, item: &WorkItem) -> Option<String> {
        self.password(&item.system_name, &item.user, &item.client)
            .map(str::to_string)
    }
}

// Never print secrets.
impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut systems: Vec<&String> = self.systems.keys().collect();
        systems.sort();
        f.debug_struct("CredentialStore")
            .field("systems", &systems)
            .finish()
    }
}
