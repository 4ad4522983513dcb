//! Credential storage
//!
//! In-memory user table built from the `users` section of the configuration.

use std::collections::HashMap;

use crate::config::UserEntry;

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    pub fn from_entries(entries: &[UserEntry]) -> Self {
        let users = entries
            .iter()
            .map(|entry| (entry.name.clone(), entry.password.clone()))
            .collect();
        Self { users }
    }

    pub fn password_of(&self, username: &str) -> Option<&str> {
        self.users.get(username).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
