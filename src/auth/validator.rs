//! Authentication validator
//!
//! Checks USER/PASS input against a credential provider. The engine only
//! depends on [`CredentialValidator`]; [`StaticCredentials`] is the
//! configuration-backed provider.

use async_trait::async_trait;
use log::{info, warn};

use super::credentials::CredentialStore;
use crate::config::UserEntry;
use crate::error::AuthError;

/// The authenticated identity of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
}

#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, username: &str, password: &str) -> Result<Principal, AuthError>;
}

/// Performs basic input sanitation to check for malicious or malformed usernames/passwords.
pub fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty() && input.len() <= max_length && !input.contains(['\r', '\n', '\0'])
}

pub struct StaticCredentials {
    store: CredentialStore,
    max_length: usize,
}

impl StaticCredentials {
    pub fn new(users: &[UserEntry], max_length: usize) -> Self {
        Self {
            store: CredentialStore::from_entries(users),
            max_length,
        }
    }
}

#[async_trait]
impl CredentialValidator for StaticCredentials {
    async fn validate(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        if !is_valid_input(username, self.max_length) {
            return Err(AuthError::MalformedInput("Invalid username format".into()));
        }
        if !is_valid_input(password, self.max_length) {
            return Err(AuthError::MalformedInput("Invalid password format".into()));
        }

        match self.store.password_of(username) {
            Some(stored) if stored == password => {
                info!("User {} authenticated", username);
                Ok(Principal {
                    name: username.to_string(),
                })
            }
            _ => {
                warn!("Authentication failed for user {}", username);
                Err(AuthError::InvalidCredentials(username.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> StaticCredentials {
        StaticCredentials::new(
            &[UserEntry {
                name: "alice".into(),
                password: "alice123".into(),
            }],
            64,
        )
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let principal = validator().validate("alice", "alice123").await.unwrap();
        assert_eq!(principal.name, "alice");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let v = validator();
        assert!(matches!(
            v.validate("alice", "nope").await,
            Err(AuthError::InvalidCredentials(_))
        ));
        assert!(matches!(
            v.validate("mallory", "alice123").await,
            Err(AuthError::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let v = validator();
        assert!(matches!(
            v.validate("  ", "x").await,
            Err(AuthError::MalformedInput(_))
        ));
        assert!(matches!(
            v.validate("alice", "a\0b").await,
            Err(AuthError::MalformedInput(_))
        ));
        let long = "x".repeat(65);
        assert!(matches!(
            v.validate(&long, "x").await,
            Err(AuthError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_is_valid_input() {
        assert!(is_valid_input("bob", 10));
        assert!(!is_valid_input("", 10));
        assert!(!is_valid_input("bob\r\n", 10));
    }
}
