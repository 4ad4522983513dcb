//! Authentication system
//!
//! Handles user credential validation for USER/PASS.

pub mod credentials;
pub mod validator;

pub use credentials::CredentialStore;
pub use validator::{CredentialValidator, Principal, StaticCredentials, is_valid_input};
