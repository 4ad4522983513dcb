//! Error handling
//!
//! Defines error types and their translation into FTP replies.

pub mod handlers;
pub mod types;

pub use handlers::{error_to_ftp_code, error_to_response, handle_error};
pub use types::*;
