//! RAX FTP daemon
//!
//! An asynchronous FTP server protocol engine: command line collection,
//! login and security negotiation, data connections, a background transfer
//! worker and a middleware-wrapped command dispatcher.

pub mod auth;
pub mod background;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod security;
pub mod server;
pub mod storage;
pub mod transfer;

pub use config::ServerConfig;
pub use error::FtpServerError;
pub use server::Server;
