//! Server core functionality
//!
//! The accept loop and the services shared by all connections.

pub mod core;
pub mod services;

pub use core::Server;
pub use services::ServerServices;
