//! Client management system
//!
//! Handles client connections, per-connection state and the control loop.

pub mod connection;
pub mod handler;
pub mod state;

pub use connection::{BackgroundCommand, ConnectionContext, ControlEvent};
pub use handler::handle_client;
pub use state::Session;
