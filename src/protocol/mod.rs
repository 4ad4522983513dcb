//! Protocol layer
//!
//! Command parsing and collection, replies, the handler registry and the
//! dispatcher that ties them together.

pub mod collector;
pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod registry;
pub mod responses;

pub use collector::{CommandCollector, TextEncoding};
pub use commands::Command;
pub use context::CommandContext;
pub use dispatcher::dispatch_command;
pub use registry::{CommandHandler, CommandRegistration, CommandRegistry, HandlerFactory};
pub use responses::{Reply, Response, format_response};
