//! Logging middleware
//!
//! Records every command and the reply it produced.

use async_trait::async_trait;
use log::{debug, info};

use super::CommandMiddleware;
use crate::protocol::{CommandContext, Reply};

#[derive(Debug, Default)]
pub struct LoggingMiddleware;

#[async_trait]
impl CommandMiddleware for LoggingMiddleware {
    async fn before(&self, ctx: &CommandContext) -> Option<Reply> {
        // Command's Display masks the PASS argument.
        info!("Client {} executed: {}", ctx.connection.peer(), ctx.command);
        None
    }

    async fn after(&self, ctx: &CommandContext, reply: &Reply) {
        debug!(
            "Client {} {} -> {}",
            ctx.connection.peer(),
            ctx.command.name(),
            reply.response().code()
        );
    }
}
