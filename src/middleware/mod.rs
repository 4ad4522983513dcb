//! Server middleware
//!
//! Hooks wrapped around every dispatched command, applied in registration
//! order. A `before` hook may answer the command itself, in which case the
//! handler is not run.

pub mod logging;
pub mod statistics;

use async_trait::async_trait;

use crate::protocol::{CommandContext, Reply};

pub use logging::LoggingMiddleware;
pub use statistics::{LoggingStatistics, StatisticsCollector, StatisticsMiddleware};

#[async_trait]
pub trait CommandMiddleware: Send + Sync {
    async fn before(&self, _ctx: &CommandContext) -> Option<Reply> {
        None
    }

    async fn after(&self, _ctx: &CommandContext, _reply: &Reply) {}
}
