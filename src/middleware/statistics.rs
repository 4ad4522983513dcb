//! Statistics sink
//!
//! Counts received commands and running transfers. The default collector
//! only keeps counters and logs them at debug level.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use log::debug;

use super::CommandMiddleware;
use crate::protocol::{CommandContext, Reply};

pub trait StatisticsCollector: Send + Sync {
    fn command_received(&self, verb: &str);

    fn transfer_started(&self, id: &str);

    fn transfer_stopped(&self, id: &str);
}

#[derive(Debug, Default)]
pub struct LoggingStatistics {
    commands: AtomicU64,
    transfers_started: AtomicU64,
    active_transfers: AtomicUsize,
}

impl LoggingStatistics {
    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn transfers_started(&self) -> u64 {
        self.transfers_started.load(Ordering::Relaxed)
    }

    pub fn active_transfers(&self) -> usize {
        self.active_transfers.load(Ordering::Relaxed)
    }
}

impl StatisticsCollector for LoggingStatistics {
    fn command_received(&self, verb: &str) {
        let total = self.commands.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Command {} received ({} total)", verb, total);
    }

    fn transfer_started(&self, id: &str) {
        self.transfers_started.fetch_add(1, Ordering::Relaxed);
        let active = self.active_transfers.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Transfer {} started ({} active)", id, active);
    }

    fn transfer_stopped(&self, id: &str) {
        let active = self
            .active_transfers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
            .map(|previous| previous.saturating_sub(1))
            .unwrap_or(0);
        debug!("Transfer {} stopped ({} active)", id, active);
    }
}

/// Reports every dispatched command to the collector.
pub struct StatisticsMiddleware {
    statistics: Arc<dyn StatisticsCollector>,
}

impl StatisticsMiddleware {
    pub fn new(statistics: Arc<dyn StatisticsCollector>) -> Self {
        Self { statistics }
    }
}

#[async_trait]
impl CommandMiddleware for StatisticsMiddleware {
    async fn before(&self, ctx: &CommandContext) -> Option<Reply> {
        self.statistics.command_received(ctx.command.name());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = LoggingStatistics::default();
        stats.command_received("USER");
        stats.command_received("PASS");
        stats.transfer_started("a");
        stats.transfer_started("b");
        stats.transfer_stopped("a");
        assert_eq!(stats.commands(), 2);
        assert_eq!(stats.transfers_started(), 2);
        assert_eq!(stats.active_transfers(), 1);
        stats.transfer_stopped("b");
        stats.transfer_stopped("b");
        assert_eq!(stats.active_transfers(), 0);
    }
}
