//! Background transfer entries and their observable state.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A unit of work that outlives the command which produced it.
#[async_trait]
pub trait BackgroundTransfer: Send {
    fn transfer_id(&self) -> &str;

    /// Runs the transfer. Implementations should stop early once `cancel` fires.
    async fn start(
        &mut self,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> std::io::Result<()>;

    /// Releases the transfer's resources. Called exactly once, whatever the outcome.
    async fn dispose(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundTransferStatus {
    Enqueued,
    Transferring,
    Finished,
}

impl fmt::Display for BackgroundTransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackgroundTransferStatus::Enqueued => "enqueued",
            BackgroundTransferStatus::Transferring => "transferring",
            BackgroundTransferStatus::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct EntryState {
    status: BackgroundTransferStatus,
    transferred: u64,
    finished_at: Option<Instant>,
}

/// Queue-side record of a transfer. Written by the worker, read by status queries.
#[derive(Debug)]
pub struct BackgroundTransferEntry {
    id: String,
    log_target: Option<String>,
    state: Mutex<EntryState>,
}

impl BackgroundTransferEntry {
    pub(crate) fn new(id: String, log_target: Option<String>) -> Self {
        Self {
            id,
            log_target,
            state: Mutex::new(EntryState {
                status: BackgroundTransferStatus::Enqueued,
                transferred: 0,
                finished_at: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Log target for messages about this transfer.
    pub fn log_target(&self) -> &str {
        self.log_target.as_deref().unwrap_or(module_path!())
    }

    pub fn status(&self) -> BackgroundTransferStatus {
        self.lock().status
    }

    pub fn transferred(&self) -> u64 {
        self.lock().transferred
    }

    pub(crate) fn finished_at(&self) -> Option<Instant> {
        self.lock().finished_at
    }

    pub(crate) fn set_status(&self, status: BackgroundTransferStatus) {
        let mut state = self.lock();
        state.status = status;
        if status == BackgroundTransferStatus::Finished {
            state.finished_at = Some(Instant::now());
        }
    }

    pub fn snapshot(&self) -> BackgroundTransferInfo {
        let state = self.lock();
        BackgroundTransferInfo {
            id: self.id.clone(),
            status: state.status,
            transferred: state.transferred,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntryState> {
        // The state is plain data, so a poisoned lock still holds a usable value.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Point-in-time view of an entry, as returned by `get_states`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundTransferInfo {
    pub id: String,
    pub status: BackgroundTransferStatus,
    pub transferred: u64,
}

/// Thread-safe progress callback handed to a running transfer.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    entry: Arc<BackgroundTransferEntry>,
}

impl ProgressReporter {
    pub(crate) fn new(entry: Arc<BackgroundTransferEntry>) -> Self {
        Self { entry }
    }

    /// Records the total number of bytes transferred so far.
    pub fn report(&self, transferred: u64) {
        self.entry.lock().transferred = transferred;
    }
}
