//! Background transfer worker
//!
//! One FIFO queue shared by all connections and one worker task draining it.
//! Transfers run strictly one at a time in enqueue order. A failing or
//! panicking transfer is logged and finished; it never stops the loop.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::background::entry::{
    BackgroundTransfer, BackgroundTransferEntry, BackgroundTransferInfo, BackgroundTransferStatus,
    ProgressReporter,
};
use crate::middleware::StatisticsCollector;

struct QueuedTransfer {
    entry: Arc<BackgroundTransferEntry>,
    transfer: Box<dyn BackgroundTransfer>,
}

#[derive(Default)]
struct TransferQueue {
    queued: VecDeque<QueuedTransfer>,
    current: Option<Arc<BackgroundTransferEntry>>,
    finished: VecDeque<Arc<BackgroundTransferEntry>>,
}

struct WorkerShared {
    queue: Mutex<TransferQueue>,
    notify: Notify,
    statistics: Arc<dyn StatisticsCollector>,
    retention: Duration,
}

impl WorkerShared {
    fn lock(&self) -> MutexGuard<'_, TransferQueue> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pops the next transfer and makes it the current entry.
    fn dequeue(&self) -> Option<QueuedTransfer> {
        let mut queue = self.lock();
        let next = queue.queued.pop_front()?;
        next.entry.set_status(BackgroundTransferStatus::Transferring);
        queue.current = Some(Arc::clone(&next.entry));
        Some(next)
    }

    fn finish_current(&self, entry: Arc<BackgroundTransferEntry>) {
        let mut queue = self.lock();
        entry.set_status(BackgroundTransferStatus::Finished);
        queue.current = None;
        queue.finished.push_back(entry);
        Self::prune_finished(&mut queue, self.retention);
    }

    fn prune_finished(queue: &mut TransferQueue, retention: Duration) {
        let now = Instant::now();
        queue.finished.retain(|entry| {
            entry
                .finished_at()
                .is_none_or(|at| now.duration_since(at) < retention)
        });
    }
}

pub struct BackgroundTransferWorker {
    shared: Arc<WorkerShared>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTransferWorker {
    /// Spawns the worker loop. It stops when `parent` or `stop()` cancels it.
    pub fn start(
        statistics: Arc<dyn StatisticsCollector>,
        retention: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let shared = Arc::new(WorkerShared {
            queue: Mutex::new(TransferQueue::default()),
            notify: Notify::new(),
            statistics,
            retention,
        });
        let cancel = parent.child_token();
        let handle = tokio::spawn(run_worker(Arc::clone(&shared), cancel.clone()));

        info!("Background transfer worker started");

        Self {
            shared,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queues a transfer. Returns its entry for callers that want to follow it.
    pub fn enqueue(
        &self,
        transfer: Box<dyn BackgroundTransfer>,
        log_target: Option<String>,
    ) -> Arc<BackgroundTransferEntry> {
        let entry = Arc::new(BackgroundTransferEntry::new(
            transfer.transfer_id().to_string(),
            log_target,
        ));
        {
            let mut queue = self.shared.lock();
            queue.queued.push_back(QueuedTransfer {
                entry: Arc::clone(&entry),
                transfer,
            });
        }
        info!(target: entry.log_target(), "Enqueued background transfer {}", entry.id());
        self.shared.notify.notify_one();
        entry
    }

    /// Snapshot: current entry first, then queued entries, then recently finished ones.
    /// The lock is only held while copying entry references.
    pub fn get_states(&self) -> Vec<BackgroundTransferInfo> {
        let entries: Vec<Arc<BackgroundTransferEntry>> = {
            let mut queue = self.shared.lock();
            WorkerShared::prune_finished(&mut queue, self.shared.retention);
            queue
                .current
                .iter()
                .cloned()
                .chain(queue.queued.iter().map(|q| Arc::clone(&q.entry)))
                .chain(queue.finished.iter().cloned())
                .collect()
        };
        entries.iter().map(|entry| entry.snapshot()).collect()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancels the in-flight transfer, stops the loop and waits for it to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Background transfer worker ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for BackgroundTransferWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(shared: Arc<WorkerShared>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.notify.notified() => {}
        }

        while let Some(queued) = shared.dequeue() {
            process_transfer(&shared, queued, &cancel).await;
            if cancel.is_cancelled() {
                break;
            }
        }
    }

    let abandoned: Vec<QueuedTransfer> = {
        let mut queue = shared.lock();
        queue.finished.clear();
        queue.queued.drain(..).collect()
    };
    for mut queued in abandoned {
        warn!(
            target: queued.entry.log_target(),
            "Background transfer {} dropped at shutdown",
            queued.entry.id()
        );
        queued.transfer.dispose().await;
    }
    info!("Background transfer worker stopped");
}

async fn process_transfer(
    shared: &WorkerShared,
    queued: QueuedTransfer,
    cancel: &CancellationToken,
) {
    let QueuedTransfer {
        entry,
        mut transfer,
    } = queued;
    let target = entry.log_target().to_string();
    let id = entry.id().to_string();

    info!(target: &target, "Starting background transfer {}", id);
    shared.statistics.transfer_started(&id);

    let transfer_cancel = cancel.child_token();
    let outcome = {
        let run = AssertUnwindSafe(
            transfer.start(ProgressReporter::new(Arc::clone(&entry)), transfer_cancel.clone()),
        )
        .catch_unwind();
        tokio::select! {
            result = run => Some(result),
            _ = transfer_cancel.cancelled() => None,
        }
    };

    match outcome {
        None => info!(target: &target, "Background transfer {} cancelled", id),
        Some(Ok(Ok(()))) => info!(
            target: &target,
            "Background transfer {} completed ({} bytes)",
            id,
            entry.transferred()
        ),
        Some(Ok(Err(e))) if transfer_cancel.is_cancelled() => {
            info!(target: &target, "Background transfer {} cancelled: {}", id, e)
        }
        Some(Ok(Err(e))) => error!(target: &target, "Background transfer {} failed: {}", id, e),
        Some(Err(_)) => error!(target: &target, "Background transfer {} panicked", id),
    }

    transfer.dispose().await;
    shared.statistics.transfer_stopped(&id);
    debug!(target: &target, "Disposed background transfer {}", id);

    shared.finish_current(entry);
}
