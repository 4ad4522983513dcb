//! Connection context
//!
//! Shared between the connection loop and the commands it dispatches,
//! including abortable commands running as their own tasks. Replies always
//! travel through the event channel so the loop writes them in the order
//! they were produced.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::debug;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::Session;
use crate::protocol::{Reply, Response};

/// Messages from commands to the connection loop.
#[derive(Debug)]
pub enum ControlEvent {
    Reply(Reply),
    /// An abortable command with this id has sent its final reply.
    CommandFinished(u64),
}

/// The abortable command currently running on a connection.
pub struct BackgroundCommand {
    id: u64,
    verb: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundCommand {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Requests cancellation and returns the task handle to wait on.
    pub fn abort(self) -> JoinHandle<()> {
        self.cancel.cancel();
        self.handle
    }
}

pub struct ConnectionContext {
    peer: SocketAddr,
    local: SocketAddr,
    session: tokio::sync::Mutex<Session>,
    events: UnboundedSender<ControlEvent>,
    cancel: CancellationToken,
    background: Mutex<Option<BackgroundCommand>>,
    next_command_id: AtomicU64,
}

impl ConnectionContext {
    pub fn new(
        peer: SocketAddr,
        local: SocketAddr,
        session: Session,
        events: UnboundedSender<ControlEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            peer,
            local,
            session: tokio::sync::Mutex::new(session),
            events,
            cancel,
            background: Mutex::new(None),
            next_command_id: AtomicU64::new(1),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local(&self) -> SocketAddr {
        self.local
    }

    pub async fn session(&self) -> tokio::sync::MutexGuard<'_, Session> {
        self.session.lock().await
    }

    /// Connection-scoped token; cancelled when the connection closes.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Queues a reply for the control stream. Dropped silently once the
    /// connection loop has gone away.
    pub fn send(&self, reply: impl Into<Reply>) {
        if self.events.send(ControlEvent::Reply(reply.into())).is_err() {
            debug!("Client {} gone, reply dropped", self.peer);
        }
    }

    pub fn send_response(&self, response: Response) {
        self.send(Reply::Response(response));
    }

    pub(crate) fn notify_finished(&self, id: u64) {
        let _ = self.events.send(ControlEvent::CommandFinished(id));
    }

    pub(crate) fn next_command_id(&self) -> u64 {
        self.next_command_id.fetch_add(1, Ordering::Relaxed)
    }

    fn background_slot(&self) -> MutexGuard<'_, Option<BackgroundCommand>> {
        self.background.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set_background(&self, id: u64, verb: &str, cancel: CancellationToken, handle: JoinHandle<()>) {
        *self.background_slot() = Some(BackgroundCommand {
            id,
            verb: verb.to_string(),
            cancel,
            handle,
        });
    }

    /// True while an abortable command is running.
    pub fn is_busy(&self) -> bool {
        self.background_slot().is_some()
    }

    /// Removes the running command so it can be aborted.
    pub fn take_background(&self) -> Option<BackgroundCommand> {
        self.background_slot().take()
    }

    /// Clears the slot if it still holds command `id`.
    pub(crate) fn finish_background(&self, id: u64) -> bool {
        let mut slot = self.background_slot();
        if slot.as_ref().is_some_and(|command| command.id == id) {
            *slot = None;
            true
        } else {
            false
        }
    }
}
