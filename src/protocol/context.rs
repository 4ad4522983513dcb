//! Command context
//!
//! Everything a handler gets to see: the command, its connection, the
//! server-wide services and a cancellation token scoped to this command.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

use crate::client::{ConnectionContext, Session};
use crate::protocol::{Command, Response};
use crate::server::ServerServices;

pub struct CommandContext {
    pub command: Command,
    pub connection: Arc<ConnectionContext>,
    pub services: Arc<ServerServices>,
    /// Cancelled by ABOR (abortable commands) or when the connection closes.
    pub cancel: CancellationToken,
}

impl CommandContext {
    pub fn new(
        command: Command,
        connection: Arc<ConnectionContext>,
        services: Arc<ServerServices>,
    ) -> Self {
        let cancel = connection.cancellation().child_token();
        Self {
            command,
            connection,
            services,
            cancel,
        }
    }

    pub fn argument(&self) -> &str {
        self.command.argument()
    }

    pub fn peer(&self) -> SocketAddr {
        self.connection.peer()
    }

    pub async fn session(&self) -> MutexGuard<'_, Session> {
        self.connection.session().await
    }

    /// Sends an intermediate reply, such as 150 before a transfer.
    pub fn send(&self, response: Response) {
        self.connection.send_response(response);
    }
}
