//! ABOR
//!
//! Cancels the running abortable command. The aborted command sends its own
//! 426; ABOR waits for that before acknowledging, so the client always sees
//! 426 followed by 226.

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};

use crate::error::FtpServerError;
use crate::protocol::responses::TRANSFER_COMPLETE;
use crate::protocol::{CommandContext, CommandHandler, Reply, Response};

const ABORT_GRACE: Duration = Duration::from_secs(5);

pub struct AborHandler;

#[async_trait]
impl CommandHandler for AborHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let Some(command) = ctx.connection.take_background() else {
            return Ok(Response::new(TRANSFER_COMPLETE, "No transfer to abort").into());
        };

        let verb = command.verb().to_string();
        let mut handle = command.abort();
        if tokio::time::timeout(ABORT_GRACE, &mut handle).await.is_err() {
            warn!(
                "Client {} {} did not stop within {:?}, killing it",
                ctx.peer(),
                verb,
                ABORT_GRACE
            );
            handle.abort();
            ctx.send(Response::new(426, "Connection closed; transfer aborted"));
        }

        info!("Client {} aborted {}", ctx.peer(), verb);
        Ok(Response::new(TRANSFER_COMPLETE, "ABOR command successful").into())
    }
}
