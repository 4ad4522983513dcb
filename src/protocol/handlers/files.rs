//! Transfer commands: LIST, NLST, RETR and STOR.
//!
//! All four are abortable. Storage errors are reported before the data
//! connection is touched, so a failed lookup leaves the PASV/PORT setup in
//! place for the next attempt.

use std::io;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, info};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{FtpServerError, ProtocolError, TransferError};
use crate::protocol::responses::{FILE_STATUS_OK, TRANSFER_COMPLETE};
use crate::protocol::{CommandContext, CommandHandler, Reply, Response};
use crate::storage::{FileEntry, VirtualPath};
use crate::transfer::{DataConnection, copy_cancellable};

const UPLOAD_LOG_TARGET: &str = "rax_ftpd::upload";

fn transfer_error(error: io::Error, cancel: &CancellationToken) -> TransferError {
    if cancel.is_cancelled() {
        TransferError::Cancelled
    } else {
        TransferError::TransferFailed(error)
    }
}

/// Sends 150 and opens the data connection prepared by PASV/EPSV/PORT/EPRT.
async fn open_data_connection(
    ctx: &CommandContext,
    subject: &str,
) -> Result<DataConnection, FtpServerError> {
    let request = ctx.session().await.data_connection().take_request()?;

    ctx.send(Response::new(
        FILE_STATUS_OK,
        format!("Opening {} mode data connection for {}", request.mode(), subject),
    ));

    let connection = request
        .get_data_connection(
            ctx.command.name(),
            ctx.services.config.data_connection_timeout(),
            &ctx.cancel,
        )
        .await?;
    Ok(connection)
}

/// Writes `reader` to the client and closes the data connection.
async fn send_to_client<R>(
    ctx: &CommandContext,
    mut connection: DataConnection,
    reader: &mut R,
) -> Result<u64, FtpServerError>
where
    R: tokio::io::AsyncRead + Unpin + Send + ?Sized,
{
    let id = Uuid::new_v4().to_string();
    ctx.services.statistics.transfer_started(&id);
    let result = copy_cancellable(reader, connection.stream(), &ctx.cancel, |_| {}).await;
    ctx.services.statistics.transfer_stopped(&id);

    let sent = result.map_err(|e| transfer_error(e, &ctx.cancel))?;
    connection
        .close()
        .await
        .map_err(|e| transfer_error(e, &ctx.cancel))?;
    Ok(sent)
}

async fn file_argument(ctx: &CommandContext) -> Result<VirtualPath, FtpServerError> {
    if ctx.argument().is_empty() {
        return Err(ProtocolError::SyntaxError(format!(
            "{} requires a file name",
            ctx.command.name()
        ))
        .into());
    }
    Ok(ctx.session().await.current_path().resolve(ctx.argument())?)
}

/// LIST/NLST take an optional path; `ls`-style flags are ignored.
async fn listing_target(ctx: &CommandContext) -> Result<VirtualPath, FtpServerError> {
    let cwd = ctx.session().await.current_path().clone();
    match ctx.argument().split_whitespace().find(|arg| !arg.starts_with('-')) {
        Some(path) => Ok(cwd.resolve(path)?),
        None => Ok(cwd),
    }
}

/// One `ls -l` style line.
pub fn format_list_line(entry: &FileEntry) -> String {
    let permissions = if entry.is_dir { "drwxr-xr-x" } else { "-rw-r--r--" };
    let modified = match entry.modified {
        Some(time) if Utc::now() - time > ChronoDuration::days(180) => {
            time.format("%b %d  %Y").to_string()
        }
        Some(time) => time.format("%b %d %H:%M").to_string(),
        None => "Jan 01  1970".to_string(),
    };
    format!(
        "{} 1 ftp ftp {:>12} {} {}",
        permissions, entry.size, modified, entry.name
    )
}

async fn send_listing(
    ctx: &CommandContext,
    names_only: bool,
) -> Result<Reply, FtpServerError> {
    let target = listing_target(ctx).await?;
    let entries = ctx.services.file_system.list(&target).await?;
    let encoding = ctx.session().await.encoding();

    let mut listing = Vec::new();
    for entry in &entries {
        let line = if names_only {
            entry.name.clone()
        } else {
            format_list_line(entry)
        };
        listing.extend(encoding.encode(&line));
        listing.extend_from_slice(b"\r\n");
    }

    let connection = open_data_connection(ctx, &target.to_string()).await?;
    let mut bytes: &[u8] = &listing;
    send_to_client(ctx, connection, &mut bytes).await?;

    debug!(
        "Sent listing of {} ({} entries) to {}",
        target,
        entries.len(),
        ctx.peer()
    );
    Ok(Response::new(TRANSFER_COMPLETE, "Transfer complete").into())
}

pub struct ListHandler;

#[async_trait]
impl CommandHandler for ListHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        send_listing(ctx, false).await
    }
}

pub struct NlstHandler;

#[async_trait]
impl CommandHandler for NlstHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        send_listing(ctx, true).await
    }
}

/// Handles the RETR command: streams a file to the client.
pub struct RetrHandler;

#[async_trait]
impl CommandHandler for RetrHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let path = file_argument(ctx).await?;
        let mut reader = ctx.services.file_system.open_read(&path).await?;

        let connection = open_data_connection(ctx, &path.to_string()).await?;
        let sent = send_to_client(ctx, connection, &mut reader).await?;

        info!("Client {} downloaded {} ({} bytes)", ctx.peer(), path, sent);
        Ok(Response::new(TRANSFER_COMPLETE, "Transfer complete").into())
    }
}

/// Handles the STOR command: receives a file into a staged upload and commits it.
pub struct StorHandler;

#[async_trait]
impl CommandHandler for StorHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let path = file_argument(ctx).await?;
        let mut upload = ctx.services.file_system.create_write(&path).await?;

        let mut connection = match open_data_connection(ctx, &path.to_string()).await {
            Ok(connection) => connection,
            Err(e) => {
                upload.discard().await;
                return Err(e);
            }
        };

        let id = Uuid::new_v4().to_string();
        ctx.services.statistics.transfer_started(&id);
        let result = copy_cancellable(connection.stream(), &mut upload, &ctx.cancel, |_| {}).await;
        ctx.services.statistics.transfer_stopped(&id);

        let received = match result {
            Ok(received) => received,
            Err(e) => {
                upload.discard().await;
                let _ = connection.close().await;
                return Err(transfer_error(e, &ctx.cancel).into());
            }
        };
        if let Err(e) = connection.close().await {
            debug!("Closing data connection of {} failed: {}", ctx.peer(), e);
        }

        info!("Client {} uploaded {} ({} bytes)", ctx.peer(), path, received);

        match upload.commit().await? {
            Some(deferred) => {
                let entry = ctx
                    .services
                    .worker
                    .enqueue(deferred, Some(UPLOAD_LOG_TARGET.to_string()));
                Ok(Response::new(
                    TRANSFER_COMPLETE,
                    format!("Transfer complete, commit queued as {}", entry.id()),
                )
                .into())
            }
            None => Ok(Response::new(TRANSFER_COMPLETE, "Transfer complete").into()),
        }
    }
}
