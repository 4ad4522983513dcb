//! Working directory commands: PWD, CWD and CDUP.

use async_trait::async_trait;
use log::info;

use crate::error::{FtpServerError, ProtocolError, StorageError};
use crate::protocol::responses::{FILE_ACTION_OK, PATH_CREATED};
use crate::protocol::{CommandContext, CommandHandler, Reply, Response};
use crate::storage::VirtualPath;

pub struct PwdHandler;

#[async_trait]
impl CommandHandler for PwdHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let path = ctx.session().await.current_path().to_string();
        // Quotes inside a path are doubled (RFC 959).
        Ok(Response::new(
            PATH_CREATED,
            format!("\"{}\" is the current directory", path.replace('"', "\"\"")),
        )
        .into())
    }
}

async fn change_directory(ctx: &CommandContext, target: VirtualPath) -> Result<Reply, FtpServerError> {
    if !ctx.services.file_system.is_directory(&target).await? {
        return Err(StorageError::NotFound(target.to_string()).into());
    }

    info!("Client {} changed directory to {}", ctx.peer(), target);
    let reply = Response::new(FILE_ACTION_OK, format!("Directory changed to {}", target));
    ctx.session().await.set_current_path(target);
    Ok(reply.into())
}

pub struct CwdHandler;

#[async_trait]
impl CommandHandler for CwdHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        if ctx.argument().is_empty() {
            return Err(ProtocolError::SyntaxError("CWD requires a path".into()).into());
        }
        let target = ctx.session().await.current_path().resolve(ctx.argument())?;
        change_directory(ctx, target).await
    }
}

pub struct CdupHandler;

#[async_trait]
impl CommandHandler for CdupHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let target = ctx.session().await.current_path().parent();
        change_directory(ctx, target).await
    }
}
