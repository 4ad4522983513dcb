//! Data channel setup: PASV, EPSV, PORT and EPRT.

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use log::info;

use crate::error::{FtpServerError, TransferError};
use crate::protocol::responses::OK;
use crate::protocol::{CommandContext, CommandHandler, Reply, Response};
use crate::transfer::{
    extended_passive_reply, parse_eprt_argument, parse_port_argument, passive_reply,
    validate_active_target,
};

/// Address the passive listener binds to: the interface the client reached us on.
fn listen_ip(ctx: &CommandContext) -> IpAddr {
    ctx.connection.local().ip()
}

/// Handles the PASV command: opens a listener and tells the client where it is.
pub struct PasvHandler;

#[async_trait]
impl CommandHandler for PasvHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut session = ctx.session().await;
        if session.data_connection().is_epsv_only() {
            return Err(TransferError::EpsvOnly.into());
        }

        let listener = ctx.services.passive_ports.bind(listen_ip(ctx)).await?;
        let port = listener
            .local_addr()
            .map_err(TransferError::AcceptFailed)?
            .port();
        let advertised = ctx
            .services
            .config
            .pasv_address()
            .unwrap_or_else(|| listen_ip(ctx));
        let reply = passive_reply(SocketAddr::new(advertised, port))?;

        session.data_connection().set_passive(listener)?;
        info!(
            "Client {} entered passive mode on port {}",
            ctx.peer(),
            port
        );
        Ok(reply.into())
    }
}

/// Handles EPSV, including `EPSV ALL`.
pub struct EpsvHandler;

#[async_trait]
impl CommandHandler for EpsvHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let argument = ctx.argument().to_ascii_uppercase();
        let mut session = ctx.session().await;

        match argument.as_str() {
            "ALL" => {
                session.data_connection().enable_epsv_all();
                return Ok(Response::new(OK, "EPSV ALL command successful").into());
            }
            "" | "1" | "2" => {}
            other => {
                return Err(TransferError::UnsupportedNetworkProtocol(other.to_string()).into());
            }
        }

        let listener = ctx.services.passive_ports.bind(listen_ip(ctx)).await?;
        let local = session.data_connection().set_passive(listener)?;
        info!(
            "Client {} entered extended passive mode on port {}",
            ctx.peer(),
            local.port()
        );
        Ok(extended_passive_reply(local.port()).into())
    }
}

fn check_active_target(ctx: &CommandContext, target: SocketAddr) -> Result<(), TransferError> {
    validate_active_target(target, ctx.peer().ip())?;
    info!("Client {} requested active mode to {}", ctx.peer(), target);
    Ok(())
}

/// Handles the PORT command: remembers the client's data address.
pub struct PortHandler;

#[async_trait]
impl CommandHandler for PortHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut session = ctx.session().await;
        if session.data_connection().is_epsv_only() {
            return Err(TransferError::EpsvOnly.into());
        }

        let target = parse_port_argument(ctx.argument())?;
        check_active_target(ctx, target)?;
        session.data_connection().set_active(target)?;
        Ok(Response::new(OK, "PORT command successful").into())
    }
}

pub struct EprtHandler;

#[async_trait]
impl CommandHandler for EprtHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut session = ctx.session().await;
        if session.data_connection().is_epsv_only() {
            return Err(TransferError::EpsvOnly.into());
        }

        let target = parse_eprt_argument(ctx.argument())?;
        check_active_target(ctx, target)?;
        session.data_connection().set_active(target)?;
        Ok(Response::new(OK, "EPRT command successful").into())
    }
}
