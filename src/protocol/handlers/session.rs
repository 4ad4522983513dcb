//! Session commands: login, capabilities and housekeeping.

use async_trait::async_trait;
use log::info;

use crate::error::{AuthError, FtpServerError, ProtocolError};
use crate::protocol::responses::{
    CLOSING, LOGIN_SUCCESS, OK, PASSWORD_REQUIRED, READY, SYNTAX_ERROR_ARGS, SYSTEM_STATUS,
    SYSTEM_TYPE,
};
use crate::protocol::{CommandContext, CommandHandler, Reply, Response, TextEncoding};
use crate::transfer::DataType;

/// Handles the USER command: starts a new login and asks for the password.
pub struct UserHandler;

#[async_trait]
impl CommandHandler for UserHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let username = ctx.argument();
        if username.is_empty() {
            return Ok(Response::new(SYNTAX_ERROR_ARGS, "USER requires a user name").into());
        }

        ctx.session().await.set_username(Some(username.to_string()));
        Ok(Response::new(
            PASSWORD_REQUIRED,
            format!("User {} OK. Password required", username),
        )
        .into())
    }
}

/// Handles the PASS command: checks the password for the pending USER.
pub struct PassHandler;

#[async_trait]
impl CommandHandler for PassHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut session = ctx.session().await;
        if session.is_logged_in() {
            return Ok(Response::new(LOGIN_SUCCESS, "Already logged in").into());
        }
        let username = session
            .username()
            .map(str::to_string)
            .ok_or(AuthError::UserRequired)?;

        match ctx.services.credentials.validate(&username, ctx.argument()).await {
            Ok(principal) => {
                session.set_logged_in(true);
                info!("Client {} logged in as {}", ctx.peer(), principal.name);
                Ok(Response::new(LOGIN_SUCCESS, format!("User {} logged in", principal.name)).into())
            }
            Err(e) => {
                session.set_username(None);
                Err(e.into())
            }
        }
    }
}

pub struct QuitHandler;

#[async_trait]
impl CommandHandler for QuitHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        info!("Client {} requested to quit", ctx.peer());
        Ok(Reply::Close(Response::new(CLOSING, "Goodbye")))
    }
}

pub struct NoopHandler;

#[async_trait]
impl CommandHandler for NoopHandler {
    async fn process(&self, _ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        Ok(Response::new(OK, "NOOP ok").into())
    }
}

pub struct SystHandler;

#[async_trait]
impl CommandHandler for SystHandler {
    async fn process(&self, _ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        Ok(Response::new(SYSTEM_TYPE, "UNIX Type: L8").into())
    }
}

/// Handles the FEAT command: lists the extensions this server supports.
pub struct FeatHandler;

#[async_trait]
impl CommandHandler for FeatHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut lines = vec!["Extensions supported:".to_string()];
        if ctx.services.tls_acceptor.is_some() {
            lines.push("AUTH TLS".into());
        }
        lines.extend(["PBSZ", "PROT", "EPSV", "EPRT", "UTF8"].map(String::from));
        lines.push("End".into());
        Ok(Response::multi_line(SYSTEM_STATUS, lines).into())
    }
}

/// Handles OPTS. Only `UTF8 ON|OFF` is understood.
pub struct OptsHandler;

#[async_trait]
impl CommandHandler for OptsHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut words = ctx.argument().split_whitespace();
        let option = words.next().unwrap_or_default().to_ascii_uppercase();
        let value = words.next().unwrap_or("ON").to_ascii_uppercase();

        if option != "UTF8" {
            return Err(ProtocolError::ParameterNotImplemented(format!("OPTS {}", option)).into());
        }

        let encoding = match value.as_str() {
            "ON" => TextEncoding::Utf8,
            "OFF" => TextEncoding::Latin1,
            other => {
                return Err(ProtocolError::SyntaxError(format!("OPTS UTF8 {}", other)).into());
            }
        };
        ctx.session().await.set_encoding(encoding);
        Ok(Response::new(OK, format!("UTF8 mode {}", value.to_ascii_lowercase())).into())
    }
}

/// Handles REIN: resets the session as if the client had just connected.
pub struct ReinHandler;

#[async_trait]
impl CommandHandler for ReinHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        ctx.session().await.reinitialize();
        info!("Client {} reinitialized its session", ctx.peer());
        Ok(Response::new(READY, "Service ready for new user").into())
    }
}

pub struct TypeHandler;

#[async_trait]
impl CommandHandler for TypeHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let data_type = DataType::from_argument(ctx.argument()).ok_or_else(|| {
            ProtocolError::ParameterNotImplemented(format!("TYPE {}", ctx.argument()))
        })?;
        ctx.session().await.set_data_type(data_type);
        Ok(Response::new(OK, format!("Type set to {}", data_type)).into())
    }
}
