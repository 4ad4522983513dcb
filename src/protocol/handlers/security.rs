//! Security negotiation: AUTH, ADAT, PBSZ and PROT.
//!
//! AUTH and ADAT are decided by the selected mechanism and then fed into the
//! security state machine. A reply the machine does not accept is replaced
//! by a 503 and leaves the state untouched.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use crate::error::{FtpServerError, ProtocolError, SecurityError};
use crate::protocol::responses::OK;
use crate::protocol::{CommandContext, CommandHandler, Reply, Response};
use crate::security::{AuthMechanism, SecurityStatus};
use crate::transfer::ProtectionLevel;

pub struct AuthHandler;

#[async_trait]
impl CommandHandler for AuthHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let name = ctx.argument();
        if name.is_empty() {
            return Err(ProtocolError::SyntaxError("AUTH requires a mechanism".into()).into());
        }

        let mut session = ctx.session().await;
        if session.is_control_secure() {
            return Err(SecurityError::BadSequence("Control connection is already secured".into()).into());
        }
        if session.security_status() != SecurityStatus::Unauthenticated {
            return Err(SecurityError::BadSequence("Security already negotiated".into()).into());
        }

        let mechanism: Arc<dyn AuthMechanism> = ctx
            .services
            .mechanisms
            .iter()
            .find(|m| m.handles(name))
            .cloned()
            .ok_or_else(|| SecurityError::UnknownMechanism(name.to_string()))?;

        let proposed = mechanism.handle_auth(name).await?;
        let status = session.security().apply_reply(
            "AUTH",
            proposed.response.code(),
            proposed.result,
        )?;

        info!(
            "Client {} AUTH {} -> {} ({})",
            ctx.peer(),
            name,
            proposed.response.code(),
            status
        );

        match status {
            SecurityStatus::Authenticated if mechanism.secures_control_stream() => {
                session.set_mechanism(None);
                Ok(Reply::SecureControl(proposed.response))
            }
            SecurityStatus::NeedSecurityData => {
                session.set_mechanism(Some(mechanism));
                Ok(proposed.response.into())
            }
            _ => {
                session.set_mechanism(None);
                Ok(proposed.response.into())
            }
        }
    }
}

pub struct AdatHandler;

#[async_trait]
impl CommandHandler for AdatHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut session = ctx.session().await;
        let mechanism = match (session.security_status(), session.mechanism()) {
            (SecurityStatus::NeedSecurityData, Some(mechanism)) => mechanism,
            _ => {
                return Err(SecurityError::BadSequence("ADAT must follow AUTH".into()).into());
            }
        };

        let proposed = mechanism.handle_adat(ctx.argument()).await?;
        let status = session.security().apply_reply(
            "ADAT",
            proposed.response.code(),
            proposed.result,
        )?;

        match status {
            SecurityStatus::NeedSecurityData => {}
            SecurityStatus::Authenticated if mechanism.secures_control_stream() => {
                session.set_mechanism(None);
                return Ok(Reply::SecureControl(proposed.response));
            }
            _ => session.set_mechanism(None),
        }
        Ok(proposed.response.into())
    }
}

/// PBSZ: the only buffer size for TLS is 0.
pub struct PbszHandler;

#[async_trait]
impl CommandHandler for PbszHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut session = ctx.session().await;
        if session.security_status() != SecurityStatus::Authenticated {
            return Err(SecurityError::BadSequence("PBSZ requires AUTH first".into()).into());
        }
        if ctx.argument().parse::<u64>().is_err() {
            return Err(SecurityError::InvalidArgument(ctx.argument().to_string()).into());
        }

        session.set_pbsz_received(true);
        Ok(Response::new(OK, "PBSZ=0").into())
    }
}

pub struct ProtHandler;

#[async_trait]
impl CommandHandler for ProtHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let mut session = ctx.session().await;
        if !session.pbsz_received() {
            return Err(SecurityError::BadSequence("PROT requires PBSZ first".into()).into());
        }

        let level = match ctx.argument().to_ascii_uppercase().as_str() {
            "C" => ProtectionLevel::Clear,
            "P" if session.data_connection().tls_available() => ProtectionLevel::Private,
            "P" => {
                warn!("Client {} asked for PROT P but TLS is not configured", ctx.peer());
                return Err(SecurityError::ProtectionNotSupported("P".into()).into());
            }
            "S" | "E" => {
                return Err(SecurityError::ProtectionNotSupported(ctx.argument().to_string()).into());
            }
            other => {
                return Err(ProtocolError::ParameterNotImplemented(format!("PROT {}", other)).into());
            }
        };

        session.data_connection().set_protection(level);
        Ok(Response::new(
            OK,
            format!("Protection level set to {}", ctx.argument().to_ascii_uppercase()),
        )
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ConnectionContext, Session};
    use crate::config::ServerConfig;
    use crate::error::error_to_ftp_code;
    use crate::protocol::Command;
    use crate::security::SecurityActionResult;
    use crate::server::ServerServices;
    use crate::storage::LocalFileSystem;
    use crate::transfer::DataConnectionFeature;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        connection: Arc<ConnectionContext>,
        services: Arc<ServerServices>,
        _root: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let file_system = Arc::new(LocalFileSystem::new(root.path(), false));
            let services =
                ServerServices::new(ServerConfig::default(), file_system, &CancellationToken::new())
                    .unwrap();
            let peer = "127.0.0.1:40000".parse().unwrap();
            let (tx, _rx) = unbounded_channel();
            let connection = Arc::new(ConnectionContext::new(
                peer,
                "127.0.0.1:2121".parse().unwrap(),
                Session::new(DataConnectionFeature::new(peer, false, false, None)),
                tx,
                CancellationToken::new(),
            ));
            Self {
                connection,
                services: Arc::new(services),
                _root: root,
            }
        }

        /// Runs `line` through `handler` and returns the reply code.
        async fn code(&self, handler: &dyn CommandHandler, line: &str) -> u16 {
            let ctx = CommandContext::new(
                Command::parse(line),
                Arc::clone(&self.connection),
                Arc::clone(&self.services),
            );
            match handler.process(&ctx).await {
                Ok(reply) => reply.response().code(),
                Err(err) => error_to_ftp_code(&err),
            }
        }

        async fn authenticate(&self) {
            self.connection
                .session()
                .await
                .security()
                .apply_reply("AUTH", 234, Some(SecurityActionResult::SecurityDataExchangeComplete))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_pbsz_requires_auth() {
        let fixture = Fixture::new();
        assert_eq!(fixture.code(&PbszHandler, "PBSZ 0").await, 503);
        assert!(!fixture.connection.session().await.pbsz_received());

        fixture.authenticate().await;
        assert_eq!(fixture.code(&PbszHandler, "PBSZ abc").await, 501);
        assert_eq!(fixture.code(&PbszHandler, "PBSZ 0").await, 200);
        assert!(fixture.connection.session().await.pbsz_received());
    }

    #[tokio::test]
    async fn test_prot_requires_pbsz() {
        let fixture = Fixture::new();
        fixture.authenticate().await;
        assert_eq!(fixture.code(&ProtHandler, "PROT C").await, 503);

        assert_eq!(fixture.code(&PbszHandler, "PBSZ 0").await, 200);
        assert_eq!(fixture.code(&ProtHandler, "PROT C").await, 200);
        assert_eq!(fixture.code(&ProtHandler, "PROT S").await, 536);
        assert_eq!(fixture.code(&ProtHandler, "PROT X").await, 504);
        // No certificate configured.
        assert_eq!(fixture.code(&ProtHandler, "PROT P").await, 536);
        assert_eq!(
            fixture.connection.session().await.data_connection().protection(),
            ProtectionLevel::Clear
        );
    }

    #[tokio::test]
    async fn test_auth_without_certificate_keeps_state() {
        let fixture = Fixture::new();
        assert_eq!(fixture.code(&AuthHandler, "AUTH TLS").await, 431);
        assert_eq!(fixture.code(&AuthHandler, "AUTH GSSAPI").await, 504);
        assert_eq!(fixture.code(&AuthHandler, "AUTH").await, 501);
        assert_eq!(
            fixture.connection.session().await.security_status(),
            SecurityStatus::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_auth_refused_once_negotiated_or_secured() {
        let fixture = Fixture::new();
        fixture.authenticate().await;
        assert_eq!(fixture.code(&AuthHandler, "AUTH TLS").await, 503);

        // REIN on a TLS control connection resets the machine but the stream stays encrypted.
        {
            let mut session = fixture.connection.session().await;
            session.set_control_secure(true);
            session.reinitialize();
        }
        assert_eq!(fixture.code(&AuthHandler, "AUTH TLS").await, 503);
    }

    #[tokio::test]
    async fn test_adat_requires_pending_auth() {
        let fixture = Fixture::new();
        assert_eq!(fixture.code(&AdatHandler, "ADAT abcd").await, 503);
    }
}
