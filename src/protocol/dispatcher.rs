//! Command dispatcher
//!
//! Routes a parsed command through the middleware chain to its handler and
//! makes sure exactly one final reply is produced for it. Abortable commands
//! run as their own task so the connection can still read `ABOR`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{error, warn};

use crate::client::ConnectionContext;
use crate::error::{AuthError, FtpServerError, ProtocolError, error_to_response, handle_error};
use crate::protocol::{Command, CommandContext, CommandRegistration, Reply, Response};
use crate::server::ServerServices;

/// Dispatches one command. The final reply is queued on the connection, either
/// before this returns or, for abortable commands, when the spawned task ends.
pub async fn dispatch_command(
    connection: Arc<ConnectionContext>,
    services: Arc<ServerServices>,
    command: Command,
) {
    let ctx = CommandContext::new(command, connection, services);

    for middleware in &ctx.services.middleware {
        if let Some(reply) = middleware.before(&ctx).await {
            finish(&ctx, reply).await;
            return;
        }
    }

    let Some(registration) = ctx.services.registry.get(ctx.command.name()).cloned() else {
        warn!(
            "Client {} sent unknown command {}",
            ctx.peer(),
            ctx.command.name()
        );
        let err = FtpServerError::from(ProtocolError::UnknownCommand(ctx.command.name().into()));
        finish(&ctx, error_to_response(&err).into()).await;
        return;
    };

    if registration.is_login_required() && !ctx.session().await.is_logged_in() {
        let err = FtpServerError::from(AuthError::NotLoggedIn);
        finish(&ctx, error_to_response(&err).into()).await;
        return;
    }

    if registration.is_abortable() {
        let connection = Arc::clone(&ctx.connection);
        let id = connection.next_command_id();
        let cancel = ctx.cancel.clone();
        let verb = registration.verb().to_string();

        let handle = tokio::spawn(async move {
            let reply = run_handler(&registration, &ctx).await;
            finish(&ctx, reply).await;
            ctx.connection.notify_finished(id);
        });
        connection.set_background(id, &verb, cancel, handle);
    } else {
        let reply = run_handler(&registration, &ctx).await;
        finish(&ctx, reply).await;
    }
}

async fn run_handler(registration: &CommandRegistration, ctx: &CommandContext) -> Reply {
    let handler = registration.create_handler();

    match AssertUnwindSafe(handler.process(ctx)).catch_unwind().await {
        Ok(Ok(reply)) => reply,
        Ok(Err(err)) => {
            handle_error(&err);
            error_to_response(&err).into()
        }
        Err(_) => {
            error!(
                "Handler for {} panicked on client {}",
                registration.verb(),
                ctx.peer()
            );
            Response::new(451, "Requested action aborted: local error in processing").into()
        }
    }
}

async fn finish(ctx: &CommandContext, reply: Reply) {
    for middleware in &ctx.services.middleware {
        middleware.after(ctx, &reply).await;
    }
    ctx.connection.send(reply);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ControlEvent, Session};
    use crate::config::ServerConfig;
    use crate::protocol::{CommandHandler, CommandRegistry};
    use crate::storage::LocalFileSystem;
    use crate::transfer::DataConnectionFeature;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
    use tokio_util::sync::CancellationToken;

    struct CountsCalls {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CommandHandler for CountsCalls {
        async fn process(&self, _ctx: &CommandContext) -> Result<Reply, FtpServerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Response::new(200, "counted").into())
        }
    }

    struct Panics;

    #[async_trait]
    impl CommandHandler for Panics {
        async fn process(&self, _ctx: &CommandContext) -> Result<Reply, FtpServerError> {
            panic!("handler bug");
        }
    }

    struct WaitsForAbort;

    #[async_trait]
    impl CommandHandler for WaitsForAbort {
        async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
            ctx.cancel.cancelled().await;
            Err(crate::error::TransferError::Cancelled.into())
        }
    }

    fn setup(
        calls: &Arc<AtomicUsize>,
    ) -> (
        Arc<ConnectionContext>,
        Arc<ServerServices>,
        UnboundedReceiver<ControlEvent>,
    ) {
        let root = tempfile::tempdir().unwrap().keep();
        let file_system = Arc::new(LocalFileSystem::new(&root, false));
        let mut services =
            ServerServices::new(ServerConfig::default(), file_system, &CancellationToken::new())
                .unwrap();

        let mut registry = CommandRegistry::new();
        let handler_calls = Arc::clone(calls);
        registry
            .register(
                CommandRegistration::new("SECRET", move || CountsCalls {
                    calls: Arc::clone(&handler_calls),
                })
                .login_required(),
            )
            .unwrap();
        registry
            .register(CommandRegistration::new("BOOM", || Panics))
            .unwrap();
        registry
            .register(CommandRegistration::new("SLOW", || WaitsForAbort).abortable())
            .unwrap();
        services.registry = registry;

        let peer = "127.0.0.1:40000".parse().unwrap();
        let (tx, rx) = unbounded_channel();
        let connection = Arc::new(ConnectionContext::new(
            peer,
            "127.0.0.1:2121".parse().unwrap(),
            Session::new(DataConnectionFeature::new(peer, false, false, None)),
            tx,
            CancellationToken::new(),
        ));
        (connection, Arc::new(services), rx)
    }

    async fn next_code(rx: &mut UnboundedReceiver<ControlEvent>) -> u16 {
        loop {
            match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Some(ControlEvent::Reply(reply))) => return reply.response().code(),
                Ok(Some(ControlEvent::CommandFinished(_))) => continue,
                _ => panic!("no reply received"),
            }
        }
    }

    #[tokio::test]
    async fn test_login_required_command_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (connection, services, mut rx) = setup(&calls);

        dispatch_command(
            Arc::clone(&connection),
            Arc::clone(&services),
            Command::parse("SECRET x"),
        )
        .await;
        assert_eq!(next_code(&mut rx).await, 530);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        connection.session().await.set_logged_in(true);
        dispatch_command(connection, services, Command::parse("secret x")).await;
        assert_eq!(next_code(&mut rx).await, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_command_gets_500() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (connection, services, mut rx) = setup(&calls);
        dispatch_command(connection, services, Command::parse("XYZZY")).await;
        assert_eq!(next_code(&mut rx).await, 500);
    }

    #[tokio::test]
    async fn test_panicking_handler_gets_451() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (connection, services, mut rx) = setup(&calls);
        dispatch_command(connection, services, Command::parse("BOOM")).await;
        assert_eq!(next_code(&mut rx).await, 451);
    }

    #[tokio::test]
    async fn test_abortable_command_runs_in_background_until_aborted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (connection, services, mut rx) = setup(&calls);

        dispatch_command(Arc::clone(&connection), services, Command::parse("SLOW")).await;
        assert!(connection.is_busy());
        assert!(rx.try_recv().is_err());

        let handle = connection.take_background().unwrap().abort();
        handle.await.unwrap();
        assert_eq!(next_code(&mut rx).await, 426);
        assert!(!connection.is_busy());
    }
}
