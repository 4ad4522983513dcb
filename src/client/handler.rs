//! Control connection loop
//!
//! Reads bytes, collects command lines and dispatches them one at a time in
//! arrival order. While an abortable command runs, further commands wait in
//! a queue; only ABOR is dispatched right away. Replies produced by commands
//! arrive through the connection's event channel and are written here.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio_util::sync::CancellationToken;

use crate::client::{ConnectionContext, ControlEvent, Session};
use crate::error::{FtpServerError, ProtocolError, error_to_response};
use crate::protocol::responses::{READY, SERVICE_NOT_AVAILABLE};
use crate::protocol::{Command, CommandCollector, Reply, Response, dispatch_command};
use crate::security::SecureStream;
use crate::server::ServerServices;

const READ_BUFFER_SIZE: usize = 4096;

enum Flow {
    Continue,
    Upgrade,
    Close,
}

enum Wake {
    Shutdown,
    Event(Option<ControlEvent>),
    Read(io::Result<usize>),
    Idle,
}

/// Serves one control connection until the client quits, the connection
/// drops, it idles out or the server shuts down.
pub async fn handle_client(stream: TcpStream, services: Arc<ServerServices>, shutdown: CancellationToken) {
    let (peer, local) = match (stream.peer_addr(), stream.local_addr()) {
        (Ok(peer), Ok(local)) => (peer, local),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Dropping connection without addresses: {}", e);
            return;
        }
    };
    info!("Client connected: {}", peer);

    let (events, receiver) = unbounded_channel();
    let cancel = shutdown.child_token();
    let session = Session::new(services.new_data_connection_feature(peer));
    let connection = Arc::new(ConnectionContext::new(
        peer,
        local,
        session,
        events,
        cancel.clone(),
    ));

    let stream = SecureStream::Plain(stream);
    if let Err(e) = serve(stream, &connection, &services, receiver).await {
        warn!("Connection with {} ended with error: {}", peer, e);
    }

    cancel.cancel();
    if let Some(command) = connection.take_background() {
        debug!("Cancelling {} of disconnected client {}", command.verb(), peer);
        command.abort();
    }
    info!("Client {} disconnected", peer);
}

async fn serve(
    mut stream: SecureStream,
    connection: &Arc<ConnectionContext>,
    services: &Arc<ServerServices>,
    mut events: UnboundedReceiver<ControlEvent>,
) -> io::Result<()> {
    let peer = connection.peer();
    let idle_timeout = services.config.idle_timeout();
    let max_command_length = services.config.max_command_length;

    let mut collector = CommandCollector::new();
    let mut queued: VecDeque<Command> = VecDeque::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    write_response(
        &mut stream,
        connection,
        &Response::new(READY, "Welcome to RAX FTP Server"),
    )
    .await?;

    loop {
        // Write whatever commands have produced so far.
        while let Ok(event) = events.try_recv() {
            match handle_event(event, &mut stream, connection).await? {
                Flow::Continue => {}
                Flow::Close => return stream.shutdown().await,
                Flow::Upgrade => stream = secure_control_stream(stream, connection, services).await?,
            }
        }

        if !connection.is_busy() {
            if let Some(command) = queued.pop_front() {
                dispatch_command(Arc::clone(connection), Arc::clone(services), command).await;
                continue;
            }
        }

        let busy = connection.is_busy();
        let idle_deadline = connection.session().await.last_activity() + idle_timeout;

        let wake = tokio::select! {
            _ = connection.cancellation().cancelled() => Wake::Shutdown,
            event = events.recv() => Wake::Event(event),
            read = stream.read(&mut buffer) => Wake::Read(read),
            _ = tokio::time::sleep_until(idle_deadline.into()), if !busy => Wake::Idle,
        };

        match wake {
            Wake::Shutdown => {
                let response = Response::new(SERVICE_NOT_AVAILABLE, "Server shutting down");
                write_response(&mut stream, connection, &response).await?;
                return stream.shutdown().await;
            }
            Wake::Event(None) => return Ok(()),
            Wake::Event(Some(event)) => match handle_event(event, &mut stream, connection).await? {
                Flow::Continue => {}
                Flow::Close => return stream.shutdown().await,
                Flow::Upgrade => stream = secure_control_stream(stream, connection, services).await?,
            },
            Wake::Read(Ok(0)) => {
                info!("Connection closed by client {}", peer);
                return Ok(());
            }
            Wake::Read(Ok(n)) => {
                let encoding = {
                    let mut session = connection.session().await;
                    session.touch();
                    session.encoding()
                };

                for command in collector.collect(&buffer[..n], encoding) {
                    if command.name().len() + command.argument().len() > max_command_length {
                        reject_too_long(connection);
                    } else if command.name() == "ABOR" && connection.is_busy() {
                        dispatch_command(Arc::clone(connection), Arc::clone(services), command).await;
                    } else {
                        queued.push_back(command);
                    }
                }

                if collector.pending().len() > max_command_length {
                    collector.discard_pending();
                    reject_too_long(connection);
                }
            }
            Wake::Read(Err(e)) => {
                error!("Failed to read from {}: {}", peer, e);
                return Err(e);
            }
            Wake::Idle => {
                if !connection.session().await.is_alive(idle_timeout) {
                    info!("Client {} idle for {:?}, closing", peer, idle_timeout);
                    let response = Response::new(SERVICE_NOT_AVAILABLE, "Idle timeout, closing control connection");
                    write_response(&mut stream, connection, &response).await?;
                    return stream.shutdown().await;
                }
            }
        }
    }
}

fn reject_too_long(connection: &ConnectionContext) {
    warn!("Client {} sent an over-long command", connection.peer());
    let err = FtpServerError::from(ProtocolError::CommandTooLong);
    connection.send_response(error_to_response(&err));
}

async fn handle_event(
    event: ControlEvent,
    stream: &mut SecureStream,
    connection: &ConnectionContext,
) -> io::Result<Flow> {
    match event {
        ControlEvent::Reply(Reply::Response(response)) => {
            write_response(stream, connection, &response).await?;
            Ok(Flow::Continue)
        }
        ControlEvent::Reply(Reply::SecureControl(response)) => {
            write_response(stream, connection, &response).await?;
            Ok(Flow::Upgrade)
        }
        ControlEvent::Reply(Reply::Close(response)) => {
            write_response(stream, connection, &response).await?;
            Ok(Flow::Close)
        }
        ControlEvent::CommandFinished(id) => {
            // Idle time starts when the transfer ends, not at the last read.
            connection.finish_background(id);
            connection.session().await.touch();
            Ok(Flow::Continue)
        }
    }
}

async fn write_response(
    stream: &mut SecureStream,
    connection: &ConnectionContext,
    response: &Response,
) -> io::Result<()> {
    let encoding = connection.session().await.encoding();
    debug!("Sending response to client {}: {}", connection.peer(), response.to_string().trim_end());
    stream.write_all(&encoding.encode(&response.to_string())).await?;
    stream.flush().await
}

/// Runs the server side of the TLS handshake on the control stream.
async fn secure_control_stream(
    stream: SecureStream,
    connection: &ConnectionContext,
    services: &ServerServices,
) -> io::Result<SecureStream> {
    let peer: SocketAddr = connection.peer();
    if stream.is_secure() {
        warn!("Control stream of {} is already secure", peer);
        return Ok(stream);
    }
    let Some(acceptor) = services.tls_acceptor.as_ref() else {
        return Err(io::Error::other("TLS negotiated without an acceptor"));
    };

    let secured = stream.upgrade(acceptor).await?;
    connection.session().await.set_control_secure(true);
    info!("Control connection of {} secured with TLS", peer);
    Ok(secured)
}
