//! Module `data_connection`
//!
//! Per-connection data channel state set up by PORT/EPRT/PASV/EPSV and PROT,
//! and the establishment of the actual data connection for one transfer.
//!
//! A PORT/PASV setup is consumed by the next transfer command: the command
//! takes a [`DataConnectionRequest`] out of the feature and owns it from
//! then on, so waiting for the peer never holds the session lock.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::error::TransferError;
use crate::security::SecureStream;
use crate::transfer::modes::{ProtectionLevel, TransferMode};

enum PendingConnection {
    Active(SocketAddr),
    Passive(TcpListener),
}

pub struct DataConnectionFeature {
    control_peer: SocketAddr,
    promiscuous: bool,
    configured_epsv_only: bool,
    epsv_all: bool,
    protection: ProtectionLevel,
    tls: Option<TlsAcceptor>,
    pending: Option<PendingConnection>,
}

impl DataConnectionFeature {
    pub fn new(
        control_peer: SocketAddr,
        promiscuous: bool,
        epsv_only: bool,
        tls: Option<TlsAcceptor>,
    ) -> Self {
        Self {
            control_peer,
            promiscuous,
            configured_epsv_only: epsv_only,
            epsv_all: false,
            protection: ProtectionLevel::Clear,
            tls,
            pending: None,
        }
    }

    pub fn control_peer(&self) -> SocketAddr {
        self.control_peer
    }

    /// True when PASV/PORT/EPRT are refused, by configuration or after `EPSV ALL`.
    pub fn is_epsv_only(&self) -> bool {
        self.configured_epsv_only || self.epsv_all
    }

    pub fn enable_epsv_all(&mut self) {
        self.epsv_all = true;
        self.pending = None;
    }

    pub fn protection(&self) -> ProtectionLevel {
        self.protection
    }

    pub fn set_protection(&mut self, level: ProtectionLevel) {
        self.protection = level;
    }

    pub fn tls_available(&self) -> bool {
        self.tls.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Records the client's address for the next transfer (PORT/EPRT).
    pub fn set_active(&mut self, target: SocketAddr) -> Result<(), TransferError> {
        if self.is_epsv_only() {
            return Err(TransferError::EpsvOnly);
        }
        debug!("Data connection for {} set to active {}", self.control_peer, target);
        self.pending = Some(PendingConnection::Active(target));
        Ok(())
    }

    /// Keeps a bound listener for the next transfer (PASV/EPSV). A listener
    /// from an earlier PASV is dropped.
    pub fn set_passive(&mut self, listener: TcpListener) -> Result<SocketAddr, TransferError> {
        let local = listener.local_addr().map_err(TransferError::AcceptFailed)?;
        debug!("Data connection for {} listening on {}", self.control_peer, local);
        self.pending = Some(PendingConnection::Passive(listener));
        Ok(local)
    }

    /// Hands the current setup to a transfer command.
    pub fn take_request(&mut self) -> Result<DataConnectionRequest, TransferError> {
        let pending = self.pending.take().ok_or(TransferError::NoDataConnection)?;
        Ok(DataConnectionRequest {
            pending,
            control_peer: self.control_peer,
            promiscuous: self.promiscuous,
            protection: self.protection,
            tls: self.tls.clone(),
        })
    }

    /// REIN: drop the setup and go back to clear, dual-stack operation.
    pub fn reset(&mut self) {
        self.pending = None;
        self.epsv_all = false;
        self.protection = ProtectionLevel::Clear;
    }
}

/// Accepts a passive peer only if it is the control peer, unless promiscuous
/// mode is enabled.
pub fn validate_passive_peer(
    control_peer: IpAddr,
    data_peer: IpAddr,
    promiscuous: bool,
) -> Result<(), TransferError> {
    if promiscuous || control_peer.to_canonical() == data_peer.to_canonical() {
        return Ok(());
    }
    Err(TransferError::PeerMismatch {
        expected: control_peer,
        actual: data_peer,
    })
}

pub struct DataConnectionRequest {
    pending: PendingConnection,
    control_peer: SocketAddr,
    promiscuous: bool,
    protection: ProtectionLevel,
    tls: Option<TlsAcceptor>,
}

impl DataConnectionRequest {
    pub fn mode(&self) -> TransferMode {
        match self.pending {
            PendingConnection::Active(_) => TransferMode::Active,
            PendingConnection::Passive(_) => TransferMode::Passive,
        }
    }

    /// Opens the data connection for `command`. Connecting, accepting and
    /// the TLS handshake are each bounded by `timeout` and by `cancel`.
    pub async fn get_data_connection(
        self,
        command: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DataConnection, TransferError> {
        let mode = self.mode();
        let (stream, remote) = match self.pending {
            PendingConnection::Active(target) => {
                let stream = with_deadline(timeout, cancel, &target.to_string(), TcpStream::connect(target))
                    .await?
                    .map_err(|e| TransferError::ConnectFailed(target, e))?;
                (stream, target)
            }
            PendingConnection::Passive(listener) => {
                let local = listener
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "passive listener".into());
                let (stream, peer) = with_deadline(timeout, cancel, &local, listener.accept())
                    .await?
                    .map_err(TransferError::AcceptFailed)?;

                if let Err(e) = validate_passive_peer(self.control_peer.ip(), peer.ip(), self.promiscuous) {
                    warn!(
                        "Rejected data connection from {} for client {}",
                        peer, self.control_peer
                    );
                    drop(stream);
                    return Err(e);
                }
                (stream, peer)
            }
        };

        let stream = match self.protection {
            ProtectionLevel::Clear => SecureStream::Plain(stream),
            ProtectionLevel::Private => {
                let acceptor = self.tls.ok_or(TransferError::TlsUnavailable)?;
                with_deadline(
                    timeout,
                    cancel,
                    &remote.to_string(),
                    SecureStream::Plain(stream).upgrade(&acceptor),
                )
                .await?
                .map_err(TransferError::TlsHandshake)?
            }
        };

        info!(
            "Opened {} data connection with {} for {} of client {}",
            mode, remote, command, self.control_peer
        );

        Ok(DataConnection {
            stream,
            remote,
            mode,
            command: command.to_string(),
        })
    }
}

async fn with_deadline<F: Future>(
    timeout: Duration,
    cancel: &CancellationToken,
    what: &str,
    future: F,
) -> Result<F::Output, TransferError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        result = tokio::time::timeout(timeout, future) => {
            result.map_err(|_| TransferError::ConnectionTimeout(what.to_string()))
        }
    }
}

/// An open data connection, used for exactly one transfer.
pub struct DataConnection {
    stream: SecureStream,
    remote: SocketAddr,
    mode: TransferMode,
    command: String,
}

impl DataConnection {
    pub fn stream(&mut self) -> &mut SecureStream {
        &mut self.stream
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn is_secure(&self) -> bool {
        self.stream.is_secure()
    }

    /// Graceful close. For TLS this sends close-notify before the TCP FIN.
    pub async fn close(mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
