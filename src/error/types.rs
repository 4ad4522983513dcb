//! Error types
//!
//! Defines domain-specific error types for each module of the FTP server.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};

/// Authentication module errors
#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials(String),
    MalformedInput(String),
    UserRequired,
    NotLoggedIn,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials(u) => write!(f, "Invalid credentials for user: {}", u),
            AuthError::MalformedInput(s) => write!(f, "Malformed input: {}", s),
            AuthError::UserRequired => write!(f, "USER must precede PASS"),
            AuthError::NotLoggedIn => write!(f, "User not logged in"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Security negotiation errors (AUTH/ADAT/PBSZ/PROT)
#[derive(Debug)]
pub enum SecurityError {
    UnknownMechanism(String),
    BadSequence(String),
    UnexpectedTransition { state: String, command: String },
    ProtectionNotSupported(String),
    InvalidArgument(String),
    Tls(String),
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityError::UnknownMechanism(m) => write!(f, "Unknown security mechanism: {}", m),
            SecurityError::BadSequence(msg) => write!(f, "Bad sequence of commands: {}", msg),
            SecurityError::UnexpectedTransition { state, command } => {
                write!(f, "No transition for {} in state {}", command, state)
            }
            SecurityError::ProtectionNotSupported(level) => {
                write!(f, "Protection level {} not supported", level)
            }
            SecurityError::InvalidArgument(arg) => write!(f, "Invalid argument: {}", arg),
            SecurityError::Tls(msg) => write!(f, "TLS error: {}", msg),
        }
    }
}

impl std::error::Error for SecurityError {}

/// Storage module errors, one variant per file system fault kind
#[derive(Debug)]
pub enum StorageError {
    NotFound(String),
    PermissionDenied(String),
    NotADirectory(String),
    InsufficientStorage(String),
    InvalidName(String),
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(p) => write!(f, "Not found: {}", p),
            StorageError::PermissionDenied(p) => write!(f, "Permission denied: {}", p),
            StorageError::NotADirectory(p) => write!(f, "Not a directory: {}", p),
            StorageError::InsufficientStorage(p) => write!(f, "Insufficient storage: {}", p),
            StorageError::InvalidName(p) => write!(f, "Invalid file name: {}", p),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    /// Classifies an I/O error raised while operating on `path`.
    pub fn from_io(error: io::Error, path: &str) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(path.to_string()),
            io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => {
                StorageError::InsufficientStorage(path.to_string())
            }
            io::ErrorKind::NotADirectory => StorageError::NotADirectory(path.to_string()),
            _ => StorageError::IoError(error),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

/// Data connection and transfer errors
#[derive(Debug)]
pub enum TransferError {
    NoDataConnection,
    NoAvailablePort,
    PortBindingFailed(SocketAddr, io::Error),
    ConnectionTimeout(String),
    ConnectFailed(SocketAddr, io::Error),
    AcceptFailed(io::Error),
    PeerMismatch { expected: IpAddr, actual: IpAddr },
    InvalidPortCommand(String),
    IpMismatch { expected: String, provided: String },
    InvalidPortRange(u16),
    UnsupportedNetworkProtocol(String),
    EpsvOnly,
    TlsUnavailable,
    TlsHandshake(io::Error),
    Cancelled,
    TransferFailed(io::Error),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::NoDataConnection => write!(f, "No data connection configured"),
            TransferError::NoAvailablePort => write!(f, "No available port for data connection"),
            TransferError::PortBindingFailed(addr, e) => {
                write!(f, "Failed to bind to {}: {}", addr, e)
            }
            TransferError::ConnectionTimeout(target) => {
                write!(f, "Timeout waiting for data connection with {}", target)
            }
            TransferError::ConnectFailed(addr, e) => {
                write!(f, "Failed to connect to {}: {}", addr, e)
            }
            TransferError::AcceptFailed(e) => write!(f, "Failed to accept data connection: {}", e),
            TransferError::PeerMismatch { expected, actual } => write!(
                f,
                "Data connection from {} rejected, control connection peer is {}",
                actual, expected
            ),
            TransferError::InvalidPortCommand(msg) => write!(f, "Invalid PORT command: {}", msg),
            TransferError::IpMismatch { expected, provided } => {
                write!(f, "IP mismatch: expected {}, got {}", expected, provided)
            }
            TransferError::InvalidPortRange(port) => {
                write!(f, "Invalid port {}: must be between 1024 and 65535", port)
            }
            TransferError::UnsupportedNetworkProtocol(proto) => {
                write!(f, "Network protocol {} not supported", proto)
            }
            TransferError::EpsvOnly => write!(f, "Only EPSV is accepted on this connection"),
            TransferError::TlsUnavailable => write!(f, "Data channel protection requires TLS"),
            TransferError::TlsHandshake(e) => write!(f, "Data channel TLS handshake failed: {}", e),
            TransferError::Cancelled => write!(f, "Transfer cancelled"),
            TransferError::TransferFailed(e) => write!(f, "Transfer failed: {}", e),
        }
    }
}

impl std::error::Error for TransferError {}

/// Command-level protocol errors
#[derive(Debug)]
pub enum ProtocolError {
    UnknownCommand(String),
    SyntaxError(String),
    NotImplemented(String),
    ParameterNotImplemented(String),
    DuplicateVerb(String),
    CommandTooLong,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownCommand(c) => write!(f, "Unknown command: {}", c),
            ProtocolError::SyntaxError(msg) => write!(f, "Syntax error: {}", msg),
            ProtocolError::NotImplemented(c) => write!(f, "Command not implemented: {}", c),
            ProtocolError::ParameterNotImplemented(p) => {
                write!(f, "Parameter not implemented: {}", p)
            }
            ProtocolError::DuplicateVerb(v) => write!(f, "Duplicate command registration: {}", v),
            ProtocolError::CommandTooLong => write!(f, "Command too long"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// General FTP server error that encompasses all error types
#[derive(Debug)]
pub enum FtpServerError {
    Auth(AuthError),
    Security(SecurityError),
    Storage(StorageError),
    Transfer(TransferError),
    Protocol(ProtocolError),
    IoError(io::Error),
    ConfigError(String),
}

impl fmt::Display for FtpServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpServerError::Auth(e) => write!(f, "Authentication error: {}", e),
            FtpServerError::Security(e) => write!(f, "Security error: {}", e),
            FtpServerError::Storage(e) => write!(f, "Storage error: {}", e),
            FtpServerError::Transfer(e) => write!(f, "Transfer error: {}", e),
            FtpServerError::Protocol(e) => write!(f, "Protocol error: {}", e),
            FtpServerError::IoError(e) => write!(f, "I/O error: {}", e),
            FtpServerError::ConfigError(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for FtpServerError {}

impl From<AuthError> for FtpServerError {
    fn from(error: AuthError) -> Self {
        FtpServerError::Auth(error)
    }
}

impl From<SecurityError> for FtpServerError {
    fn from(error: SecurityError) -> Self {
        FtpServerError::Security(error)
    }
}

impl From<StorageError> for FtpServerError {
    fn from(error: StorageError) -> Self {
        FtpServerError::Storage(error)
    }
}

impl From<TransferError> for FtpServerError {
    fn from(error: TransferError) -> Self {
        FtpServerError::Transfer(error)
    }
}

impl From<ProtocolError> for FtpServerError {
    fn from(error: ProtocolError) -> Self {
        FtpServerError::Protocol(error)
    }
}

impl From<io::Error> for FtpServerError {
    fn from(error: io::Error) -> Self {
        FtpServerError::IoError(error)
    }
}

impl From<config::ConfigError> for FtpServerError {
    fn from(error: config::ConfigError) -> Self {
        FtpServerError::ConfigError(error.to_string())
    }
}
