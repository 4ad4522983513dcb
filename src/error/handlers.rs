//! Error handlers
//!
//! Translates server errors into FTP replies. Every error a command handler
//! raises ends up here, so the connection always gets exactly one reply.

use crate::error::types::{
    AuthError, FtpServerError, ProtocolError, SecurityError, StorageError, TransferError,
};
use crate::protocol::Response;
use log::{error, warn};

/// Log an FTP server error at a level matching its severity
pub fn handle_error(err: &FtpServerError) {
    match err {
        FtpServerError::IoError(_) => {
            error!("FTP Server Error: {}", err)
        }
        FtpServerError::Transfer(TransferError::Cancelled) => {}
        _ => warn!("FTP Server Error: {}", err),
    }
}

/// Convert error to FTP response code
pub fn error_to_ftp_code(err: &FtpServerError) -> u16 {
    match err {
        FtpServerError::Auth(e) => match e {
            AuthError::InvalidCredentials(_) | AuthError::NotLoggedIn => 530,
            AuthError::MalformedInput(_) => 501,
            AuthError::UserRequired => 503,
        },
        FtpServerError::Security(e) => match e {
            SecurityError::UnknownMechanism(_) => 504,
            SecurityError::BadSequence(_) | SecurityError::UnexpectedTransition { .. } => 503,
            SecurityError::ProtectionNotSupported(_) => 536,
            SecurityError::InvalidArgument(_) => 501,
            SecurityError::Tls(_) => 535,
        },
        FtpServerError::Storage(e) => match e {
            StorageError::NotFound(_)
            | StorageError::PermissionDenied(_)
            | StorageError::NotADirectory(_) => 550,
            StorageError::InsufficientStorage(_) => 552,
            StorageError::InvalidName(_) => 553,
            StorageError::IoError(_) => 451,
        },
        FtpServerError::Transfer(e) => match e {
            TransferError::Cancelled | TransferError::TransferFailed(_) => 426,
            TransferError::InvalidPortCommand(_)
            | TransferError::IpMismatch { .. }
            | TransferError::InvalidPortRange(_) => 501,
            TransferError::UnsupportedNetworkProtocol(_) => 522,
            TransferError::EpsvOnly => 502,
            _ => 425,
        },
        FtpServerError::Protocol(e) => match e {
            ProtocolError::UnknownCommand(_) | ProtocolError::CommandTooLong => 500,
            ProtocolError::SyntaxError(_) => 501,
            ProtocolError::NotImplemented(_) => 502,
            ProtocolError::ParameterNotImplemented(_) => 504,
            ProtocolError::DuplicateVerb(_) => 451,
        },
        FtpServerError::IoError(_) | FtpServerError::ConfigError(_) => 451,
    }
}

/// Convert error to the reply sent on the control connection
pub fn error_to_response(err: &FtpServerError) -> Response {
    let code = error_to_ftp_code(err);
    let text = match (code, err) {
        (425, FtpServerError::Transfer(TransferError::NoDataConnection)) => {
            "Use PORT, EPRT, PASV or EPSV first".to_string()
        }
        (425, FtpServerError::Transfer(e)) => format!("Can't open data connection: {}", e),
        (426, _) => "Connection closed; transfer aborted".to_string(),
        (451, FtpServerError::Storage(_)) | (451, FtpServerError::IoError(_)) => {
            "Requested action aborted: local error in processing".to_string()
        }
        (451, _) => "Requested action aborted".to_string(),
        (500, FtpServerError::Protocol(ProtocolError::UnknownCommand(_))) => {
            "Syntax error, command unrecognized".to_string()
        }
        (530, FtpServerError::Auth(AuthError::NotLoggedIn)) => "Not logged in".to_string(),
        (530, _) => "Login incorrect".to_string(),
        (_, FtpServerError::Auth(e)) => e.to_string(),
        (_, FtpServerError::Security(e)) => e.to_string(),
        (_, FtpServerError::Storage(e)) => e.to_string(),
        (_, FtpServerError::Transfer(e)) => e.to_string(),
        (_, FtpServerError::Protocol(e)) => e.to_string(),
        (_, other) => other.to_string(),
    };
    Response::new(code, text)
}
