//! FTP Response handling
//!
//! Defines FTP response codes, reply formatting (including the `code-`
//! multi-line convention) and the outcome type returned by command handlers.

use std::fmt;

/// Standard FTP response codes
pub const FILE_STATUS_OK: u16 = 150;
pub const OK: u16 = 200;
pub const SYSTEM_STATUS: u16 = 211;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const CLOSING: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const ENTERING_PASSIVE: u16 = 227;
pub const ENTERING_EXTENDED_PASSIVE: u16 = 229;
pub const LOGIN_SUCCESS: u16 = 230;
pub const SECURITY_EXCHANGE_COMPLETE: u16 = 234;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const SERVICE_NOT_AVAILABLE: u16 = 421;
pub const SYNTAX_ERROR_ARGS: u16 = 501;
pub const BAD_SEQUENCE: u16 = 503;
pub const NOT_IMPLEMENTED_FOR_PARAMETER: u16 = 504;
pub const AUTH_FAILED: u16 = 530;

/// A reply on the control connection: a 3-digit code and one or more text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    code: u16,
    lines: Vec<String>,
}

impl Response {
    /// Creates a single-line response.
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    /// Creates a multi-line response. The first and the last line carry the code.
    pub fn multi_line(code: u16, lines: Vec<String>) -> Self {
        let lines = if lines.is_empty() {
            vec![String::new()]
        } else {
            lines
        };
        Self { code, lines }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns true for 1xx preliminary replies.
    pub fn is_preliminary(&self) -> bool {
        self.code < 200
    }
}

/// Wire format, CRLF terminated.
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.lines.len() - 1;
        for (index, line) in self.lines.iter().enumerate() {
            if index == last {
                write!(f, "{} {}\r\n", self.code, line)?;
            } else if index == 0 {
                write!(f, "{}-{}\r\n", self.code, line)?;
            } else {
                write!(f, " {}\r\n", line)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a command: the final reply plus what the connection does after sending it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Response(Response),
    /// Send the response, then upgrade the control stream to TLS.
    SecureControl(Response),
    /// Send the response, then close the connection.
    Close(Response),
}

impl Reply {
    pub fn response(&self) -> &Response {
        match self {
            Reply::Response(r) | Reply::SecureControl(r) | Reply::Close(r) => r,
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

/// Format an FTP response message
pub fn format_response(code: u16, message: &str) -> String {
    Response::new(code, message).to_string()
}
