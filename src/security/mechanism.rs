//! Security mechanisms negotiated through AUTH/ADAT.

use async_trait::async_trait;

use crate::error::SecurityError;
use crate::protocol::Response;
use crate::security::status::SecurityActionResult;

/// The reply a mechanism proposes, plus the result tag the state machine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MechanismReply {
    pub response: Response,
    pub result: Option<SecurityActionResult>,
}

impl MechanismReply {
    pub fn with_result(result: SecurityActionResult, text: impl Into<String>) -> Self {
        Self {
            response: Response::new(result.code(), text),
            result: Some(result),
        }
    }

    pub fn failure(code: u16, text: impl Into<String>) -> Self {
        Self {
            response: Response::new(code, text),
            result: None,
        }
    }
}

#[async_trait]
pub trait AuthMechanism: Send + Sync {
    /// Whether this mechanism serves `AUTH <name>`.
    fn handles(&self, name: &str) -> bool;

    /// Whether a completed negotiation switches the control stream to TLS.
    fn secures_control_stream(&self) -> bool;

    async fn handle_auth(&self, name: &str) -> Result<MechanismReply, SecurityError>;

    async fn handle_adat(&self, data: &str) -> Result<MechanismReply, SecurityError>;
}

/// `AUTH TLS` (RFC 4217). Completes in one round trip; the handshake itself
/// runs on the control stream right after the 234 reply.
pub struct TlsMechanism {
    available: bool,
}

impl TlsMechanism {
    pub fn new(available: bool) -> Self {
        Self { available }
    }
}

#[async_trait]
impl AuthMechanism for TlsMechanism {
    fn handles(&self, name: &str) -> bool {
        matches!(name.to_ascii_uppercase().as_str(), "TLS" | "TLS-C" | "SSL")
    }

    fn secures_control_stream(&self) -> bool {
        true
    }

    async fn handle_auth(&self, _name: &str) -> Result<MechanismReply, SecurityError> {
        if !self.available {
            return Ok(MechanismReply::failure(
                431,
                "Need some unavailable resource to process security",
            ));
        }
        Ok(MechanismReply::with_result(
            SecurityActionResult::SecurityDataExchangeComplete,
            "AUTH command OK. Expecting TLS Negotiation.",
        ))
    }

    async fn handle_adat(&self, _data: &str) -> Result<MechanismReply, SecurityError> {
        Ok(MechanismReply::failure(
            504,
            "ADAT is not used by the TLS mechanism",
        ))
    }
}
