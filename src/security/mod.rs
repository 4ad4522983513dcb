//! Security negotiation
//!
//! AUTH/ADAT state machine, security mechanisms, TLS acceptor construction
//! and the plain-or-TLS stream used by control and data connections.

pub mod mechanism;
pub mod state_machine;
pub mod status;
pub mod stream;
pub mod tls;

pub use mechanism::{AuthMechanism, MechanismReply, TlsMechanism};
pub use state_machine::{Criterion, InvalidTransition, StateMachine, Transition, TransitionInput};
pub use status::{
    SECURITY_TRANSITIONS, SecurityActionResult, SecurityStateMachine, SecurityStatus,
    security_state_machine,
};
pub use stream::SecureStream;
pub use tls::{acceptor_from_config, load_tls_acceptor};
