//! Module `state`
//!
//! Defines the `Session` struct holding everything a control connection
//! remembers between commands: login, security negotiation, working
//! directory, encoding and the data connection setup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::protocol::TextEncoding;
use crate::security::{AuthMechanism, SecurityStateMachine, SecurityStatus, security_state_machine};
use crate::storage::VirtualPath;
use crate::transfer::{DataConnectionFeature, DataType};

/// Per-connection state. Owned by one connection and never shared with another.
pub struct Session {
    username: Option<String>,
    is_logged_in: bool,
    security: SecurityStateMachine,
    mechanism: Option<Arc<dyn AuthMechanism>>,
    pbsz_received: bool,
    control_secure: bool,
    encoding: TextEncoding,
    current_path: VirtualPath,
    data_type: DataType,
    data_connection: DataConnectionFeature,
    last_activity: Instant,
}

impl Session {
    pub fn new(data_connection: DataConnectionFeature) -> Self {
        Self {
            username: None,
            is_logged_in: false,
            security: security_state_machine(),
            mechanism: None,
            pbsz_received: false,
            control_secure: false,
            encoding: TextEncoding::default(),
            current_path: VirtualPath::root(),
            data_type: DataType::default(),
            data_connection,
            last_activity: Instant::now(),
        }
    }

    /// REIN: forget the user, the security negotiation and the data setup.
    /// The control stream itself stays as it is, TLS included.
    pub fn reinitialize(&mut self) {
        self.username = None;
        self.is_logged_in = false;
        self.security.reset();
        self.mechanism = None;
        self.pbsz_received = false;
        self.encoding = TextEncoding::default();
        self.current_path = VirtualPath::root();
        self.data_type = DataType::default();
        self.data_connection.reset();
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    pub fn security_status(&self) -> SecurityStatus {
        self.security.status()
    }

    pub fn security(&mut self) -> &mut SecurityStateMachine {
        &mut self.security
    }

    pub fn mechanism(&self) -> Option<Arc<dyn AuthMechanism>> {
        self.mechanism.clone()
    }

    pub fn pbsz_received(&self) -> bool {
        self.pbsz_received
    }

    /// Whether the control stream has been upgraded to TLS.
    pub fn is_control_secure(&self) -> bool {
        self.control_secure
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn current_path(&self) -> &VirtualPath {
        &self.current_path
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn data_connection(&mut self) -> &mut DataConnectionFeature {
        &mut self.data_connection
    }

    // --------------------
    // Setter methods
    // --------------------

    /// USER starts a new login; any previous login is dropped.
    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
        self.is_logged_in = false;
    }

    pub fn set_logged_in(&mut self, logged_in: bool) {
        self.is_logged_in = logged_in;
    }

    pub fn set_mechanism(&mut self, mechanism: Option<Arc<dyn AuthMechanism>>) {
        self.mechanism = mechanism;
    }

    pub fn set_pbsz_received(&mut self, received: bool) {
        self.pbsz_received = received;
    }

    pub fn set_control_secure(&mut self, secure: bool) {
        self.control_secure = secure;
    }

    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    pub fn set_current_path(&mut self, path: VirtualPath) {
        self.current_path = path;
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
    }

    // --------------------
    // Liveness
    // --------------------

    /// Records activity on the control connection.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// False once no command arrived for `idle_timeout`.
    pub fn is_alive(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() < idle_timeout
    }
}
