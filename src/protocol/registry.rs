//! Command registration table
//!
//! Maps verbs to handler factories plus their dispatch flags. Built
//! explicitly at startup; registering a verb twice is an error.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{FtpServerError, ProtocolError};
use crate::protocol::{CommandContext, Reply};

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError>;
}

pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn CommandHandler> + Send + Sync>;

#[derive(Clone)]
pub struct CommandRegistration {
    verb: String,
    login_required: bool,
    abortable: bool,
    factory: HandlerFactory,
}

impl CommandRegistration {
    pub fn new<H, F>(verb: &str, factory: F) -> Self
    where
        H: CommandHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        Self {
            verb: verb.to_ascii_uppercase(),
            login_required: false,
            abortable: false,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn CommandHandler>),
        }
    }

    pub fn login_required(mut self) -> Self {
        self.login_required = true;
        self
    }

    pub fn abortable(mut self) -> Self {
        self.abortable = true;
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn is_login_required(&self) -> bool {
        self.login_required
    }

    pub fn is_abortable(&self) -> bool {
        self.abortable
    }

    pub fn create_handler(&self) -> Box<dyn CommandHandler> {
        (self.factory)()
    }
}

#[derive(Clone, Default)]
pub struct CommandRegistry {
    registrations: HashMap<String, CommandRegistration>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full command set served by the daemon.
    pub fn with_defaults() -> Result<Self, ProtocolError> {
        let mut registry = Self::new();
        crate::protocol::handlers::register_defaults(&mut registry)?;
        Ok(registry)
    }

    pub fn register(&mut self, registration: CommandRegistration) -> Result<(), ProtocolError> {
        if self.registrations.contains_key(registration.verb()) {
            return Err(ProtocolError::DuplicateVerb(registration.verb().to_string()));
        }
        self.registrations
            .insert(registration.verb().to_string(), registration);
        Ok(())
    }

    pub fn get(&self, verb: &str) -> Option<&CommandRegistration> {
        self.registrations.get(&verb.to_ascii_uppercase())
    }

    pub fn verbs(&self) -> Vec<&str> {
        let mut verbs: Vec<&str> = self.registrations.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        verbs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Response;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn process(&self, _ctx: &CommandContext) -> Result<Reply, FtpServerError> {
            Ok(Response::new(200, "ok").into())
        }
    }

    #[test]
    fn test_duplicate_verb_is_rejected() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandRegistration::new("noop", || Noop)).unwrap();
        assert!(matches!(
            registry.register(CommandRegistration::new("NOOP", || Noop)),
            Err(ProtocolError::DuplicateVerb(verb)) if verb == "NOOP"
        ));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = CommandRegistry::new();
        registry
            .register(CommandRegistration::new("LIST", || Noop).login_required().abortable())
            .unwrap();
        let registration = registry.get("list").unwrap();
        assert!(registration.is_login_required());
        assert!(registration.is_abortable());
        assert!(registry.get("RETR").is_none());
    }

    #[test]
    fn test_default_table_flags() {
        let registry = CommandRegistry::with_defaults().unwrap();
        for verb in ["USER", "PASS", "QUIT", "AUTH", "PBSZ", "PROT", "ABOR", "FEAT", "REIN"] {
            let registration = registry.get(verb).unwrap();
            assert!(!registration.is_login_required(), "{verb}");
            assert!(!registration.is_abortable(), "{verb}");
        }
        for verb in ["PASV", "EPSV", "PORT", "EPRT", "CWD", "PWD", "SITE"] {
            let registration = registry.get(verb).unwrap();
            assert!(registration.is_login_required(), "{verb}");
            assert!(!registration.is_abortable(), "{verb}");
        }
        for verb in ["LIST", "NLST", "RETR", "STOR"] {
            let registration = registry.get(verb).unwrap();
            assert!(registration.is_login_required(), "{verb}");
            assert!(registration.is_abortable(), "{verb}");
        }
    }
}
