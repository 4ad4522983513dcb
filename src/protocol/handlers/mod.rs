//! Command handlers
//!
//! One handler type per verb. [`register_defaults`] is the static table of
//! every command the server answers, with its dispatch flags.

pub mod abort;
pub mod data;
pub mod files;
pub mod navigate;
pub mod security;
pub mod session;
pub mod site;

use crate::error::ProtocolError;
use crate::protocol::{CommandRegistration, CommandRegistry};

use abort::AborHandler;
use data::{EprtHandler, EpsvHandler, PasvHandler, PortHandler};
use files::{ListHandler, NlstHandler, RetrHandler, StorHandler};
use navigate::{CdupHandler, CwdHandler, PwdHandler};
use security::{AdatHandler, AuthHandler, PbszHandler, ProtHandler};
use session::{
    FeatHandler, NoopHandler, OptsHandler, PassHandler, QuitHandler, ReinHandler, SystHandler,
    TypeHandler, UserHandler,
};
use site::SiteHandler;

pub fn register_defaults(registry: &mut CommandRegistry) -> Result<(), ProtocolError> {
    let registrations = [
        // session
        CommandRegistration::new("USER", || UserHandler),
        CommandRegistration::new("PASS", || PassHandler),
        CommandRegistration::new("QUIT", || QuitHandler),
        CommandRegistration::new("NOOP", || NoopHandler),
        CommandRegistration::new("SYST", || SystHandler),
        CommandRegistration::new("FEAT", || FeatHandler),
        CommandRegistration::new("OPTS", || OptsHandler),
        CommandRegistration::new("REIN", || ReinHandler),
        CommandRegistration::new("TYPE", || TypeHandler).login_required(),
        // security
        CommandRegistration::new("AUTH", || AuthHandler),
        CommandRegistration::new("ADAT", || AdatHandler),
        CommandRegistration::new("PBSZ", || PbszHandler),
        CommandRegistration::new("PROT", || ProtHandler),
        // data channel
        CommandRegistration::new("PASV", || PasvHandler).login_required(),
        CommandRegistration::new("EPSV", || EpsvHandler).login_required(),
        CommandRegistration::new("PORT", || PortHandler).login_required(),
        CommandRegistration::new("EPRT", || EprtHandler).login_required(),
        // navigation
        CommandRegistration::new("PWD", || PwdHandler).login_required(),
        CommandRegistration::new("CWD", || CwdHandler).login_required(),
        CommandRegistration::new("CDUP", || CdupHandler).login_required(),
        CommandRegistration::new("SITE", || SiteHandler).login_required(),
        // transfers
        CommandRegistration::new("ABOR", || AborHandler),
        CommandRegistration::new("LIST", || ListHandler)
            .login_required()
            .abortable(),
        CommandRegistration::new("NLST", || NlstHandler)
            .login_required()
            .abortable(),
        CommandRegistration::new("RETR", || RetrHandler)
            .login_required()
            .abortable(),
        CommandRegistration::new("STOR", || StorHandler)
            .login_required()
            .abortable(),
    ];

    for registration in registrations {
        registry.register(registration)?;
    }
    Ok(())
}
