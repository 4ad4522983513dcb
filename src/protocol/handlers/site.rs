//! SITE extensions. `SITE BLST` lists the background transfer queue.

use async_trait::async_trait;

use crate::error::{FtpServerError, ProtocolError};
use crate::protocol::responses::SYSTEM_STATUS;
use crate::protocol::{CommandContext, CommandHandler, Reply, Response};

pub struct SiteHandler;

#[async_trait]
impl CommandHandler for SiteHandler {
    async fn process(&self, ctx: &CommandContext) -> Result<Reply, FtpServerError> {
        let subcommand = ctx
            .argument()
            .split_whitespace()
            .next()
            .map(str::to_ascii_uppercase)
            .ok_or_else(|| ProtocolError::SyntaxError("SITE requires a subcommand".into()))?;

        match subcommand.as_str() {
            "BLST" => Ok(background_list(ctx)),
            other => Err(ProtocolError::NotImplemented(format!("SITE {}", other)).into()),
        }
    }
}

fn background_list(ctx: &CommandContext) -> Reply {
    let states = ctx.services.worker.get_states();

    let mut lines = vec![format!("{} background transfer(s):", states.len())];
    lines.extend(
        states
            .iter()
            .map(|state| format!("{} {} {}", state.id, state.status, state.transferred)),
    );
    lines.push("End".into());
    Response::multi_line(SYSTEM_STATUS, lines).into()
}
