//! `/ping` command handler.
//!
//! Replies with the time the dispatcher spent before the reply went out.

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::debug::{DebugLog, DebugStream};
use crate::error::ActionError;
use crate::event::CommandInteraction;
use crate::handler::{ActionHandler, CommandHandler};
use crate::platform::OutgoingMessage;

pub struct PingCommand;

#[async_trait]
impl ActionHandler<CommandInteraction> for PingCommand {
    async fn handle(
        &self,
        ctx: &InvocationContext<CommandInteraction>,
        debug: Option<&DebugStream>,
    ) -> Result<(), ActionError> {
        let ephemeral = match ctx.event.option("ephemeral") {
            None => false,
            Some(value) => value.as_bool().ok_or_else(|| {
                ActionError::InvalidInput("`ephemeral` must be a boolean".to_string())
            })?,
        };

        let elapsed = ctx.elapsed().as_millis();
        debug.log(format!("dispatch latency {}ms", elapsed));

        let content = format!("Pong! ({}ms)", elapsed);
        let message = if ephemeral {
            OutgoingMessage::ephemeral(content)
        } else {
            OutgoingMessage::new(content)
        };
        ctx.reply(message).await?;
        debug.log("reply sent");
        Ok(())
    }
}

impl CommandHandler for PingCommand {}
