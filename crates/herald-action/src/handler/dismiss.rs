//! Button handler acknowledging a "dismiss" press.

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::debug::{DebugLog, DebugStream};
use crate::error::ActionError;
use crate::event::ComponentInteraction;
use crate::handler::ActionHandler;
use crate::platform::OutgoingMessage;

pub struct DismissButton;

#[async_trait]
impl ActionHandler<ComponentInteraction> for DismissButton {
    async fn handle(
        &self,
        ctx: &InvocationContext<ComponentInteraction>,
        debug: Option<&DebugStream>,
    ) -> Result<(), ActionError> {
        debug.log(format!("dismissing message {}", ctx.event.message_id));
        ctx.reply(OutgoingMessage::ephemeral("Dismissed.")).await
    }
}
