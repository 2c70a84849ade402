//! `ready` lifecycle handler: announces the bot is online.

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::debug::{DebugLog, DebugStream};
use crate::error::ActionError;
use crate::event::LifecycleEvent;
use crate::handler::ActionHandler;
use crate::platform::OutgoingMessage;

pub struct ReadyAnnouncer;

#[async_trait]
impl ActionHandler<LifecycleEvent> for ReadyAnnouncer {
    async fn handle(
        &self,
        ctx: &InvocationContext<LifecycleEvent>,
        debug: Option<&DebugStream>,
    ) -> Result<(), ActionError> {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "Herald is online");

        if let Some(channel) = ctx.config().developers.debug_channel {
            debug.log(format!("announcing in channel {}", channel));
            ctx.platform()
                .send(
                    channel,
                    OutgoingMessage::new(format!(
                        "Herald v{} is online.",
                        env!("CARGO_PKG_VERSION")
                    )),
                )
                .await?;
        }
        Ok(())
    }
}
