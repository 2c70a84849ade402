//! Per-dispatch invocation context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use herald_core::{Actor, CorrelationId, GuildId, HeraldConfig};

use crate::descriptor::ActionKind;
use crate::error::ActionError;
use crate::event::{InboundEvent, Interaction};
use crate::platform::{ChatPlatform, OutgoingMessage};

/// Collaborators handed to every handler.
///
/// Stores and other long-lived resources are injected into handler
/// constructors instead; this only carries what every handler may need.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<HeraldConfig>,
    pub platform: Arc<dyn ChatPlatform>,
}

impl Services {
    pub fn new(config: Arc<HeraldConfig>, platform: Arc<dyn ChatPlatform>) -> Self {
        Self { config, platform }
    }
}

/// Everything one handler invocation sees. Created by the dispatcher and
/// dropped when the invocation settles.
pub struct InvocationContext<E> {
    pub event: E,
    pub correlation_id: CorrelationId,
    pub kind: ActionKind,
    /// Identifier of the resolved action.
    pub action_id: String,
    services: Services,
    started_at: Instant,
}

impl<E: InboundEvent> InvocationContext<E> {
    pub fn new(event: E, kind: ActionKind, action_id: String, services: Services) -> Self {
        Self {
            event,
            correlation_id: CorrelationId::new(),
            kind,
            action_id,
            services,
            started_at: Instant::now(),
        }
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.event.actor()
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.event.guild_id()
    }

    /// `false` for direct messages and non-chat sources.
    pub fn is_guild(&self) -> bool {
        self.guild_id().is_some()
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.services.config
    }

    pub fn platform(&self) -> &dyn ChatPlatform {
        self.services.platform.as_ref()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl<E: Interaction> InvocationContext<E> {
    pub async fn reply(&self, message: OutgoingMessage) -> Result<(), ActionError> {
        self.platform()
            .reply(self.event.target(), message)
            .await
            .map_err(Into::into)
    }

    pub async fn defer(&self, ephemeral: bool) -> Result<(), ActionError> {
        self.platform()
            .defer(self.event.target(), ephemeral)
            .await
            .map_err(Into::into)
    }

    pub async fn follow_up(&self, message: OutgoingMessage) -> Result<(), ActionError> {
        self.platform()
            .follow_up(self.event.target(), message)
            .await
            .map_err(Into::into)
    }
}
