//! The chat-platform collaborator.
//!
//! The dispatcher and handlers only ever talk to the platform through
//! [`ChatPlatform`]; the transport behind it is owned elsewhere.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use herald_core::ChannelId;
use serde::{Deserialize, Serialize};

use crate::descriptor::CommandOption;
use crate::error::PlatformError;
use crate::event::ReplyTarget;

/// A message sent to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    /// Visible only to the invoking user.
    pub ephemeral: bool,
}

impl OutgoingMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// One autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
    pub value: serde_json::Value,
}

/// A command as published to the platform's command catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
    /// Hidden from direct-message contexts.
    pub guild_only: bool,
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn reply(&self, target: &ReplyTarget, message: OutgoingMessage)
        -> Result<(), PlatformError>;

    /// Acknowledge now, answer later with [`ChatPlatform::follow_up`].
    async fn defer(&self, target: &ReplyTarget, ephemeral: bool) -> Result<(), PlatformError>;

    async fn follow_up(
        &self,
        target: &ReplyTarget,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError>;

    async fn send(&self, channel: ChannelId, message: OutgoingMessage)
        -> Result<(), PlatformError>;

    async fn autocomplete(
        &self,
        target: &ReplyTarget,
        choices: Vec<Choice>,
    ) -> Result<(), PlatformError>;

    /// Replace the platform's command catalog.
    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), PlatformError>;
}

/// Platform that only logs outbound traffic. Used when no transport is
/// attached.
#[derive(Debug, Default)]
pub struct LoggingPlatform;

#[async_trait]
impl ChatPlatform for LoggingPlatform {
    async fn reply(
        &self,
        target: &ReplyTarget,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        tracing::info!(interaction = target.interaction_id, ephemeral = message.ephemeral, content = %message.content, "reply");
        Ok(())
    }

    async fn defer(&self, target: &ReplyTarget, ephemeral: bool) -> Result<(), PlatformError> {
        tracing::info!(interaction = target.interaction_id, ephemeral, "defer");
        Ok(())
    }

    async fn follow_up(
        &self,
        target: &ReplyTarget,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        tracing::info!(interaction = target.interaction_id, content = %message.content, "follow_up");
        Ok(())
    }

    async fn send(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        tracing::info!(%channel, content = %message.content, "send");
        Ok(())
    }

    async fn autocomplete(
        &self,
        target: &ReplyTarget,
        choices: Vec<Choice>,
    ) -> Result<(), PlatformError> {
        tracing::info!(interaction = target.interaction_id, choices = choices.len(), "autocomplete");
        Ok(())
    }

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), PlatformError> {
        tracing::info!(count = commands.len(), "register_commands");
        Ok(())
    }
}

/// A call observed by [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Reply {
        interaction_id: u64,
        message: OutgoingMessage,
    },
    Defer {
        interaction_id: u64,
        ephemeral: bool,
    },
    FollowUp {
        interaction_id: u64,
        message: OutgoingMessage,
    },
    Send {
        channel: ChannelId,
        message: OutgoingMessage,
    },
    Autocomplete {
        interaction_id: u64,
        choices: Vec<Choice>,
    },
    RegisterCommands(Vec<String>),
}

/// In-memory platform that records every call, for tests and dry runs.
///
/// Failed calls are not recorded.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    /// Interactions already answered by a reply or defer, when tracked.
    acknowledged: Option<Mutex<HashSet<u64>>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform that refuses a second reply or defer on the same
    /// interaction, the way a live platform does.
    pub fn acknowledging() -> Self {
        Self {
            acknowledged: Some(Mutex::default()),
            ..Self::default()
        }
    }

    fn acknowledge(&self, target: &ReplyTarget) -> Result<(), PlatformError> {
        let Some(acknowledged) = &self.acknowledged else {
            return Ok(());
        };
        match acknowledged.lock() {
            Ok(mut ids) => {
                if !ids.insert(target.interaction_id) {
                    Err(PlatformError::AlreadyAcknowledged)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Content of every reply and follow-up, in call order.
    pub fn replies(&self) -> Vec<OutgoingMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Reply { message, .. } | PlatformCall::FollowUp { message, .. } => {
                    Some(message)
                }
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: PlatformCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn reply(
        &self,
        target: &ReplyTarget,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        self.acknowledge(target)?;
        self.push(PlatformCall::Reply {
            interaction_id: target.interaction_id,
            message,
        });
        Ok(())
    }

    async fn defer(&self, target: &ReplyTarget, ephemeral: bool) -> Result<(), PlatformError> {
        self.acknowledge(target)?;
        self.push(PlatformCall::Defer {
            interaction_id: target.interaction_id,
            ephemeral,
        });
        Ok(())
    }

    async fn follow_up(
        &self,
        target: &ReplyTarget,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        self.push(PlatformCall::FollowUp {
            interaction_id: target.interaction_id,
            message,
        });
        Ok(())
    }

    async fn send(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        self.push(PlatformCall::Send { channel, message });
        Ok(())
    }

    async fn autocomplete(
        &self,
        target: &ReplyTarget,
        choices: Vec<Choice>,
    ) -> Result<(), PlatformError> {
        self.push(PlatformCall::Autocomplete {
            interaction_id: target.interaction_id,
            choices,
        });
        Ok(())
    }

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), PlatformError> {
        self.push(PlatformCall::RegisterCommands(
            commands.iter().map(|c| c.name.clone()).collect(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_platform_records_in_order() {
        let platform = RecordingPlatform::new();
        let target = ReplyTarget {
            interaction_id: 9,
            token: "tok".to_string(),
        };
        platform.defer(&target, true).await.unwrap();
        platform
            .follow_up(&target, OutgoingMessage::new("done"))
            .await
            .unwrap();
        platform
            .send(ChannelId(3), OutgoingMessage::new("hello"))
            .await
            .unwrap();

        let calls = platform.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            PlatformCall::Defer {
                interaction_id: 9,
                ephemeral: true
            }
        );
        assert_eq!(platform.replies(), vec![OutgoingMessage::new("done")]);
    }

    #[tokio::test]
    async fn test_acknowledging_platform_refuses_second_answer() {
        let platform = RecordingPlatform::acknowledging();
        let target = ReplyTarget {
            interaction_id: 4,
            token: "tok".to_string(),
        };
        platform.defer(&target, false).await.unwrap();
        let err = platform
            .reply(&target, OutgoingMessage::new("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::AlreadyAcknowledged));
        platform
            .follow_up(&target, OutgoingMessage::new("late"))
            .await
            .unwrap();
        assert_eq!(platform.replies(), vec![OutgoingMessage::new("late")]);
        assert_eq!(platform.calls().len(), 2);
    }

    #[test]
    fn test_outgoing_message_constructors() {
        assert!(!OutgoingMessage::new("a").ephemeral);
        assert!(OutgoingMessage::ephemeral("a").ephemeral);
    }
}
