//! Inbound events as delivered by the chat-platform and HTTP collaborators.

use std::collections::BTreeMap;
use std::sync::Mutex;

use herald_core::{Actor, ChannelId, GuildId, MessageId};
use serde::{Deserialize, Serialize};

/// Handle for answering an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub interaction_id: u64,
    pub token: String,
}

/// Guard-relevant facts every inbound event exposes.
pub trait InboundEvent: Send + Sync + 'static {
    fn actor(&self) -> Option<&Actor>;
    fn guild_id(&self) -> Option<GuildId>;
}

/// Events that can be answered in place.
pub trait Interaction: InboundEvent {
    fn target(&self) -> &ReplyTarget;
}

// =============================================================================
// Chat events
// =============================================================================

/// A value supplied for a command option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    pub name: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInteraction {
    pub target: ReplyTarget,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    #[serde(skip)]
    pub actor: Option<Actor>,
    pub name: String,
    #[serde(default)]
    pub options: Vec<OptionValue>,
}

impl CommandInteraction {
    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.options.iter().find(|o| o.name == name).map(|o| &o.value)
    }
}

/// The option the user is currently typing into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusedOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocompleteInteraction {
    pub target: ReplyTarget,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    #[serde(skip)]
    pub actor: Option<Actor>,
    pub command: String,
    pub focused: FocusedOption,
    #[serde(default)]
    pub options: Vec<OptionValue>,
}

/// A button press or a string-menu selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInteraction {
    pub target: ReplyTarget,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    #[serde(skip)]
    pub actor: Option<Actor>,
    pub message_id: MessageId,
    pub custom_id: String,
    /// Selected values; empty for buttons.
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalSubmit {
    pub target: ReplyTarget,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    #[serde(skip)]
    pub actor: Option<Actor>,
    pub custom_id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    #[serde(skip)]
    pub actor: Option<Actor>,
    pub message_id: MessageId,
    /// Unicode emoji, or `name:id` for custom emoji.
    pub emoji: String,
    /// `false` when the reaction was removed.
    pub added: bool,
}

/// A platform lifecycle event such as `ready` or `guild_member_add`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub name: String,
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl LifecycleEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guild_id: None,
            data: serde_json::Value::Null,
        }
    }
}

macro_rules! inbound {
    ($($ty:ty),* $(,)?) => {
        $(
            impl InboundEvent for $ty {
                fn actor(&self) -> Option<&Actor> {
                    self.actor.as_ref()
                }
                fn guild_id(&self) -> Option<GuildId> {
                    self.guild_id
                }
            }
        )*
    };
}

inbound!(
    CommandInteraction,
    AutocompleteInteraction,
    ComponentInteraction,
    ModalSubmit,
    ReactionEvent,
);

macro_rules! interaction {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Interaction for $ty {
                fn target(&self) -> &ReplyTarget {
                    &self.target
                }
            }
        )*
    };
}

interaction!(
    CommandInteraction,
    AutocompleteInteraction,
    ComponentInteraction,
    ModalSubmit,
);

impl InboundEvent for LifecycleEvent {
    fn actor(&self) -> Option<&Actor> {
        None
    }
    fn guild_id(&self) -> Option<GuildId> {
        self.guild_id
    }
}

// =============================================================================
// HTTP exchange
// =============================================================================

/// A parsed HTTP request as handed over by the HTTP collaborator.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub method: String,
    /// Full request path, including the mount prefix.
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RouteRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// The response a route handler produces.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// JSON body of every error answer on the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. `not_found` or `forbidden`.
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: code.to_string(),
            message: message.into(),
        }
    }
}

impl RouteResponse {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.into().into_bytes(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    /// An error answer in the shared [`ErrorBody`] shape.
    pub fn error(status: u16, code: &str, message: impl Into<String>) -> Self {
        let body = serde_json::to_value(ErrorBody::new(code, message))
            .unwrap_or(serde_json::Value::Null);
        Self::json(status, &body)
    }
}

/// A request plus the slot its handler answers through.
#[derive(Debug)]
pub struct RouteExchange {
    pub request: RouteRequest,
    /// Remainder below a `follow_folders` route's path; empty on exact match.
    pub sub_path: String,
    response: Mutex<Option<RouteResponse>>,
}

impl RouteExchange {
    pub fn new(request: RouteRequest, sub_path: String) -> Self {
        Self {
            request,
            sub_path,
            response: Mutex::new(None),
        }
    }

    /// Answer the request. A later call replaces an earlier answer.
    pub fn respond(&self, response: RouteResponse) {
        if let Ok(mut slot) = self.response.lock() {
            *slot = Some(response);
        }
    }

    pub fn has_responded(&self) -> bool {
        self.response.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    pub(crate) fn take_response(&self) -> Option<RouteResponse> {
        self.response.lock().ok().and_then(|mut s| s.take())
    }
}

impl InboundEvent for RouteExchange {
    fn actor(&self) -> Option<&Actor> {
        None
    }
    fn guild_id(&self) -> Option<GuildId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_option_lookup() {
        let cmd = CommandInteraction {
            target: ReplyTarget {
                interaction_id: 1,
                token: "t".to_string(),
            },
            channel_id: ChannelId(2),
            guild_id: None,
            actor: None,
            name: "echo".to_string(),
            options: vec![OptionValue {
                name: "text".to_string(),
                value: serde_json::json!("hi"),
            }],
        };
        assert_eq!(cmd.option("text"), Some(&serde_json::json!("hi")));
        assert!(cmd.option("other").is_none());
    }

    #[test]
    fn test_component_deserializes_without_actor() {
        let json = r#"{
            "target": {"interaction_id": 5, "token": "abc"},
            "channel_id": 10,
            "guild_id": 20,
            "message_id": 30,
            "custom_id": "close"
        }"#;
        let event: ComponentInteraction = serde_json::from_str(json).unwrap();
        assert_eq!(event.custom_id, "close");
        assert_eq!(event.guild_id(), Some(GuildId(20)));
        assert!(event.actor().is_none());
        assert!(event.values.is_empty());
    }

    #[test]
    fn test_request_header_case_insensitive() {
        let mut req = RouteRequest::new("GET", "/api/ping");
        req.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert!(req.header("accept").is_none());
    }

    #[test]
    fn test_exchange_response_slot() {
        let exchange = RouteExchange::new(RouteRequest::new("GET", "/api/x"), String::new());
        assert!(!exchange.has_responded());
        exchange.respond(RouteResponse::text(200, "first"));
        exchange.respond(RouteResponse::text(201, "second"));
        assert!(exchange.has_responded());
        let resp = exchange.take_response().unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, b"second".to_vec());
        assert!(exchange.take_response().is_none());
    }
}
