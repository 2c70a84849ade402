//! Action descriptors: the declarative half of an action.
//!
//! A descriptor is one TOML file under `<root>/<kind>/<category>/`. It names
//! the action, declares its guards and points at a compiled-in handler by
//! name. Parsing validates the shape for the kind the file was found under,
//! so a descriptor that reaches the registry is structurally sound.

use std::fmt;
use std::path::{Path, PathBuf};

use herald_core::Permissions;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

// =============================================================================
// Kinds
// =============================================================================

/// The structural category of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Command,
    Button,
    Modal,
    StringMenu,
    Reaction,
    Route,
    Event,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Command,
        ActionKind::Button,
        ActionKind::Modal,
        ActionKind::StringMenu,
        ActionKind::Reaction,
        ActionKind::Route,
        ActionKind::Event,
    ];

    /// Directory under the actions root holding this kind's categories.
    pub fn dir_name(self) -> &'static str {
        match self {
            ActionKind::Command => "commands",
            ActionKind::Button => "buttons",
            ActionKind::Modal => "modals",
            ActionKind::StringMenu => "menus",
            ActionKind::Reaction => "reactions",
            ActionKind::Route => "routes",
            ActionKind::Event => "events",
        }
    }

    /// Mandatory kinds fail the whole load on a single bad descriptor.
    ///
    /// Commands are published to the platform as one catalog, and a partial
    /// catalog is worse than none.
    pub fn is_mandatory(self) -> bool {
        matches!(self, ActionKind::Command)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Command => write!(f, "command"),
            ActionKind::Button => write!(f, "button"),
            ActionKind::Modal => write!(f, "modal"),
            ActionKind::StringMenu => write!(f, "string_menu"),
            ActionKind::Reaction => write!(f, "reaction"),
            ActionKind::Route => write!(f, "route"),
            ActionKind::Event => write!(f, "event"),
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(ActionKind::Command),
            "button" => Ok(ActionKind::Button),
            "modal" => Ok(ActionKind::Modal),
            "string_menu" => Ok(ActionKind::StringMenu),
            "reaction" => Ok(ActionKind::Reaction),
            "route" => Ok(ActionKind::Route),
            "event" => Ok(ActionKind::Event),
            _ => Err(format!("Unknown action kind: {}", s)),
        }
    }
}

// =============================================================================
// Descriptor model
// =============================================================================

/// Fields shared by every kind.
#[derive(Debug, Clone, Default)]
pub struct DescriptorBase {
    pub description: String,
    /// Capabilities the actor must hold. Empty means unrestricted.
    pub permissions: Permissions,
    pub dev_only: bool,
    pub guild_only: bool,
    pub disabled: bool,
    /// Open a debug stream for every invocation of this action.
    pub debug: bool,
    /// Name of the compiled-in handler bound to this action.
    pub handler: String,
    /// Category directory the descriptor was found in.
    pub category: String,
    /// File the descriptor was parsed from.
    pub source: PathBuf,
}

/// Input value types accepted by a command option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
}

/// One declared input of a chat command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OptionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub autocomplete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandPayload {
    pub name: String,
    pub options: Vec<CommandOption>,
}

impl CommandPayload {
    pub fn has_autocomplete(&self) -> bool {
        self.options.iter().any(|o| o.autocomplete)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePayload {
    /// Normalized path relative to the API mount.
    pub path: String,
    /// Upper-case HTTP method.
    pub method: String,
    /// Accept any sub-path below `path`.
    pub follow_folders: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub event: String,
    /// Position within the event's fan-out, ascending.
    pub order: u32,
}

/// Kind-specific part of a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Command(CommandPayload),
    Button { custom_id: String },
    Modal { custom_id: String },
    StringMenu { custom_id: String },
    Reaction { emoji: String },
    Route(RoutePayload),
    Event(EventPayload),
}

/// A validated action descriptor.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub base: DescriptorBase,
    pub payload: Payload,
}

impl Descriptor {
    pub fn kind(&self) -> ActionKind {
        match self.payload {
            Payload::Command(_) => ActionKind::Command,
            Payload::Button { .. } => ActionKind::Button,
            Payload::Modal { .. } => ActionKind::Modal,
            Payload::StringMenu { .. } => ActionKind::StringMenu,
            Payload::Reaction { .. } => ActionKind::Reaction,
            Payload::Route(_) => ActionKind::Route,
            Payload::Event(_) => ActionKind::Event,
        }
    }

    /// The identifying field, unique within the kind.
    ///
    /// Routes are identified by `METHOD /path`, events by `name#order`.
    pub fn id(&self) -> String {
        match &self.payload {
            Payload::Command(c) => c.name.clone(),
            Payload::Button { custom_id }
            | Payload::Modal { custom_id }
            | Payload::StringMenu { custom_id } => custom_id.clone(),
            Payload::Reaction { emoji } => emoji.clone(),
            Payload::Route(r) => format!("{} {}", r.method, r.path),
            Payload::Event(e) => format!("{}#{}", e.event, e.order),
        }
    }

    /// Parse and validate a descriptor file found under `kind`'s directory.
    pub fn from_file(path: &Path, kind: ActionKind) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path, kind)
    }

    /// Parse and validate descriptor TOML. `path` is used for error reporting
    /// and to derive the category.
    pub fn parse(content: &str, path: &Path, kind: ActionKind) -> Result<Self, LoadError> {
        let raw: DescriptorFile = toml::from_str(content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;
        raw.validate(path, kind)
    }
}

// =============================================================================
// On-disk shape
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptorFile {
    name: Option<String>,
    custom_id: Option<String>,
    emoji: Option<String>,
    path: Option<String>,
    method: Option<String>,
    #[serde(default)]
    follow_folders: bool,
    event: Option<String>,
    order: Option<u32>,
    #[serde(default)]
    options: Vec<CommandOption>,

    #[serde(default)]
    description: String,
    handler: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    dev_only: bool,
    #[serde(default)]
    guild_only: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    debug: bool,
}

const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

impl DescriptorFile {
    fn validate(self, path: &Path, kind: ActionKind) -> Result<Descriptor, LoadError> {
        let invalid = |message: String| LoadError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        self.reject_foreign_fields(kind).map_err(invalid)?;

        let payload = match kind {
            ActionKind::Command => {
                let name = required(self.name, "name", path)?;
                validate_command_name(&name).map_err(invalid)?;
                validate_options(&self.options).map_err(invalid)?;
                Payload::Command(CommandPayload {
                    name,
                    options: self.options,
                })
            }
            ActionKind::Button | ActionKind::Modal | ActionKind::StringMenu => {
                let custom_id = required(self.custom_id, "custom_id", path)?;
                if custom_id.chars().count() > 100 {
                    return Err(invalid(format!(
                        "custom_id `{}` exceeds 100 characters",
                        custom_id
                    )));
                }
                match kind {
                    ActionKind::Button => Payload::Button { custom_id },
                    ActionKind::Modal => Payload::Modal { custom_id },
                    _ => Payload::StringMenu { custom_id },
                }
            }
            ActionKind::Reaction => Payload::Reaction {
                emoji: required(self.emoji, "emoji", path)?,
            },
            ActionKind::Route => {
                let raw_path = required(self.path, "path", path)?;
                if !raw_path.starts_with('/') {
                    return Err(invalid(format!(
                        "route path `{}` must start with `/`",
                        raw_path
                    )));
                }
                let method = self
                    .method
                    .map(|m| m.trim().to_ascii_uppercase())
                    .unwrap_or_else(|| "GET".to_string());
                if !HTTP_METHODS.contains(&method.as_str()) {
                    return Err(invalid(format!("unsupported HTTP method `{}`", method)));
                }
                Payload::Route(RoutePayload {
                    path: normalize_path(&raw_path),
                    method,
                    follow_folders: self.follow_folders,
                })
            }
            ActionKind::Event => Payload::Event(EventPayload {
                event: required(self.event, "event", path)?,
                order: self.order.unwrap_or(0),
            }),
        };

        let handler = required(self.handler, "handler", path)?;
        let permissions = Permissions::from_names(&self.permissions)
            .map_err(|name| invalid(format!("unknown permission `{}`", name)))?;

        let category = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Descriptor {
            base: DescriptorBase {
                description: self.description,
                permissions,
                dev_only: self.dev_only,
                guild_only: self.guild_only,
                disabled: self.disabled,
                debug: self.debug,
                handler,
                category,
                source: path.to_path_buf(),
            },
            payload,
        })
    }

    /// Identifying fields belonging to another kind are a descriptor filed in
    /// the wrong directory.
    fn reject_foreign_fields(&self, kind: ActionKind) -> Result<(), String> {
        let present: [(&str, bool, &[ActionKind]); 8] = [
            ("name", self.name.is_some(), &[ActionKind::Command]),
            ("options", !self.options.is_empty(), &[ActionKind::Command]),
            (
                "custom_id",
                self.custom_id.is_some(),
                &[ActionKind::Button, ActionKind::Modal, ActionKind::StringMenu],
            ),
            ("emoji", self.emoji.is_some(), &[ActionKind::Reaction]),
            ("path", self.path.is_some(), &[ActionKind::Route]),
            ("method", self.method.is_some(), &[ActionKind::Route]),
            ("event", self.event.is_some(), &[ActionKind::Event]),
            ("order", self.order.is_some(), &[ActionKind::Event]),
        ];
        for (field, is_set, kinds) in present {
            if is_set && !kinds.contains(&kind) {
                return Err(format!("field `{}` is not valid for a {}", field, kind));
            }
        }
        if self.follow_folders && kind != ActionKind::Route {
            return Err(format!("field `follow_folders` is not valid for a {}", kind));
        }
        Ok(())
    }
}

fn required(value: Option<String>, field: &'static str, path: &Path) -> Result<String, LoadError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LoadError::MissingField {
            path: path.to_path_buf(),
            field,
        }),
    }
}

fn is_command_token(s: &str) -> bool {
    let len = s.chars().count();
    (1..=32).contains(&len)
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

fn validate_command_name(name: &str) -> Result<(), String> {
    if is_command_token(name) {
        Ok(())
    } else {
        Err(format!(
            "command name `{}` must be 1-32 lowercase letters, digits, `-` or `_`",
            name
        ))
    }
}

fn validate_options(options: &[CommandOption]) -> Result<(), String> {
    let mut seen_optional = false;
    for (i, opt) in options.iter().enumerate() {
        if !is_command_token(&opt.name) {
            return Err(format!("invalid option name `{}`", opt.name));
        }
        if options[..i].iter().any(|o| o.name == opt.name) {
            return Err(format!("duplicate option `{}`", opt.name));
        }
        if opt.required && seen_optional {
            return Err(format!(
                "required option `{}` must come before optional options",
                opt.name
            ));
        }
        if opt.autocomplete
            && !matches!(
                opt.kind,
                OptionType::String | OptionType::Integer | OptionType::Number
            )
        {
            return Err(format!(
                "option `{}` cannot autocomplete a {:?} value",
                opt.name, opt.kind
            ));
        }
        seen_optional |= !opt.required;
    }
    Ok(())
}

/// Collapse repeated slashes and drop a trailing slash. The root stays `/`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str, kind: ActionKind) -> Result<Descriptor, LoadError> {
        Descriptor::parse(content, Path::new("root/kind/general/file.toml"), kind)
    }

    #[test]
    fn test_parse_command() {
        let d = parse(
            r#"
name = "ban"
description = "Ban a member"
handler = "ban"
permissions = ["BAN_MEMBERS"]
guild_only = true

[[options]]
name = "user"
type = "user"
required = true

[[options]]
name = "reason"
type = "string"
autocomplete = true
"#,
            ActionKind::Command,
        )
        .unwrap();

        assert_eq!(d.kind(), ActionKind::Command);
        assert_eq!(d.id(), "ban");
        assert_eq!(d.base.category, "general");
        assert!(d.base.guild_only);
        assert!(!d.base.dev_only);
        assert_eq!(d.base.permissions, Permissions::BAN_MEMBERS);
        match &d.payload {
            Payload::Command(c) => {
                assert_eq!(c.options.len(), 2);
                assert!(c.has_autocomplete());
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_missing_identifying_field() {
        let err = parse(r#"handler = "ping""#, ActionKind::Command).unwrap_err();
        assert!(matches!(err, LoadError::MissingField { field: "name", .. }));

        let err = parse(r#"handler = "close""#, ActionKind::Button).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingField {
                field: "custom_id",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_handler() {
        let err = parse(r#"name = "ping""#, ActionKind::Command).unwrap_err();
        assert!(matches!(err, LoadError::MissingField { field: "handler", .. }));
    }

    #[test]
    fn test_blank_identifier_is_missing() {
        let err = parse("name = \"  \"\nhandler = \"x\"", ActionKind::Command).unwrap_err();
        assert!(matches!(err, LoadError::MissingField { field: "name", .. }));
    }

    #[test]
    fn test_invalid_command_name() {
        let err = parse("name = \"Ping Me\"\nhandler = \"ping\"", ActionKind::Command).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
    }

    #[test]
    fn test_required_option_after_optional() {
        let err = parse(
            r#"
name = "x"
handler = "x"
[[options]]
name = "a"
type = "string"
[[options]]
name = "b"
type = "string"
required = true
"#,
            ActionKind::Command,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must come before optional"));
    }

    #[test]
    fn test_unknown_permission() {
        let err = parse(
            "name = \"x\"\nhandler = \"x\"\npermissions = [\"TELEPORT\"]",
            ActionKind::Command,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown permission `TELEPORT`"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse("name = \"x\"\nhandler = \"x\"\ndev_onyl = true", ActionKind::Command)
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn test_foreign_field_rejected() {
        let err = parse(
            "custom_id = \"close\"\nhandler = \"close\"\npath = \"/x\"",
            ActionKind::Button,
        )
        .unwrap_err();
        assert!(err.to_string().contains("field `path` is not valid for a button"));
    }

    #[test]
    fn test_parse_route_defaults() {
        let d = parse("path = \"/ping/\"\nhandler = \"health\"", ActionKind::Route).unwrap();
        assert_eq!(d.id(), "GET /ping");
        match d.payload {
            Payload::Route(r) => {
                assert_eq!(r.path, "/ping");
                assert_eq!(r.method, "GET");
                assert!(!r.follow_folders);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_parse_route_method_and_validation() {
        let d = parse(
            "path = \"/hooks\"\nmethod = \"post\"\nfollow_folders = true\nhandler = \"h\"",
            ActionKind::Route,
        )
        .unwrap();
        assert_eq!(d.id(), "POST /hooks");

        let err = parse("path = \"/x\"\nmethod = \"BREW\"\nhandler = \"h\"", ActionKind::Route)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported HTTP method"));

        let err = parse("path = \"x\"\nhandler = \"h\"", ActionKind::Route).unwrap_err();
        assert!(err.to_string().contains("must start with `/`"));
    }

    #[test]
    fn test_parse_event() {
        let d = parse(
            "event = \"ready\"\norder = 20\nhandler = \"ready\"",
            ActionKind::Event,
        )
        .unwrap();
        assert_eq!(d.kind(), ActionKind::Event);
        assert_eq!(d.id(), "ready#20");
    }

    #[test]
    fn test_string_menu_and_modal_kinds() {
        let d = parse("custom_id = \"pick\"\nhandler = \"pick\"", ActionKind::StringMenu).unwrap();
        assert_eq!(d.kind(), ActionKind::StringMenu);
        let d = parse("custom_id = \"form\"\nhandler = \"form\"", ActionKind::Modal).unwrap();
        assert_eq!(d.kind(), ActionKind::Modal);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//a//b/"), "/a/b");
        assert_eq!(normalize_path("/ping"), "/ping");
    }

    #[test]
    fn test_action_kind_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.to_string().parse::<ActionKind>().unwrap(), kind);
        }
        assert!("widget".parse::<ActionKind>().is_err());
        assert!(ActionKind::Command.is_mandatory());
        assert!(!ActionKind::Route.is_mandatory());
    }
}
