//! Access guards applied before every handler invocation.

use std::fmt;

use herald_core::config::DevelopersConfig;
use herald_core::Actor;
use serde::{Deserialize, Serialize};

use crate::context::InvocationContext;
use crate::descriptor::DescriptorBase;
use crate::event::InboundEvent;

/// Why an invocation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardReason {
    Disabled,
    DevOnly,
    GuildOnly,
    InsufficientPermissions,
}

impl GuardReason {
    /// Notice shown to the actor. Developer-only actions are not disclosed
    /// as such.
    pub fn public_message(self) -> &'static str {
        match self {
            GuardReason::Disabled => "This action is currently disabled.",
            GuardReason::GuildOnly => "This action can only be used in a server.",
            GuardReason::DevOnly | GuardReason::InsufficientPermissions => {
                "You do not have permission to use this action."
            }
        }
    }
}

impl fmt::Display for GuardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardReason::Disabled => write!(f, "disabled"),
            GuardReason::DevOnly => write!(f, "dev_only"),
            GuardReason::GuildOnly => write!(f, "guild_only"),
            GuardReason::InsufficientPermissions => write!(f, "insufficient_permissions"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny(GuardReason),
}

impl GuardDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Check `base`'s guards against an actor.
///
/// Checks run in a fixed order and stop at the first failure: disabled,
/// developer-only, guild-only, permissions. A missing actor belongs to no
/// allow-list and holds no permissions.
pub fn evaluate(
    base: &DescriptorBase,
    actor: Option<&Actor>,
    in_guild: bool,
    developers: &DevelopersConfig,
) -> GuardDecision {
    if base.disabled {
        return GuardDecision::Deny(GuardReason::Disabled);
    }

    if base.dev_only && !actor.is_some_and(|a| developers.contains(a.id)) {
        return GuardDecision::Deny(GuardReason::DevOnly);
    }

    if base.guild_only && !in_guild {
        return GuardDecision::Deny(GuardReason::GuildOnly);
    }

    if !base.permissions.is_empty()
        && !actor.is_some_and(|a| a.permissions.contains(base.permissions))
    {
        return GuardDecision::Deny(GuardReason::InsufficientPermissions);
    }

    GuardDecision::Allow
}

/// [`evaluate`] against an invocation context and its configured allow-list.
pub fn evaluate_context<E: InboundEvent>(
    base: &DescriptorBase,
    ctx: &InvocationContext<E>,
) -> GuardDecision {
    evaluate(base, ctx.actor(), ctx.is_guild(), &ctx.config().developers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{Permissions, UserId};
    use std::path::PathBuf;

    fn base() -> DescriptorBase {
        DescriptorBase {
            description: String::new(),
            permissions: Permissions::empty(),
            dev_only: false,
            guild_only: false,
            disabled: false,
            debug: false,
            handler: "h".to_string(),
            category: "general".to_string(),
            source: PathBuf::from("h.toml"),
        }
    }

    fn devs() -> DevelopersConfig {
        DevelopersConfig {
            ids: vec![UserId(1)],
            debug_channel: None,
        }
    }

    fn actor(id: u64, permissions: Permissions) -> Actor {
        Actor::new(id, permissions)
    }

    #[test]
    fn test_allow_without_restrictions() {
        assert_eq!(evaluate(&base(), None, false, &devs()), GuardDecision::Allow);
    }

    #[test]
    fn test_disabled_wins_over_everything() {
        let mut b = base();
        b.disabled = true;
        b.dev_only = true;
        b.guild_only = true;
        b.permissions = Permissions::ADMINISTRATOR;
        let dev = actor(1, Permissions::all());
        assert_eq!(
            evaluate(&b, Some(&dev), true, &devs()),
            GuardDecision::Deny(GuardReason::Disabled)
        );
    }

    #[test]
    fn test_dev_only() {
        let mut b = base();
        b.dev_only = true;
        assert_eq!(
            evaluate(&b, Some(&actor(2, Permissions::all())), true, &devs()),
            GuardDecision::Deny(GuardReason::DevOnly)
        );
        assert_eq!(
            evaluate(&b, None, true, &devs()),
            GuardDecision::Deny(GuardReason::DevOnly)
        );
        assert!(evaluate(&b, Some(&actor(1, Permissions::empty())), false, &devs()).is_allowed());
    }

    #[test]
    fn test_dev_only_checked_before_guild_only() {
        let mut b = base();
        b.dev_only = true;
        b.guild_only = true;
        assert_eq!(
            evaluate(&b, Some(&actor(2, Permissions::empty())), false, &devs()),
            GuardDecision::Deny(GuardReason::DevOnly)
        );
    }

    #[test]
    fn test_guild_only() {
        let mut b = base();
        b.guild_only = true;
        let user = actor(2, Permissions::empty());
        assert_eq!(
            evaluate(&b, Some(&user), false, &devs()),
            GuardDecision::Deny(GuardReason::GuildOnly)
        );
        assert!(evaluate(&b, Some(&user), true, &devs()).is_allowed());
    }

    #[test]
    fn test_permissions_superset() {
        let mut b = base();
        b.permissions = Permissions::MANAGE_MESSAGES;

        let without = actor(2, Permissions::SEND_MESSAGES);
        assert_eq!(
            evaluate(&b, Some(&without), true, &devs()),
            GuardDecision::Deny(GuardReason::InsufficientPermissions)
        );

        let exact = actor(2, Permissions::MANAGE_MESSAGES);
        assert!(evaluate(&b, Some(&exact), true, &devs()).is_allowed());

        let superset = actor(2, Permissions::MANAGE_MESSAGES | Permissions::BAN_MEMBERS);
        assert!(evaluate(&b, Some(&superset), true, &devs()).is_allowed());

        assert_eq!(
            evaluate(&b, None, true, &devs()),
            GuardDecision::Deny(GuardReason::InsufficientPermissions)
        );
    }

    #[test]
    fn test_partial_permissions_denied() {
        let mut b = base();
        b.permissions = Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS;
        let partial = actor(2, Permissions::KICK_MEMBERS);
        assert_eq!(
            evaluate(&b, Some(&partial), true, &devs()),
            GuardDecision::Deny(GuardReason::InsufficientPermissions)
        );
    }

    #[test]
    fn test_public_message_hides_dev_only() {
        assert_eq!(
            GuardReason::DevOnly.public_message(),
            GuardReason::InsufficientPermissions.public_message()
        );
        assert_eq!(GuardReason::GuildOnly.to_string(), "guild_only");
    }
}
