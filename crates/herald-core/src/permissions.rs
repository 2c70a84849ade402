//! Capability flags carried by actors and required by actions.

use std::fmt;

bitflags::bitflags! {
    /// A set of chat-platform capabilities.
    ///
    /// Descriptors declare the set they require; the guard allows an actor
    /// only when the actor's set is a superset of it.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u64 {
        const CREATE_INVITE = 1 << 0;
        const KICK_MEMBERS = 1 << 1;
        const BAN_MEMBERS = 1 << 2;
        const ADMINISTRATOR = 1 << 3;
        const MANAGE_CHANNELS = 1 << 4;
        const MANAGE_GUILD = 1 << 5;
        const ADD_REACTIONS = 1 << 6;
        const VIEW_AUDIT_LOG = 1 << 7;
        const VIEW_CHANNEL = 1 << 10;
        const SEND_MESSAGES = 1 << 11;
        const MANAGE_MESSAGES = 1 << 13;
        const EMBED_LINKS = 1 << 14;
        const ATTACH_FILES = 1 << 15;
        const READ_MESSAGE_HISTORY = 1 << 16;
        const MENTION_EVERYONE = 1 << 17;
        const MANAGE_NICKNAMES = 1 << 27;
        const MANAGE_ROLES = 1 << 28;
        const MANAGE_WEBHOOKS = 1 << 29;
        const MANAGE_THREADS = 1 << 34;
        const MODERATE_MEMBERS = 1 << 40;
    }
}

impl Permissions {
    /// Parse a list of flag names such as `["MANAGE_MESSAGES", "KICK_MEMBERS"]`.
    ///
    /// Names are matched case-insensitively. The first unknown name is returned
    /// as the error.
    pub fn from_names<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Permissions::empty();
        for name in names {
            let name = name.as_ref();
            let flag = Permissions::from_name(&name.trim().to_ascii_uppercase())
                .ok_or_else(|| name.to_string())?;
            set |= flag;
        }
        Ok(set)
    }

    /// Flag names contained in this set, in bit order.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        write!(f, "{}", self.names().join(" | "))
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
