//! Handler traits and the catalog of compiled-in handlers.
//!
//! Descriptors refer to handlers by name. At startup every handler is
//! registered in a [`HandlerCatalog`] under that name, and the registry
//! resolves each descriptor's `handler` field against it.

pub mod dismiss;
pub mod health;
pub mod ping;
pub mod ready;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::debug::DebugStream;
use crate::descriptor::ActionKind;
use crate::error::ActionError;
use crate::event::{
    AutocompleteInteraction, CommandInteraction, ComponentInteraction, FocusedOption,
    LifecycleEvent, ModalSubmit, ReactionEvent, RouteExchange,
};
use crate::platform::Choice;

/// The imperative half of an action.
#[async_trait]
pub trait ActionHandler<E>: Send + Sync + 'static
where
    E: Send + Sync + 'static,
{
    /// Run the action. `debug` is present only when the descriptor opted in.
    async fn handle(
        &self,
        ctx: &InvocationContext<E>,
        debug: Option<&DebugStream>,
    ) -> Result<(), ActionError>;
}

/// Chat command handlers, which may also suggest option values.
#[async_trait]
pub trait CommandHandler: ActionHandler<CommandInteraction> {
    /// Suggest values for the focused option. Shares the command's debug
    /// opt-in.
    async fn autocomplete(
        &self,
        _ctx: &InvocationContext<AutocompleteInteraction>,
        _focused: &FocusedOption,
        _debug: Option<&DebugStream>,
    ) -> Result<Vec<Choice>, ActionError> {
        Ok(Vec::new())
    }
}

pub type ComponentHandler = dyn ActionHandler<ComponentInteraction>;
pub type ModalHandler = dyn ActionHandler<ModalSubmit>;
pub type ReactionHandler = dyn ActionHandler<ReactionEvent>;
pub type RouteHandler = dyn ActionHandler<RouteExchange>;
pub type EventHandler = dyn ActionHandler<LifecycleEvent>;

/// Named handlers, one namespace per kind.
#[derive(Default, Clone)]
pub struct HandlerCatalog {
    pub(crate) commands: HashMap<String, Arc<dyn CommandHandler>>,
    pub(crate) buttons: HashMap<String, Arc<ComponentHandler>>,
    pub(crate) modals: HashMap<String, Arc<ModalHandler>>,
    pub(crate) menus: HashMap<String, Arc<ComponentHandler>>,
    pub(crate) reactions: HashMap<String, Arc<ReactionHandler>>,
    pub(crate) routes: HashMap<String, Arc<RouteHandler>>,
    pub(crate) events: HashMap<String, Arc<EventHandler>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the handlers shipped with Herald.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register_builtins();
        catalog
    }

    pub fn register_builtins(&mut self) {
        self.command("ping", ping::PingCommand)
            .button("dismiss", dismiss::DismissButton)
            .route("health", health::HealthRoute)
            .event("ready", ready::ReadyAnnouncer);
    }

    pub fn command(&mut self, name: &str, handler: impl CommandHandler) -> &mut Self {
        self.commands.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn button(
        &mut self,
        name: &str,
        handler: impl ActionHandler<ComponentInteraction>,
    ) -> &mut Self {
        self.buttons.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn modal(&mut self, name: &str, handler: impl ActionHandler<ModalSubmit>) -> &mut Self {
        self.modals.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn menu(
        &mut self,
        name: &str,
        handler: impl ActionHandler<ComponentInteraction>,
    ) -> &mut Self {
        self.menus.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn reaction(
        &mut self,
        name: &str,
        handler: impl ActionHandler<ReactionEvent>,
    ) -> &mut Self {
        self.reactions.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn route(&mut self, name: &str, handler: impl ActionHandler<RouteExchange>) -> &mut Self {
        self.routes.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn event(&mut self, name: &str, handler: impl ActionHandler<LifecycleEvent>) -> &mut Self {
        self.events.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn contains(&self, kind: ActionKind, name: &str) -> bool {
        match kind {
            ActionKind::Command => self.commands.contains_key(name),
            ActionKind::Button => self.buttons.contains_key(name),
            ActionKind::Modal => self.modals.contains_key(name),
            ActionKind::StringMenu => self.menus.contains_key(name),
            ActionKind::Reaction => self.reactions.contains_key(name),
            ActionKind::Route => self.routes.contains_key(name),
            ActionKind::Event => self.events.contains_key(name),
        }
    }
}
