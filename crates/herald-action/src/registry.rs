//! In-memory action registry.
//!
//! A [`Registry`] is built once from loaded descriptors and the handler
//! catalog and never mutated afterwards. [`SharedRegistry`] publishes the
//! current registry to dispatchers and swaps in a complete replacement on
//! reload, so readers see either the old or the new registry, never a mix.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::audit::{AuditRecord, AuditSink};
use crate::descriptor::{normalize_path, ActionKind, Descriptor, Payload};
use crate::error::LoadError;
use crate::handler::{
    CommandHandler, ComponentHandler, EventHandler, HandlerCatalog, ModalHandler,
    ReactionHandler, RouteHandler,
};
use crate::loader::{LoadReport, LoadWarning, Loader};
use crate::platform::CommandSpec;

/// A descriptor bound to its handler.
pub struct Action<H: ?Sized> {
    pub descriptor: Descriptor,
    pub handler: Arc<H>,
}

impl<H: ?Sized> Action<H> {
    pub fn id(&self) -> String {
        self.descriptor.id()
    }

    pub fn kind(&self) -> ActionKind {
        self.descriptor.kind()
    }
}

type Index<H> = HashMap<String, Arc<Action<H>>>;

/// A resolved route and the part of the request path below it.
pub struct RouteMatch {
    pub action: Arc<Action<RouteHandler>>,
    pub sub_path: String,
}

#[derive(Default)]
pub struct Registry {
    commands: Index<dyn CommandHandler>,
    buttons: Index<ComponentHandler>,
    modals: Index<ModalHandler>,
    menus: Index<ComponentHandler>,
    reactions: Index<ReactionHandler>,
    routes: Index<RouteHandler>,
    /// `follow_folders` routes, longest path first.
    prefix_routes: Vec<Arc<Action<RouteHandler>>>,
    /// Handlers per lifecycle event name, in firing order.
    events: HashMap<String, Vec<Arc<Action<EventHandler>>>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every kind from disk and bind the descriptors to `catalog`.
    pub fn load(
        loader: &Loader,
        catalog: &HandlerCatalog,
    ) -> Result<(Self, Vec<LoadWarning>), LoadError> {
        Self::build(loader.load_all()?, catalog)
    }

    /// Bind loaded descriptors to their handlers.
    ///
    /// Unknown handler names and duplicate identifiers are load errors under
    /// the same mandatory/optional policy as parse failures.
    pub fn build(
        report: LoadReport,
        catalog: &HandlerCatalog,
    ) -> Result<(Self, Vec<LoadWarning>), LoadError> {
        let mut registry = Registry::default();
        let mut seen: HashMap<(ActionKind, String), PathBuf> = HashMap::new();
        let mut policy = LoadReport {
            descriptors: Vec::new(),
            warnings: report.warnings,
        };

        for descriptor in report.descriptors {
            let kind = descriptor.kind();
            let id = descriptor.id();

            if let Some(first) = seen.get(&(kind, id.clone())) {
                let err = LoadError::Duplicate {
                    kind,
                    id,
                    first: first.clone(),
                    second: descriptor.base.source.clone(),
                };
                policy.reject(kind, err)?;
                continue;
            }
            let source = descriptor.base.source.clone();

            if let Err(err) = registry.insert(descriptor, id.clone(), catalog) {
                policy.reject(kind, err)?;
                continue;
            }
            seen.insert((kind, id), source);
        }

        registry
            .prefix_routes
            .sort_by_key(|a| std::cmp::Reverse(route_path(&a.descriptor).len()));
        for handlers in registry.events.values_mut() {
            handlers.sort_by_key(|a| event_order(&a.descriptor));
        }

        Ok((registry, policy.warnings))
    }

    fn insert(
        &mut self,
        descriptor: Descriptor,
        id: String,
        catalog: &HandlerCatalog,
    ) -> Result<(), LoadError> {
        match &descriptor.payload {
            Payload::Command(_) => {
                let action = bind(&catalog.commands, descriptor)?;
                self.commands.insert(id, action);
            }
            Payload::Button { .. } => {
                let action = bind(&catalog.buttons, descriptor)?;
                self.buttons.insert(id, action);
            }
            Payload::Modal { .. } => {
                let action = bind(&catalog.modals, descriptor)?;
                self.modals.insert(id, action);
            }
            Payload::StringMenu { .. } => {
                let action = bind(&catalog.menus, descriptor)?;
                self.menus.insert(id, action);
            }
            Payload::Reaction { .. } => {
                let action = bind(&catalog.reactions, descriptor)?;
                self.reactions.insert(id, action);
            }
            Payload::Route(route) => {
                let follow = route.follow_folders;
                let action = bind(&catalog.routes, descriptor)?;
                if follow {
                    self.prefix_routes.push(Arc::clone(&action));
                }
                self.routes.insert(id, action);
            }
            Payload::Event(event) => {
                let name = event.event.clone();
                let action = bind(&catalog.events, descriptor)?;
                self.events.entry(name).or_default().push(action);
            }
        }
        Ok(())
    }

    pub fn command(&self, name: &str) -> Option<Arc<Action<dyn CommandHandler>>> {
        self.commands.get(name).cloned()
    }

    pub fn button(&self, custom_id: &str) -> Option<Arc<Action<ComponentHandler>>> {
        self.buttons.get(custom_id).cloned()
    }

    pub fn modal(&self, custom_id: &str) -> Option<Arc<Action<ModalHandler>>> {
        self.modals.get(custom_id).cloned()
    }

    pub fn menu(&self, custom_id: &str) -> Option<Arc<Action<ComponentHandler>>> {
        self.menus.get(custom_id).cloned()
    }

    pub fn reaction(&self, emoji: &str) -> Option<Arc<Action<ReactionHandler>>> {
        self.reactions.get(emoji).cloned()
    }

    /// Resolve `method` + `path`, where `path` is relative to the API mount.
    ///
    /// An exact route wins. Otherwise the longest `follow_folders` route
    /// whose path is a segment-wise prefix of `path` matches.
    pub fn route(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let method = method.to_ascii_uppercase();
        let path = normalize_path(path);

        if let Some(action) = self.routes.get(&format!("{} {}", method, path)) {
            return Some(RouteMatch {
                action: Arc::clone(action),
                sub_path: String::new(),
            });
        }

        self.prefix_routes.iter().find_map(|action| {
            let Payload::Route(route) = &action.descriptor.payload else {
                return None;
            };
            if route.method != method {
                return None;
            }
            let rest = if route.path == "/" {
                Some(&path[1..])
            } else {
                path.strip_prefix(route.path.as_str())
                    .and_then(|r| r.strip_prefix('/'))
            }?;
            Some(RouteMatch {
                action: Arc::clone(action),
                sub_path: rest.to_string(),
            })
        })
    }

    /// Handlers for a lifecycle event, in firing order.
    pub fn events(&self, name: &str) -> &[Arc<Action<EventHandler>>] {
        self.events.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up any descriptor by kind and identifier.
    pub fn descriptor(&self, kind: ActionKind, id: &str) -> Option<&Descriptor> {
        match kind {
            ActionKind::Command => self.commands.get(id).map(|a| &a.descriptor),
            ActionKind::Button => self.buttons.get(id).map(|a| &a.descriptor),
            ActionKind::Modal => self.modals.get(id).map(|a| &a.descriptor),
            ActionKind::StringMenu => self.menus.get(id).map(|a| &a.descriptor),
            ActionKind::Reaction => self.reactions.get(id).map(|a| &a.descriptor),
            ActionKind::Route => self.routes.get(id).map(|a| &a.descriptor),
            ActionKind::Event => self
                .events
                .values()
                .flatten()
                .find(|a| a.id() == id)
                .map(|a| &a.descriptor),
        }
    }

    pub fn len(&self, kind: ActionKind) -> usize {
        match kind {
            ActionKind::Command => self.commands.len(),
            ActionKind::Button => self.buttons.len(),
            ActionKind::Modal => self.modals.len(),
            ActionKind::StringMenu => self.menus.len(),
            ActionKind::Reaction => self.reactions.len(),
            ActionKind::Route => self.routes.len(),
            ActionKind::Event => self.events.values().map(Vec::len).sum(),
        }
    }

    pub fn counts(&self) -> BTreeMap<ActionKind, usize> {
        ActionKind::ALL.iter().map(|&k| (k, self.len(k))).collect()
    }

    /// The command catalog to publish to the platform, sorted by name.
    pub fn command_specs(&self) -> Vec<CommandSpec> {
        let mut specs: Vec<CommandSpec> = self
            .commands
            .values()
            .filter_map(|action| match &action.descriptor.payload {
                Payload::Command(cmd) => Some(CommandSpec {
                    name: cmd.name.clone(),
                    description: action.descriptor.base.description.clone(),
                    options: cmd.options.clone(),
                    guild_only: action.descriptor.base.guild_only,
                }),
                _ => None,
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}

fn bind<H: ?Sized>(
    handlers: &HashMap<String, Arc<H>>,
    descriptor: Descriptor,
) -> Result<Arc<Action<H>>, LoadError> {
    match handlers.get(&descriptor.base.handler) {
        Some(handler) => Ok(Arc::new(Action {
            handler: Arc::clone(handler),
            descriptor,
        })),
        None => Err(LoadError::UnknownHandler {
            path: descriptor.base.source.clone(),
            handler: descriptor.base.handler.clone(),
        }),
    }
}

fn route_path(descriptor: &Descriptor) -> &str {
    match &descriptor.payload {
        Payload::Route(route) => &route.path,
        _ => "",
    }
}

fn event_order(descriptor: &Descriptor) -> u32 {
    match &descriptor.payload {
        Payload::Event(event) => event.order,
        _ => 0,
    }
}

/// Strip the API mount prefix from a request path.
///
/// Returns `None` when the path lies outside the mount.
pub fn strip_mount(mount: &str, path: &str) -> Option<String> {
    let mount = normalize_path(mount);
    let path = normalize_path(path);
    if mount == "/" {
        return Some(path);
    }
    match path.strip_prefix(mount.as_str()) {
        Some("") => Some("/".to_string()),
        Some(rest) if rest.starts_with('/') => Some(rest.to_string()),
        _ => None,
    }
}

/// Summary of one successful (re)load.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub counts: BTreeMap<ActionKind, usize>,
    pub warnings: Vec<LoadWarning>,
}

/// The registry as seen by dispatchers, swappable as a whole.
pub struct SharedRegistry {
    current: ArcSwap<Registry>,
    loader: Loader,
    catalog: HandlerCatalog,
}

impl SharedRegistry {
    /// Load the initial registry. Warnings go to `audit`.
    pub fn load(
        loader: Loader,
        catalog: HandlerCatalog,
        audit: &dyn AuditSink,
    ) -> Result<(Self, LoadSummary), LoadError> {
        let (registry, summary) = Self::load_registry(&loader, &catalog, audit)?;
        let shared = Self {
            current: ArcSwap::from_pointee(registry),
            loader,
            catalog,
        };
        Ok((shared, summary))
    }

    /// Wrap an already built registry. [`SharedRegistry::reload`] reads from
    /// `loader`.
    pub fn from_registry(registry: Registry, loader: Loader, catalog: HandlerCatalog) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
            loader,
            catalog,
        }
    }

    /// The current registry. Holding the snapshot keeps it alive across a
    /// concurrent reload.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Rebuild from disk and swap the result in. On failure the current
    /// registry stays in place.
    pub fn reload(&self, audit: &dyn AuditSink) -> Result<LoadSummary, LoadError> {
        let (registry, summary) = Self::load_registry(&self.loader, &self.catalog, audit)?;
        self.current.store(Arc::new(registry));
        tracing::info!(counts = ?summary.counts, "Action registry reloaded");
        Ok(summary)
    }

    fn load_registry(
        loader: &Loader,
        catalog: &HandlerCatalog,
        audit: &dyn AuditSink,
    ) -> Result<(Registry, LoadSummary), LoadError> {
        let (registry, warnings) = Registry::load(loader, catalog)?;
        for warning in &warnings {
            audit.record(AuditRecord::LoadWarning(warning.clone()));
        }
        let summary = LoadSummary {
            counts: registry.counts(),
            warnings,
        };
        Ok((registry, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::handler::{dismiss::DismissButton, health::HealthRoute, ready::ReadyAnnouncer};
    use crate::context::InvocationContext;
    use crate::debug::DebugStream;
    use crate::error::ActionError;
    use crate::event::ReactionEvent;
    use crate::handler::ActionHandler;
    use async_trait::async_trait;
    use std::path::Path;

    struct NoopReaction;

    #[async_trait]
    impl ActionHandler<ReactionEvent> for NoopReaction {
        async fn handle(
            &self,
            _ctx: &InvocationContext<ReactionEvent>,
            _debug: Option<&DebugStream>,
        ) -> Result<(), ActionError> {
            Ok(())
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn catalog() -> HandlerCatalog {
        let mut catalog = HandlerCatalog::with_builtins();
        catalog
            .button("close", DismissButton)
            .route("echo", HealthRoute)
            .event("log", ReadyAnnouncer);
        catalog
    }

    #[test]
    fn test_round_trip_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "commands/general/ping.toml", "name = \"ping\"\nhandler = \"ping\"");
        write(dir.path(), "buttons/ui/close.toml", "custom_id = \"close\"\nhandler = \"close\"");
        write(dir.path(), "reactions/fun/star.toml", "emoji = \"⭐\"\nhandler = \"x\"");

        let mut cat = catalog();
        cat.reaction("x", NoopReaction);
        let (registry, warnings) = Registry::load(&Loader::new(dir.path()), &cat).unwrap();

        let report = Loader::new(dir.path()).load_all().unwrap();
        for descriptor in &report.descriptors {
            let found = registry
                .descriptor(descriptor.kind(), &descriptor.id())
                .expect("descriptor registered");
            assert_eq!(found.base.source, descriptor.base.source);
            assert_eq!(found.payload, descriptor.payload);
        }
        assert!(registry.command("ping").is_some());
        assert!(registry.button("close").is_some());
        assert!(registry.reaction("⭐").is_some());
        assert!(registry.button("Close").is_none());
        // modals, menus, routes, events missing
        assert_eq!(warnings.len(), 4);
    }

    #[test]
    fn test_duplicate_optional_kind_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "buttons/a/close.toml", "custom_id = \"close\"\nhandler = \"close\"");
        write(dir.path(), "buttons/b/close.toml", "custom_id = \"close\"\nhandler = \"dismiss\"");

        let report = Loader::new(dir.path()).load_kind(ActionKind::Button).unwrap();
        let (registry, warnings) = Registry::build(report, &catalog()).unwrap();
        assert_eq!(registry.len(ActionKind::Button), 1);
        assert_eq!(
            registry.button("close").unwrap().descriptor.base.handler,
            "close"
        );
        assert!(matches!(
            &warnings[0],
            LoadWarning::Skipped { reason, .. } if reason.contains("Duplicate button `close`")
        ));
    }

    #[test]
    fn test_duplicate_command_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "commands/a/ping.toml", "name = \"ping\"\nhandler = \"ping\"");
        write(dir.path(), "commands/b/ping.toml", "name = \"ping\"\nhandler = \"ping\"");

        let report = Loader::new(dir.path()).load_kind(ActionKind::Command).unwrap();
        let err = Registry::build(report, &catalog()).err().unwrap();
        assert!(matches!(err, LoadError::Duplicate { kind: ActionKind::Command, .. }));
    }

    #[test]
    fn test_unknown_handler_policy() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "buttons/ui/open.toml", "custom_id = \"open\"\nhandler = \"nope\"");
        let report = Loader::new(dir.path()).load_kind(ActionKind::Button).unwrap();
        let (registry, warnings) = Registry::build(report, &catalog()).unwrap();
        assert_eq!(registry.len(ActionKind::Button), 0);
        assert_eq!(warnings.len(), 1);

        write(dir.path(), "commands/x/x.toml", "name = \"x\"\nhandler = \"nope\"");
        let report = Loader::new(dir.path()).load_kind(ActionKind::Command).unwrap();
        let err = Registry::build(report, &catalog()).err().unwrap();
        assert!(matches!(err, LoadError::UnknownHandler { .. }));
    }

    #[test]
    fn test_route_resolution() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "routes/s/ping.toml", "path = \"/ping\"\nhandler = \"health\"");
        write(
            dir.path(),
            "routes/s/files.toml",
            "path = \"/files\"\nfollow_folders = true\nhandler = \"echo\"",
        );
        write(
            dir.path(),
            "routes/s/files_deep.toml",
            "path = \"/files/deep\"\nfollow_folders = true\nhandler = \"health\"",
        );
        write(
            dir.path(),
            "routes/s/submit.toml",
            "path = \"/ping\"\nmethod = \"POST\"\nhandler = \"echo\"",
        );

        let report = Loader::new(dir.path()).load_kind(ActionKind::Route).unwrap();
        let (registry, _) = Registry::build(report, &catalog()).unwrap();

        let m = registry.route("get", "/ping").unwrap();
        assert_eq!(m.action.id(), "GET /ping");
        assert_eq!(m.sub_path, "");
        assert_eq!(registry.route("POST", "/ping").unwrap().action.id(), "POST /ping");
        assert!(registry.route("GET", "/ping/sub").is_none());
        assert!(registry.route("DELETE", "/ping").is_none());

        let m = registry.route("GET", "/files/a/b.txt").unwrap();
        assert_eq!(m.action.id(), "GET /files");
        assert_eq!(m.sub_path, "a/b.txt");

        let m = registry.route("GET", "/files/deep/x").unwrap();
        assert_eq!(m.action.id(), "GET /files/deep");
        assert_eq!(m.sub_path, "x");

        assert_eq!(registry.route("GET", "/files").unwrap().sub_path, "");
        assert!(registry.route("GET", "/filesystem").is_none());
    }

    #[test]
    fn test_events_fire_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "events/ready/b.toml", "event = \"ready\"\norder = 20\nhandler = \"log\"");
        write(dir.path(), "events/ready/a.toml", "event = \"ready\"\norder = 10\nhandler = \"log\"");
        write(dir.path(), "events/ready/c.toml", "event = \"ready\"\nhandler = \"ready\"");

        let report = Loader::new(dir.path()).load_kind(ActionKind::Event).unwrap();
        let (registry, _) = Registry::build(report, &catalog()).unwrap();
        let ids: Vec<String> = registry.events("ready").iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["ready#0", "ready#10", "ready#20"]);

        assert!(registry.events("guild_member_add").is_empty());
        assert_eq!(registry.len(ActionKind::Event), 3);
    }

    #[test]
    fn test_duplicate_event_order_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "events/ready/a.toml", "event = \"ready\"\nhandler = \"log\"");
        write(dir.path(), "events/ready/b.toml", "event = \"ready\"\nhandler = \"ready\"");
        write(dir.path(), "events/ready/c.toml", "event = \"ready\"\norder = 5\nhandler = \"ready\"");

        let report = Loader::new(dir.path()).load_kind(ActionKind::Event).unwrap();
        let (registry, warnings) = Registry::build(report, &catalog()).unwrap();

        assert_eq!(registry.len(ActionKind::Event), 2);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            LoadWarning::Skipped { path, reason, .. }
                if path.ends_with("b.toml") && reason.contains("ready#0")
        ));
        let first = registry.descriptor(ActionKind::Event, "ready#0").unwrap();
        assert_eq!(first.base.source, dir.path().join("events/ready/a.toml"));
        let ids: Vec<String> = registry.events("ready").iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["ready#0", "ready#5"]);
    }

    #[test]
    fn test_strip_mount() {
        assert_eq!(strip_mount("/api", "/api/ping"), Some("/ping".to_string()));
        assert_eq!(strip_mount("/api/", "/api"), Some("/".to_string()));
        assert_eq!(strip_mount("/api", "/apix/ping"), None);
        assert_eq!(strip_mount("/api", "/health"), None);
        assert_eq!(strip_mount("/", "/ping"), Some("/ping".to_string()));
    }

    #[test]
    fn test_command_specs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "commands/g/zeta.toml", "name = \"zeta\"\nhandler = \"ping\"\ndescription = \"z\"");
        write(dir.path(), "commands/g/alpha.toml", "name = \"alpha\"\nhandler = \"ping\"\nguild_only = true");

        let (registry, _) = Registry::load(&Loader::new(dir.path()), &catalog()).unwrap();
        let specs = registry.command_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "alpha");
        assert!(specs[0].guild_only);
        assert_eq!(specs[1].description, "z");
    }

    #[test]
    fn test_shared_registry_reload_swaps_and_keeps_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "commands/g/ping.toml", "name = \"ping\"\nhandler = \"ping\"");

        let audit = MemoryAuditSink::new();
        let (shared, summary) =
            SharedRegistry::load(Loader::new(dir.path()), catalog(), &audit).unwrap();
        assert_eq!(summary.counts[&ActionKind::Command], 1);
        assert_eq!(audit.records().len(), summary.warnings.len());

        let before = shared.snapshot();

        write(dir.path(), "buttons/ui/close.toml", "custom_id = \"close\"\nhandler = \"close\"");
        shared.reload(&audit).unwrap();
        assert!(shared.snapshot().button("close").is_some());
        // an old snapshot is unaffected by the swap
        assert!(before.button("close").is_none());

        write(dir.path(), "commands/g/broken.toml", "handler = \"ping\"");
        assert!(shared.reload(&audit).is_err());
        assert!(shared.snapshot().button("close").is_some());
    }
}
