//! Action discovery and dispatch for Herald.
//!
//! Loads action descriptors from a per-kind directory tree, binds them to
//! compiled-in handlers, and dispatches inbound chat and HTTP events to
//! exactly one action behind a uniform set of guards.

pub mod audit;
pub mod context;
pub mod debug;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod guard;
pub mod handler;
pub mod loader;
pub mod platform;
pub mod registry;
pub mod scanner;

pub use audit::{AuditRecord, AuditSink, MemoryAuditSink, TimedRecord, TracingAuditSink};
pub use context::{InvocationContext, Services};
pub use debug::{
    ChannelDebugSink, DebugLog, DebugOutcome, DebugReport, DebugSink, DebugStream,
    MemoryDebugSink, TracingDebugSink,
};
pub use descriptor::{ActionKind, CommandOption, Descriptor, DescriptorBase, OptionType, Payload};
pub use dispatch::{DispatchOutcome, Dispatcher, GENERIC_FAILURE};
pub use error::{ActionError, LoadError, PlatformError};
pub use event::{
    AutocompleteInteraction, CommandInteraction, ComponentInteraction, ErrorBody, FocusedOption,
    InboundEvent, Interaction, LifecycleEvent, ModalSubmit, OptionValue, ReactionEvent,
    ReplyTarget, RouteExchange, RouteRequest, RouteResponse,
};
pub use guard::{GuardDecision, GuardReason};
pub use handler::{ActionHandler, CommandHandler, HandlerCatalog};
pub use loader::{LoadReport, LoadWarning, Loader};
pub use platform::{
    ChatPlatform, Choice, CommandSpec, LoggingPlatform, OutgoingMessage, PlatformCall,
    RecordingPlatform,
};
pub use registry::{strip_mount, Action, LoadSummary, Registry, RouteMatch, SharedRegistry};
