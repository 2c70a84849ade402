//! Event dispatch.
//!
//! Every inbound event takes the same path: resolve exactly one action in
//! the current registry snapshot, evaluate its guards, then run its handler
//! as its own task. A handler error, panic or timeout is contained at the
//! task boundary, recorded once in the audit sink, and answered with a
//! generic failure appropriate to the event kind.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;

use crate::audit::{AuditRecord, AuditSink};
use crate::context::{InvocationContext, Services};
use crate::debug::{elapsed_ms, DebugOutcome, DebugSink, DebugStream, TracingDebugSink};
use crate::descriptor::ActionKind;
use crate::error::{ActionError, PlatformError};
use crate::event::{
    AutocompleteInteraction, CommandInteraction, ComponentInteraction, InboundEvent,
    Interaction, LifecycleEvent, ModalSubmit, ReactionEvent, RouteExchange, RouteRequest,
    RouteResponse,
};
use crate::guard::{self, GuardDecision, GuardReason};
use crate::handler::ActionHandler;
use crate::platform::{Choice, OutgoingMessage};
use crate::registry::{strip_mount, Action, SharedRegistry};

/// Shown to the actor when a handler fails. Details stay in the audit trail.
pub const GENERIC_FAILURE: &str = "Something went wrong while running this action.";

/// How one dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Denied(GuardReason),
    /// The handler failed; carries the error summary.
    Failed(String),
    /// No action matched the event.
    Missed,
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchOutcome::Completed)
    }
}

enum Settled {
    Denied(GuardReason),
    Succeeded,
    Failed(ActionError),
}

pub struct Dispatcher {
    registry: Arc<SharedRegistry>,
    services: Services,
    audit: Arc<dyn AuditSink>,
    debug_sink: Arc<dyn DebugSink>,
    mount: String,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// Mount prefix and handler timeout are read from the services' config.
    pub fn new(registry: Arc<SharedRegistry>, services: Services, audit: Arc<dyn AuditSink>) -> Self {
        let mount = services.config.api.mount.clone();
        let timeout = services
            .config
            .actions
            .handler_timeout_secs
            .map(Duration::from_secs);
        Self {
            registry,
            services,
            audit,
            debug_sink: Arc::new(TracingDebugSink),
            mount,
            timeout,
        }
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = sink;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<SharedRegistry> {
        &self.registry
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    // -------------------------------------------------------------------------
    // Interactions
    // -------------------------------------------------------------------------

    pub async fn dispatch_command(&self, event: CommandInteraction) -> DispatchOutcome {
        let Some(action) = self.registry.snapshot().command(&event.name) else {
            return self.miss(ActionKind::Command, &event.name);
        };
        self.run_interaction(action, event).await
    }

    pub async fn dispatch_button(&self, event: ComponentInteraction) -> DispatchOutcome {
        let Some(action) = self.registry.snapshot().button(&event.custom_id) else {
            return self.miss(ActionKind::Button, &event.custom_id);
        };
        self.run_interaction(action, event).await
    }

    pub async fn dispatch_modal(&self, event: ModalSubmit) -> DispatchOutcome {
        let Some(action) = self.registry.snapshot().modal(&event.custom_id) else {
            return self.miss(ActionKind::Modal, &event.custom_id);
        };
        self.run_interaction(action, event).await
    }

    pub async fn dispatch_menu(&self, event: ComponentInteraction) -> DispatchOutcome {
        let Some(action) = self.registry.snapshot().menu(&event.custom_id) else {
            return self.miss(ActionKind::StringMenu, &event.custom_id);
        };
        self.run_interaction(action, event).await
    }

    /// Answer an autocomplete request through the owning command.
    ///
    /// Runs under the same boundary, debug stream and audit trail as every
    /// other invocation. Denials and failures answer an empty choice list.
    pub async fn dispatch_autocomplete(&self, event: AutocompleteInteraction) -> DispatchOutcome {
        let Some(action) = self.registry.snapshot().command(&event.command) else {
            return self.miss(ActionKind::Command, &event.command);
        };
        let ctx = Arc::new(self.context(event, &action));

        if let Some(reason) = self.check_guards(&action, &ctx) {
            self.send_choices(&ctx, Vec::new()).await;
            return DispatchOutcome::Denied(reason);
        }

        let debug = action.descriptor.base.debug;
        let result = self
            .invoke(&ctx, debug, move |ctx, stream| async move {
                let focused = ctx.event.focused.clone();
                action
                    .handler
                    .autocomplete(&ctx, &focused, stream.as_deref())
                    .await
            })
            .await;

        match result {
            Ok(choices) => {
                tracing::debug!(
                    correlation_id = %ctx.correlation_id,
                    action = %ctx.action_id,
                    choices = choices.len(),
                    "Autocomplete answered"
                );
                self.send_choices(&ctx, choices).await;
                DispatchOutcome::Completed
            }
            Err(err) => {
                self.send_choices(&ctx, Vec::new()).await;
                DispatchOutcome::Failed(err.to_string())
            }
        }
    }

    async fn run_interaction<E, H>(&self, action: Arc<Action<H>>, event: E) -> DispatchOutcome
    where
        E: Interaction,
        H: ActionHandler<E> + ?Sized,
    {
        let ctx = Arc::new(self.context(event, &action));
        match self.execute(action, Arc::clone(&ctx)).await {
            Settled::Succeeded => DispatchOutcome::Completed,
            Settled::Denied(reason) => {
                self.notify(&ctx, OutgoingMessage::ephemeral(reason.public_message()))
                    .await;
                DispatchOutcome::Denied(reason)
            }
            Settled::Failed(err) => {
                self.notify(&ctx, OutgoingMessage::ephemeral(GENERIC_FAILURE))
                    .await;
                DispatchOutcome::Failed(err.to_string())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Reactions, routes, lifecycle events
    // -------------------------------------------------------------------------

    /// Reactions never answer the actor; denials and failures are audit-only.
    pub async fn dispatch_reaction(&self, event: ReactionEvent) -> DispatchOutcome {
        let Some(action) = self.registry.snapshot().reaction(&event.emoji) else {
            return self.miss(ActionKind::Reaction, &event.emoji);
        };
        let ctx = Arc::new(self.context(event, &action));
        settled_outcome(self.execute(action, ctx).await)
    }

    /// Dispatch an HTTP request whose path includes the mount prefix.
    ///
    /// Misses answer 404, denials 403 and failures 500 with a generic body.
    /// A handler that completes without responding yields 204.
    pub async fn dispatch_route(&self, request: RouteRequest) -> (DispatchOutcome, RouteResponse) {
        let resolved = strip_mount(&self.mount, &request.path).and_then(|relative| {
            self.registry.snapshot().route(&request.method, &relative)
        });
        let Some(found) = resolved else {
            let id = format!("{} {}", request.method, request.path);
            return (
                self.miss(ActionKind::Route, &id),
                RouteResponse::error(404, "not_found", "No action matches this route"),
            );
        };

        let exchange = RouteExchange::new(request, found.sub_path);
        let ctx = Arc::new(self.context(exchange, &found.action));

        match self.execute(found.action, Arc::clone(&ctx)).await {
            Settled::Succeeded => {
                let response = ctx
                    .event
                    .take_response()
                    .unwrap_or_else(|| RouteResponse::empty(204));
                (DispatchOutcome::Completed, response)
            }
            Settled::Denied(reason) => (
                DispatchOutcome::Denied(reason),
                RouteResponse::error(403, "forbidden", reason.public_message()),
            ),
            Settled::Failed(err) => (
                DispatchOutcome::Failed(err.to_string()),
                RouteResponse::error(500, "internal_error", GENERIC_FAILURE),
            ),
        }
    }

    /// Fire every handler registered for a lifecycle event, one after the
    /// other in their declared order. A failing handler does not stop the
    /// ones after it.
    pub async fn dispatch_lifecycle(&self, event: LifecycleEvent) -> Vec<DispatchOutcome> {
        let snapshot = self.registry.snapshot();
        let handlers = snapshot.events(&event.name);
        if handlers.is_empty() {
            self.miss(ActionKind::Event, &event.name);
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(handlers.len());
        for action in handlers {
            let ctx = Arc::new(self.context(event.clone(), action));
            outcomes.push(settled_outcome(
                self.execute(Arc::clone(action), ctx).await,
            ));
        }
        outcomes
    }

    // -------------------------------------------------------------------------
    // Shared invocation path
    // -------------------------------------------------------------------------

    fn context<E: InboundEvent, H: ?Sized>(
        &self,
        event: E,
        action: &Arc<Action<H>>,
    ) -> InvocationContext<E> {
        InvocationContext::new(event, action.kind(), action.id(), self.services.clone())
    }

    fn miss(&self, kind: ActionKind, id: &str) -> DispatchOutcome {
        tracing::debug!(%kind, id, "No action matched");
        DispatchOutcome::Missed
    }

    fn check_guards<E: InboundEvent, H: ?Sized>(
        &self,
        action: &Arc<Action<H>>,
        ctx: &Arc<InvocationContext<E>>,
    ) -> Option<GuardReason> {
        match guard::evaluate_context(&action.descriptor.base, &**ctx) {
            GuardDecision::Allow => None,
            GuardDecision::Deny(reason) => {
                tracing::info!(
                    correlation_id = %ctx.correlation_id,
                    kind = %ctx.kind,
                    action = %ctx.action_id,
                    %reason,
                    "Action denied"
                );
                self.audit.record(AuditRecord::GuardDenied {
                    correlation_id: ctx.correlation_id,
                    kind: ctx.kind,
                    action_id: ctx.action_id.clone(),
                    actor: ctx.actor().map(|a| a.id),
                    reason,
                });
                Some(reason)
            }
        }
    }

    async fn execute<E, H>(&self, action: Arc<Action<H>>, ctx: Arc<InvocationContext<E>>) -> Settled
    where
        E: InboundEvent,
        H: ActionHandler<E> + ?Sized,
    {
        if let Some(reason) = self.check_guards(&action, &ctx) {
            return Settled::Denied(reason);
        }

        let debug = action.descriptor.base.debug;
        let result = self
            .invoke(&ctx, debug, move |ctx, stream| async move {
                action.handler.handle(&ctx, stream.as_deref()).await
            })
            .await;
        match result {
            Ok(()) => Settled::Succeeded,
            Err(err) => Settled::Failed(err),
        }
    }

    /// Run an allowed invocation: open its debug stream when asked, cross the
    /// task boundary, flush the stream, then record the outcome.
    async fn invoke<E, T, F, Fut>(
        &self,
        ctx: &Arc<InvocationContext<E>>,
        debug: bool,
        run: F,
    ) -> Result<T, ActionError>
    where
        E: InboundEvent,
        T: Send + 'static,
        F: FnOnce(Arc<InvocationContext<E>>, Option<Arc<DebugStream>>) -> Fut,
        Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        let stream = debug.then(|| {
            Arc::new(DebugStream::open(
                ctx.correlation_id,
                ctx.kind,
                ctx.action_id.clone(),
            ))
        });

        let result = self.boundary(run(Arc::clone(ctx), stream.clone())).await;

        if let Some(stream) = stream {
            let outcome = match &result {
                Ok(_) => DebugOutcome::Succeeded,
                Err(err) => DebugOutcome::Failed(err.to_string()),
            };
            self.debug_sink.flush(stream.finish(outcome)).await;
        }

        match &result {
            Ok(_) => {
                let elapsed = ctx.elapsed();
                tracing::debug!(
                    correlation_id = %ctx.correlation_id,
                    kind = %ctx.kind,
                    action = %ctx.action_id,
                    elapsed_ms = elapsed_ms(elapsed),
                    "Action completed"
                );
                self.audit.record(AuditRecord::InvocationSucceeded {
                    correlation_id: ctx.correlation_id,
                    kind: ctx.kind,
                    action_id: ctx.action_id.clone(),
                    elapsed,
                });
            }
            Err(err) => self.record_failure(ctx, err),
        }
        result
    }

    /// Run `future` as its own task, bounded by the configured timeout.
    async fn boundary<T, F>(&self, future: F) -> Result<T, ActionError>
    where
        F: Future<Output = Result<T, ActionError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut handle = tokio::spawn(future);
        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return Err(ActionError::Timeout(limit.as_secs()));
                }
            },
            None => handle.await,
        };
        joined.unwrap_or_else(|err| Err(join_failure(err)))
    }

    fn record_failure<E: InboundEvent>(&self, ctx: &Arc<InvocationContext<E>>, err: &ActionError) {
        let elapsed = ctx.elapsed();
        tracing::error!(
            correlation_id = %ctx.correlation_id,
            kind = %ctx.kind,
            action = %ctx.action_id,
            elapsed_ms = elapsed_ms(elapsed),
            error = %err,
            "Action failed"
        );
        self.audit.record(AuditRecord::InvocationFailed {
            correlation_id: ctx.correlation_id,
            kind: ctx.kind,
            action_id: ctx.action_id.clone(),
            error: err.to_string(),
            elapsed,
        });
    }

    /// Reply to an interaction, falling back to a follow-up when the
    /// handler already acknowledged it.
    async fn notify<E: Interaction>(&self, ctx: &Arc<InvocationContext<E>>, message: OutgoingMessage) {
        let result = match ctx.reply(message.clone()).await {
            Err(ActionError::Platform(PlatformError::AlreadyAcknowledged)) => {
                ctx.follow_up(message).await
            }
            other => other,
        };
        if let Err(err) = result {
            tracing::warn!(correlation_id = %ctx.correlation_id, error = %err, "Failed to notify actor");
        }
    }

    async fn send_choices(&self, ctx: &InvocationContext<AutocompleteInteraction>, choices: Vec<Choice>) {
        if let Err(err) = ctx.platform().autocomplete(ctx.event.target(), choices).await {
            tracing::warn!(correlation_id = %ctx.correlation_id, error = %err, "Failed to answer autocomplete");
        }
    }
}

fn settled_outcome(settled: Settled) -> DispatchOutcome {
    match settled {
        Settled::Succeeded => DispatchOutcome::Completed,
        Settled::Denied(reason) => DispatchOutcome::Denied(reason),
        Settled::Failed(err) => DispatchOutcome::Failed(err.to_string()),
    }
}

fn join_failure(err: JoinError) -> ActionError {
    if !err.is_panic() {
        return ActionError::HandlerFailed("handler task was cancelled".to_string());
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    ActionError::Panicked(message)
}
