//! Herald application binary - composition root.
//!
//! 1. Load configuration from TOML, apply CLI overrides, then start tracing
//! 2. Load the action tree and bind it to the compiled-in handlers
//! 3. Publish the command catalog to the chat platform
//! 4. Fire the `ready` lifecycle event
//! 5. Serve the HTTP surface until Ctrl-C, reloading actions on SIGHUP

mod cli;

use std::sync::Arc;

use clap::Parser;

use herald_action::{
    AuditSink, ChannelDebugSink, ChatPlatform, DebugSink, Dispatcher, HandlerCatalog,
    LifecycleEvent, LoadSummary, Loader, LoggingPlatform, Services, SharedRegistry,
    TracingAuditSink, TracingDebugSink,
};
use herald_api::ApiState;

use cli::CliArgs;

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn log_summary(summary: &LoadSummary) {
    for (kind, count) in &summary.counts {
        tracing::info!(%kind, count, "Actions registered");
    }
    for warning in &summary.warnings {
        tracing::warn!(%warning, "Action load warning");
    }
}

/// Push the current command catalog to the platform.
async fn publish_commands(registry: &SharedRegistry, platform: &dyn ChatPlatform) {
    let specs = registry.snapshot().command_specs();
    match platform.register_commands(&specs).await {
        Ok(()) => tracing::info!(count = specs.len(), "Command catalog published"),
        Err(e) => tracing::warn!(error = %e, "Failed to publish command catalog"),
    }
}

/// Rebuild the registry whenever the process receives SIGHUP.
#[cfg(unix)]
async fn reload_on_hangup(
    registry: Arc<SharedRegistry>,
    platform: Arc<dyn ChatPlatform>,
    audit: Arc<dyn AuditSink>,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "SIGHUP handler unavailable; reload disabled");
            return;
        }
    };

    while hangups.recv().await.is_some() {
        tracing::info!("SIGHUP received, reloading actions");
        match registry.reload(audit.as_ref()) {
            Ok(summary) => {
                log_summary(&summary);
                publish_commands(&registry, platform.as_ref()).await;
            }
            Err(e) => tracing::error!(error = %e, "Reload failed; keeping previous actions"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let (config, source) = args.load_config();

    init_tracing(&config.general.log_level);
    tracing::info!("Starting Herald v{}", env!("CARGO_PKG_VERSION"));
    source.report();

    // === Actions ===

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let loader =
        Loader::new(&config.actions.root).with_exceptions(config.actions.exceptions.iter().cloned());
    tracing::info!(root = %loader.root().display(), "Loading actions");

    let (registry, summary) =
        match SharedRegistry::load(loader, HandlerCatalog::with_builtins(), audit.as_ref()) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(error = %e, path = %e.path().display(), "Failed to load actions");
                return Err(e.into());
            }
        };
    log_summary(&summary);

    if args.check {
        println!("Action tree at {} is valid.", config.actions.root.display());
        for (kind, count) in &summary.counts {
            println!("  {:<12} {}", kind.to_string(), count);
        }
        for warning in &summary.warnings {
            println!("  warning: {}", warning);
        }
        return Ok(());
    }

    let registry = Arc::new(registry);
    let config = Arc::new(config);

    // === Dispatch ===

    let platform: Arc<dyn ChatPlatform> = Arc::new(LoggingPlatform);
    publish_commands(&registry, platform.as_ref()).await;

    let debug_sink: Arc<dyn DebugSink> = match config.developers.debug_channel {
        Some(channel) => {
            tracing::info!(%channel, "Debug reports go to the developer channel");
            Arc::new(ChannelDebugSink::new(Arc::clone(&platform), channel))
        }
        None => Arc::new(TracingDebugSink),
    };

    let services = Services::new(Arc::clone(&config), Arc::clone(&platform));
    let dispatcher = Arc::new(
        Dispatcher::new(Arc::clone(&registry), services, Arc::clone(&audit))
            .with_debug_sink(debug_sink),
    );

    dispatcher
        .dispatch_lifecycle(LifecycleEvent::new("ready"))
        .await;

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(
        Arc::clone(&registry),
        Arc::clone(&platform),
        Arc::clone(&audit),
    ));

    // === API server ===

    let state = ApiState::new(dispatcher);
    herald_api::start_server(&config.api, state, shutdown_signal()).await?;

    tracing::info!("Herald stopped");
    Ok(())
}
