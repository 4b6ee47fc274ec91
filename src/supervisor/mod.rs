//! The Supervisor module manages the lifecycle of the Palisade engine.
//!
//! This module implements the **Supervisor Pattern**: a single top-level owner
//! of all long-running services (the rule registry refresh loop, the
//! evaluation pipeline, and the alert emitter) that starts them, monitors
//! their health, and orchestrates a clean shutdown.
//!
//! ## Responsibilities
//!
//! - **Initialization**: The `SupervisorBuilder` constructs and wires all
//!   services together, injecting the configuration, rule storage, and the
//!   notification transport.
//! - **Lifecycle Management**: The `Supervisor` starts all services and
//!   manages their lifetimes.
//! - **Graceful Shutdown**: It listens for shutdown signals (Ctrl+C or
//!   SIGTERM) and cancels all managed services, allowing in-flight triggers
//!   to drain before exit.
//! - **Task Supervision**: If a critical task fails (panics or aborts), the
//!   supervisor shuts down the remaining services rather than continuing in a
//!   partially-functional state.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::{signal, sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    engine::{emitter::AlertEmitter, pipeline::EvaluationPipeline},
    models::{AlertTrigger, FirewallEvent},
    registry::RuleRegistry,
    storage::error::StorageError,
};

/// Represents the set of errors that can occur during the supervisor's
/// construction or operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A rule store was not provided to the `SupervisorBuilder`.
    #[error("Missing rule store for Supervisor")]
    MissingRuleStore,

    /// A notification transport was not provided to the `SupervisorBuilder`.
    #[error("Missing notifier for Supervisor")]
    MissingNotifier,

    /// The initial rule load failed. The engine must not start evaluating
    /// with an empty rule set it cannot distinguish from a real one.
    #[error("Failed to initialize rule registry: {0}")]
    RegistryInitialization(#[from] StorageError),
}

/// The primary runtime manager for the engine.
///
/// The Supervisor owns all the major components and is responsible for their
/// startup, shutdown, and health monitoring. Once `run` is called, it becomes
/// the main process loop for the entire application.
pub struct Supervisor {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The in-memory cache of enabled alert rules.
    registry: Arc<RuleRegistry>,

    /// The per-event rule evaluation service.
    pipeline: EvaluationPipeline,

    /// The service applying the side effects of firing decisions.
    emitter: AlertEmitter,

    /// Sender half of the ingestion channel; cloned out to event producers.
    events_tx: mpsc::Sender<FirewallEvent>,

    /// Receiver half of the ingestion channel, consumed by the pipeline.
    events_rx: mpsc::Receiver<FirewallEvent>,

    /// Receiver half of the trigger channel, consumed by the emitter.
    triggers_rx: mpsc::Receiver<AlertTrigger>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,
}

impl Supervisor {
    /// Returns a new `SupervisorBuilder` instance.
    ///
    /// This is the public entry point for creating a supervisor.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Returns a sender for feeding firewall events into the pipeline.
    ///
    /// Event producers hold clones of this sender; the pipeline drains the
    /// channel until every clone is dropped or shutdown is requested.
    pub fn event_sender(&self) -> mpsc::Sender<FirewallEvent> {
        self.events_tx.clone()
    }

    /// Requests an out-of-band rule refresh, e.g. after a rule change.
    pub fn invalidate_rules(&self) {
        self.registry.invalidate();
    }

    /// Starts the supervisor and all its managed services.
    ///
    /// This method is the main entry point for the application's runtime. It
    /// spawns a signal handler for `SIGINT` and `SIGTERM`, then the registry
    /// refresh loop, the evaluation pipeline, and the alert emitter, and
    /// finally supervises them until shutdown.
    pub async fn run(self) -> Result<(), SupervisorError> {
        let mut join_set = JoinSet::new();

        // Spawn a task to listen for shutdown signals.
        let signal_token = self.cancellation_token.clone();
        join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = signal_token.cancelled() => {}
            }

            // Notify all other tasks to begin shutting down.
            signal_token.cancel();
        });

        // Spawn the registry refresh loop.
        let registry = Arc::clone(&self.registry);
        let registry_token = self.cancellation_token.clone();
        join_set.spawn(async move {
            registry.run(registry_token).await;
        });

        // Spawn the evaluation pipeline. When it exits, whether by
        // cancellation or because every event producer dropped its sender,
        // there is nothing left to evaluate and the engine shuts down.
        let pipeline_token = self.cancellation_token.clone();
        let events_rx = self.events_rx;
        let pipeline = self.pipeline;
        join_set.spawn(async move {
            pipeline.run(events_rx, pipeline_token.clone()).await;
            pipeline_token.cancel();
        });

        // Spawn the alert emitter. It exits when the pipeline drops the
        // trigger sender, so pending alerts drain before shutdown completes.
        let emitter = self.emitter;
        let triggers_rx = self.triggers_rx;
        join_set.spawn(async move {
            emitter.run(triggers_rx).await;
        });

        // The supervisor's own copy of the ingestion sender is released here;
        // from now on only external producers keep the channel open.
        drop(self.events_tx);

        // --- Main Supervisor Loop ---
        loop {
            tokio::select! {
                maybe_result = join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(_)) => {
                            // Task completed, continue monitoring the rest.
                        }
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => {
                            // All tasks have completed.
                            break;
                        }
                    }
                }
                _ = self.cancellation_token.cancelled() => {
                    break;
                }
            }
        }

        // --- Graceful Shutdown ---
        let shutdown_timeout = self.config.shutdown_timeout;
        let drain = async {
            while join_set.join_next().await.is_some() {}
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                "Supervised tasks did not complete within {:?}; aborting remaining tasks.",
                shutdown_timeout
            );
            join_set.shutdown().await;
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}
