//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    engine::{
        clock::{Clock, SystemClock},
        emitter::AlertEmitter,
        pipeline::EvaluationPipeline,
    },
    notification::traits::Notifier,
    registry::RuleRegistry,
    storage::traits::RuleStore,
};

use super::{Supervisor, SupervisorError};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    rule_store: Option<Arc<dyn RuleStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the rule store (database connection) for the `Supervisor`.
    pub fn rule_store(mut self, rule_store: Arc<dyn RuleStore>) -> Self {
        self.rule_store = Some(rule_store);
        self
    }

    /// Sets the notification transport for the `Supervisor`.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the processing-time clock. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Assembles and validates the components to build a `Supervisor`.
    ///
    /// This performs the final wiring of the engine's services and the initial
    /// rule load. The initial load is the one refresh whose failure is fatal:
    /// the database is the single source of truth for the rule set, and
    /// starting without it would silently evaluate zero rules.
    pub async fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let rule_store = self.rule_store.ok_or(SupervisorError::MissingRuleStore)?;
        let notifier = self.notifier.ok_or(SupervisorError::MissingNotifier)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let registry =
            Arc::new(RuleRegistry::new(Arc::clone(&rule_store), config.refresh_interval));
        registry.initialize().await?;

        let (events_tx, events_rx) =
            mpsc::channel(config.event_channel_capacity as usize);
        let (triggers_tx, triggers_rx) =
            mpsc::channel(config.trigger_channel_capacity as usize);

        let pipeline = EvaluationPipeline::new(
            Arc::clone(&registry),
            config.window_ceiling,
            triggers_tx,
            clock,
        );
        let emitter = AlertEmitter::new(rule_store, notifier);

        Ok(Supervisor {
            config: Arc::new(config),
            registry,
            pipeline,
            emitter,
            events_tx,
            events_rx,
            triggers_rx,
            cancellation_token: CancellationToken::new(),
        })
    }
}
