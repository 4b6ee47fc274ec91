//! End-to-end tests for the evaluation engine: real SQLite rule storage, the
//! full supervisor wiring, and a recording notification transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use palisade::{
    config::AppConfig,
    http_client::create_retryable_http_client,
    notification::{
        error::NotificationError, stdout::StdoutNotifier, traits::Notifier,
        webhook::WebhookNotifier, NotificationRouter,
    },
    storage::{sqlite::SqliteRuleStore, traits::RuleStore},
    supervisor::Supervisor,
    test_helpers::{EventBuilder, RuleBuilder},
};
use serde_json::json;

/// A notification transport that records every hand-off for assertions.
#[derive(Clone, Default)]
struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<(String, String, serde_json::Value)>>>,
}

impl RecordingNotifier {
    fn recorded(&self) -> Vec<(String, String, serde_json::Value)> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        alert_type: &str,
        alert_target: &str,
        context: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        self.alerts.lock().unwrap().push((
            alert_type.to_string(),
            alert_target.to_string(),
            context.clone(),
        ));
        Ok(())
    }
}

/// A transport that always fails, to exercise the no-retry path.
struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(
        &self,
        _alert_type: &str,
        _alert_target: &str,
        _context: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::NotifyFailed("transport down".to_string()))
    }
}

async fn setup_store() -> (Arc<SqliteRuleStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}/rules.db", dir.path().display());
    let store = SqliteRuleStore::new(&url).await.expect("Failed to open database");
    store.run_migrations().await.expect("Failed to run migrations");
    (Arc::new(store), dir)
}

async fn run_events_through(
    store: Arc<SqliteRuleStore>,
    notifier: Arc<dyn Notifier>,
    events: Vec<palisade::models::FirewallEvent>,
) {
    let supervisor = Supervisor::builder()
        .config(AppConfig::default())
        .rule_store(store)
        .notifier(notifier)
        .build()
        .await
        .expect("Failed to build supervisor");

    let events_tx = supervisor.event_sender();
    let handle = tokio::spawn(supervisor.run());

    for event in events {
        events_tx.send(event).await.expect("Event channel closed early");
    }
    // Dropping the last sender closes the ingestion channel; the pipeline
    // drains pending events and the whole engine shuts down.
    drop(events_tx);

    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("Supervisor did not shut down")
        .expect("Supervisor task panicked")
        .expect("Supervisor returned an error");
}

#[tokio::test]
async fn threshold_crossing_emits_one_alert_and_persists_last_triggered() {
    let (store, _dir) = setup_store().await;
    store
        .insert_rule(
            &RuleBuilder::new()
                .name("deny-burst")
                .conditions(json!({"action": "DENY"}))
                .threshold_count(3)
                .threshold_period(60)
                .cooldown_period(300)
                .build(),
        )
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let events = (0..5).map(|i| EventBuilder::new().id(i).action("DENY").build()).collect();
    run_events_through(Arc::clone(&store), notifier.clone(), events).await;

    // Five matches within the window: the third crosses the threshold and
    // fires; the fourth and fifth are inside the cooldown.
    let recorded = notifier.recorded();
    assert_eq!(recorded.len(), 1);
    let (alert_type, target, context) = &recorded[0];
    assert_eq!(alert_type, "email");
    assert_eq!(target, "ops@example.com");
    assert_eq!(context["rule_name"], "deny-burst");
    assert_eq!(context["matched_count"], 3);

    let rules = store.list_enabled_rules().await.unwrap();
    assert!(rules[0].last_triggered.is_some());
}

#[tokio::test]
async fn non_matching_events_emit_nothing() {
    let (store, _dir) = setup_store().await;
    store
        .insert_rule(
            &RuleBuilder::new()
                .name("deny-watch")
                .conditions(json!({"action": "DENY"}))
                .build(),
        )
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let events = (0..4).map(|i| EventBuilder::new().id(i).action("ALLOW").build()).collect();
    run_events_through(Arc::clone(&store), notifier.clone(), events).await;

    assert!(notifier.recorded().is_empty());
    let rules = store.list_enabled_rules().await.unwrap();
    assert!(rules[0].last_triggered.is_none());
}

#[tokio::test]
async fn matching_is_case_insensitive_end_to_end() {
    let (store, _dir) = setup_store().await;
    store
        .insert_rule(
            &RuleBuilder::new()
                .name("mixed-case")
                .conditions(json!({"action": "deny", "severity": ["high", "CRITICAL"]}))
                .build(),
        )
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let events =
        vec![EventBuilder::new().id(1).action("DENY").severity("High").build()];
    run_events_through(Arc::clone(&store), notifier.clone(), events).await;

    assert_eq!(notifier.recorded().len(), 1);
}

#[tokio::test]
async fn notification_failure_still_persists_last_triggered() {
    let (store, _dir) = setup_store().await;
    store.insert_rule(&RuleBuilder::new().name("deny-once").build()).await.unwrap();

    let events = vec![EventBuilder::new().id(1).action("DENY").build()];
    run_events_through(Arc::clone(&store), Arc::new(FailingNotifier), events).await;

    // The firing decision stands even when the transport rejects it.
    let rules = store.list_enabled_rules().await.unwrap();
    assert!(rules[0].last_triggered.is_some());
}

#[tokio::test]
async fn webhook_rule_posts_trigger_context() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let (store, _dir) = setup_store().await;
    store
        .insert_rule(
            &RuleBuilder::new()
                .name("webhook-rule")
                .alert_type("webhook")
                .alert_target(&format!("{}/hook", server.url()))
                .build(),
        )
        .await
        .unwrap();

    let config = AppConfig::default();
    let http_client = create_retryable_http_client(&config.http_retry, reqwest::Client::new());
    let notifier = Arc::new(NotificationRouter::new(
        WebhookNotifier::new(http_client),
        StdoutNotifier::new(),
    ));

    let events = vec![EventBuilder::new().id(1).action("DENY").build()];
    run_events_through(Arc::clone(&store), notifier, events).await;

    mock.assert_async().await;
}
