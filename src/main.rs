use std::sync::Arc;

use clap::{Parser, Subcommand};
use palisade::{
    config::AppConfig,
    http_client::create_retryable_http_client,
    models::FirewallEvent,
    notification::{stdout::StdoutNotifier, webhook::WebhookNotifier, NotificationRouter},
    storage::sqlite::SqliteRuleStore,
    supervisor::Supervisor,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the alert evaluation supervisor, reading newline-delimited JSON
    /// firewall events from stdin.
    Run {
        /// Directory containing app.yaml. Defaults to `configs`.
        #[arg(long)]
        config_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config_dir } => run_supervisor(config_dir.as_deref()).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(database_url = %config.database_url, "Configuration loaded.");

    tracing::debug!("Initializing rule store...");
    let rule_store = Arc::new(SqliteRuleStore::new(&config.database_url).await?);
    rule_store.run_migrations().await?;
    tracing::info!("Database migrations completed.");

    let http_client = create_retryable_http_client(&config.http_retry, reqwest::Client::new());
    let notifier = Arc::new(NotificationRouter::new(
        WebhookNotifier::new(http_client),
        StdoutNotifier::new(),
    ));

    let supervisor = Supervisor::builder()
        .config(config)
        .rule_store(rule_store)
        .notifier(notifier)
        .build()
        .await?;

    // Feed events from stdin into the pipeline. When stdin reaches EOF the
    // sender drops, the ingestion channel closes, and the pipeline drains the
    // remaining events before shutting down.
    let events_tx = supervisor.event_sender();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<FirewallEvent>(line) {
                        Ok(event) => {
                            if events_tx.send(event).await.is_err() {
                                tracing::info!("Event channel closed; stopping stdin ingestion.");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping malformed event line.");
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("Reached end of event input.");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read from stdin; stopping ingestion.");
                    break;
                }
            }
        }
    });

    tracing::info!("Supervisor initialized, starting evaluation...");

    supervisor.run().await?;

    Ok(())
}
