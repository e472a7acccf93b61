//! Supportdesk CLI entry point.
//!
//! Provides `serve`, `classify`, and `seed` subcommands for running the API
//! with its background queue, classifying a single email, or loading the demo
//! inbox into the database.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use supportdesk::api::{self, AppState};
use supportdesk::config::Config;
use supportdesk::ingest::{sample_inbox, Ingestor};
use supportdesk::knowledge::KnowledgeBase;
use supportdesk::providers::openai::OpenAiProvider;
use supportdesk::providers::LlmProvider;
use supportdesk::queue::PriorityQueue;
use supportdesk::responder::LlmResponder;
use supportdesk::sender::{MailSender, ResponseSender};
use supportdesk::store::{EmailStore, SqliteEmailStore};

/// Supportdesk: customer support email triage.
#[derive(Parser)]
#[command(name = "supportdesk", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the REST API and the background processing queue.
    Serve,
    /// Classify one email and print the result as JSON.
    Classify {
        /// Subject line.
        #[arg(long)]
        subject: String,
        /// Body text.
        #[arg(long)]
        body: String,
    },
    /// Ingest the demo inbox into the configured database.
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => handle_serve().await,
        Command::Classify { subject, body } => handle_classify(&subject, &body),
        Command::Seed => handle_seed().await,
    }
}

/// Run the API server until Ctrl-C or SIGTERM.
async fn handle_serve() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _logging_guard = supportdesk::logging::init_production(&config.paths.logs_dir)?;

    let state = build_state(&config).await?;
    let queue = Arc::clone(&state.queue);
    queue.start();

    let app = api::router(state, &config.server.cors_origins);
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(
        bind = %config.server.bind,
        database = %config.paths.database.display(),
        interval_ms = config.queue.interval_ms,
        "supportdesk started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    queue.stop().await;
    info!("supportdesk stopped");
    Ok(())
}

/// Print the classifier output for one email.
fn handle_classify(subject: &str, body: &str) -> anyhow::Result<()> {
    supportdesk::logging::init_cli();
    let labels = supportdesk::classifier::classify(subject, body);
    println!("{}", serde_json::to_string_pretty(&labels)?);
    Ok(())
}

/// Ingest the demo inbox. Replies are drafted later by `serve`.
async fn handle_seed() -> anyhow::Result<()> {
    supportdesk::logging::init_cli();
    let config = Config::load().context("failed to load configuration")?;
    let state = build_state(&config).await?;
    let stored = state.ingestor.ingest(sample_inbox()).await;
    println!(
        "Seeded {} new emails into {}",
        stored.len(),
        config.paths.database.display()
    );
    Ok(())
}

/// Open the database and wire every collaborator together.
async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = Arc::new(
        SqliteEmailStore::open(&config.paths.database)
            .await
            .with_context(|| format!("failed to open {}", config.paths.database.display()))?,
    );
    let email_store: Arc<dyn EmailStore> = store.clone();

    let knowledge = Arc::new(KnowledgeBase::new());
    let provider = OpenAiProvider::from_config(&config.llm)
        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>);
    match &provider {
        Some(p) => info!(model = %p.model_id(), "llm provider configured"),
        None => info!("no llm api key, replies use the built-in template"),
    }
    let responder = Arc::new(LlmResponder::new(
        provider,
        Arc::clone(&knowledge),
        &config.llm,
    ));

    let mail = MailSender::from_config(Arc::clone(&email_store), config.smtp.as_ref())
        .context("invalid smtp configuration")?;
    info!(live = mail.is_live(), "reply sender ready");
    let sender: Arc<dyn ResponseSender> = Arc::new(mail);

    let queue = Arc::new(PriorityQueue::new(
        Arc::clone(&email_store),
        responder.clone(),
        Arc::clone(&sender),
        config.queue.clone(),
    ));
    let ingestor = Arc::new(Ingestor::new(email_store, Arc::clone(&queue)));

    Ok(AppState {
        store,
        queue,
        responder,
        sender,
        knowledge,
        ingestor,
    })
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
    info!("shutdown signal received");
}
