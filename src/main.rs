// src/main.rs — Parley entry point

use clap::{Parser, Subcommand};
use std::sync::Arc;

use parley::api::{self, ApiState};
use parley::core::access::AccessController;
use parley::core::agents::AgentConnectionManager;
use parley::core::processor::EventProcessor;
use parley::infra::config::Config;
use parley::infra::logger;
use parley::jobs;
use parley::provider::billing::SubscriptionClient;
use parley::provider::chat::ChatApiClient;
use parley::provider::model::CompletionClient;
use parley::provider::video::VideoApiClient;
use parley::provider::{CallProvider, ChatModel, ChatProvider, SubscriptionProvider};
use parley::store::{schema, spawn_store_server, Store};

#[derive(Parser)]
#[command(name = "parley", version, about = "Meeting server with an AI participant")]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server (the default).
    Serve {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Respects RUST_LOG.
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    let port = match cli.command {
        Some(Commands::Serve { port }) => port.unwrap_or(config.server.port),
        None => config.server.port,
    };

    // Database + store actor
    let db_path = config.database.resolved_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = rusqlite::Connection::open(&db_path)?;
    schema::run_migrations(&conn)?;
    let (store, _store_task) = spawn_store_server(Store::new(conn));

    // External collaborators
    let calls: Arc<dyn CallProvider> =
        Arc::new(VideoApiClient::new(&config.call_provider, &config.realtime));
    let chat: Arc<dyn ChatProvider> = Arc::new(ChatApiClient::new(&config.chat));
    let model: Arc<dyn ChatModel> = Arc::new(CompletionClient::new(&config.model));
    let subscriptions: Arc<dyn SubscriptionProvider> =
        Arc::new(SubscriptionClient::new(&config.billing));

    // Engine
    let agents = Arc::new(AgentConnectionManager::new(
        store.clone(),
        calls.clone(),
        config.realtime.clone(),
    ));

    // Crash-recovery sweep: finalize meetings that claim a live agent this
    // fresh process does not hold.
    match agents.reconcile().await {
        Ok(0) => {}
        Ok(n) => tracing::warn!("finalized {n} stale agent session(s) at startup"),
        Err(e) => tracing::error!("agent reconcile sweep failed: {e}"),
    }

    let (summary_queue, _summary_task) = jobs::spawn_summary_worker(store.clone(), model.clone());

    let processor = Arc::new(EventProcessor::new(
        store.clone(),
        agents.clone(),
        calls.clone(),
        chat.clone(),
        model,
        summary_queue,
        config.model.chat_context_messages,
    ));
    let access = Arc::new(AccessController::new(store.clone(), agents.clone()));

    let state = ApiState {
        store,
        access,
        agents,
        processor,
        calls,
        chat,
        subscriptions,
        billing: config.billing.clone(),
        gateway_token: config.server.gateway_token.clone(),
        http: reqwest::Client::new(),
    };

    api::start_server(&config.server.bind, port, state).await
}
