//! DB Chat Dashboard - HTTP server entry point.

use clap::Parser;
use db_chat_dashboard::auth::ApiAuth;
use db_chat_dashboard::config::Config;
use db_chat_dashboard::db::DatabaseSessionProvider;
use db_chat_dashboard::oracle::HostedAgentFactory;
use db_chat_dashboard::{AppState, ChatService, HttpServer, SessionStore};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let embedded_path = config.embedded_path()?;
    info!(
        sqlite_file = %embedded_path.display(),
        "Starting DB Chat Dashboard v{}",
        env!("CARGO_PKG_VERSION")
    );
    if !embedded_path.exists() {
        warn!(
            sqlite_file = %embedded_path.display(),
            "Embedded database not found; run seed-demo-db to create the demo data"
        );
    }

    let provider = Arc::new(DatabaseSessionProvider::new(
        embedded_path,
        config.pool_options(),
        config.query_timeout(),
        config.handle_ttl(),
    ));
    let oracles = Arc::new(HostedAgentFactory::new(config.llm_settings()));
    let chat = ChatService::new(provider, oracles, config.llm_api_key.clone());
    if config.llm_api_key.is_none() {
        info!("No server-wide API key; sessions must supply their own");
    }

    let auth = ApiAuth::from_tokens(&config.auth_tokens)?;
    let sessions = SessionStore::new();
    sessions.clone().start_cleanup_task(config.session_idle());

    let server = HttpServer::new(
        AppState::new(chat, sessions),
        auth,
        &config.http_host,
        config.http_port,
    );

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
