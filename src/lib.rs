pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

pub use config::Config;
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "daemon" | "-d" | "--daemon" => run_daemon(config).await,

        "init" | "--init" => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            println!("Unknown command: {}", args[1]);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Parishd - Parish Membership Management Service");
    println!();
    println!("USAGE:");
    println!("  parishd <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("  daemon            Run the web API server");
    println!("  init              Create default config file");
    println!("  help              Show this help message");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure the database, server, and SMTP delivery.");
    println!("  The bootstrap admin is seeded from ADMIN_EMAIL / ADMIN_PASSWORD");
    println!("  (default admin@example.com) on first run.");
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        "Parishd v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    if !config.server.enabled {
        anyhow::bail!("Server is disabled in config; nothing to do");
    }

    let port = config.server.port;
    let shared = Arc::new(SharedState::new(config).await?);
    let state = api::create_app_state(shared);

    let app = api::router(state).await;
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("🌐 Web Server running at http://0.0.0.0:{}", port);
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    server_handle.abort();
    info!("Daemon stopped");

    Ok(())
}
