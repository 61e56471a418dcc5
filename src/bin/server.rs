//! Skirmish Server Binary
//!
//! Starts the user, admin and updater listeners.

use std::sync::Arc;

use clap::Parser;
use skirmish::network::Server;
use skirmish::{Config, MemoryAccountStore};
use tracing_subscriber::{fmt, EnvFilter};

/// Skirmish Server
#[derive(Parser, Debug)]
#[command(name = "skirmish-server")]
#[command(about = "Session and quick match server for duel games")]
#[command(version)]
struct Args {
    /// User listen address (host:port)
    #[arg(long, default_value = "127.0.0.1:7000")]
    user_listen: String,

    /// Admin listen address (host:port)
    #[arg(long, default_value = "127.0.0.1:7001")]
    admin_listen: String,

    /// Updater listen address (host:port)
    #[arg(long, default_value = "127.0.0.1:7002")]
    updater_listen: String,

    /// Protocol version clients must announce
    #[arg(short, long, default_value = "1")]
    protocol_version: i32,

    /// Maximum concurrent user connections
    #[arg(short, long, default_value = "1024")]
    max_users: usize,

    /// Maximum live matches
    #[arg(long, default_value = "512")]
    max_matches: usize,

    /// Worker threads for user traffic
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Admin credentials (login:password)
    #[arg(long, default_value = "admin:admin")]
    admin: String,

    /// Player account (login:password), repeatable
    #[arg(short, long = "account")]
    accounts: Vec<String>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,skirmish=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Skirmish Server v{}", skirmish::VERSION);
    tracing::info!("User address: {}", args.user_listen);
    tracing::info!("Admin address: {}", args.admin_listen);

    let Some((admin_login, admin_password)) = args.admin.split_once(':') else {
        tracing::error!("Admin credentials must be login:password");
        std::process::exit(2);
    };

    let accounts = MemoryAccountStore::new();
    for entry in &args.accounts {
        match entry.split_once(':') {
            Some((login, password)) => accounts.insert(login, password),
            None => {
                tracing::error!("Account '{}' must be login:password", entry);
                std::process::exit(2);
            }
        }
    }
    tracing::info!("{} player accounts loaded", accounts.len());

    // Build config from args
    let config = Config::builder()
        .version(args.protocol_version)
        .user_addr(&args.user_listen)
        .admin_addr(&args.admin_listen)
        .updater_addr(&args.updater_listen)
        .max_user_sessions(args.max_users)
        .max_live_matches(args.max_matches)
        .max_waiting_players(args.max_users)
        .user_worker_threads(args.workers)
        .admin_credentials(admin_login, admin_password)
        .build();

    let server = match Server::bind(config, Arc::new(accounts)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
