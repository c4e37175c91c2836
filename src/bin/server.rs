//! partikv Server Binary
//!
//! Opens the database registry and serves it over TCP.

use std::sync::Arc;

use clap::Parser;
use partikv::network::Server;
use partikv::{Config, DatabaseManager};
use tracing_subscriber::{fmt, EnvFilter};

/// partikv Server
#[derive(Parser, Debug)]
#[command(name = "partikv-server")]
#[command(about = "Partitioned key-value storage service")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./partikv_data")]
    data_dir: String,

    /// Public listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:7078")]
    listen: String,

    /// Local management address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7079")]
    admin: String,

    /// Partitions for databases created without an explicit count
    #[arg(short, long, default_value = "4")]
    partitions: usize,

    /// Entries held by each database's read cache
    #[arg(short, long, default_value = "10000")]
    cache: usize,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,partikv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("partikv server v{}", partikv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .admin_addr(&args.admin)
        .default_partitions(args.partitions)
        .cache_capacity(args.cache)
        .max_connections(args.max_connections)
        .build();

    let manager = match DatabaseManager::open(config.clone()) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            tracing::error!("Failed to open databases: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Loaded {} databases", manager.list().len());

    let server = Server::new(config, Arc::clone(&manager));
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        manager.close_all();
        std::process::exit(1);
    }

    manager.close_all();
    tracing::info!("Server stopped");
}
