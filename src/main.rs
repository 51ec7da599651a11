//! cqlbridge server entry point.
//!
//! Loads configuration, connects the storage backend and serves RESP clients
//! until Ctrl+C.

use cqlbridge::commands::Dispatcher;
use cqlbridge::config::{Backend, Config, Invocation, HELP};
use cqlbridge::connection::{handle_connection, ConnectionStats};
use cqlbridge::storage::{start_expiry_sweeper, CassandraStore, ExpirySweeper, MemoryStore, Storage};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => {
            println!("{HELP}");
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("cqlbridge version {}", cqlbridge::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Run with --help for usage.");
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(version = cqlbridge::VERSION, backend = %config.backend, "starting cqlbridge");

    // The sweeper stops when this guard is dropped at shutdown.
    let (storage, _sweeper) = open_storage(&config).await?;
    let dispatcher = Dispatcher::with_storage(storage);
    debug!(?dispatcher, "command table ready");
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(&config.listen).await?;
    info!(addr = %config.listen, "listening for redis clients");

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received, stopping server");
    };

    tokio::select! {
        _ = accept_loop(listener, dispatcher, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        active = stats.active_connections.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        bytes_read = stats.bytes_read.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        "server shutdown complete"
    );
    Ok(())
}

async fn open_storage(
    config: &Config,
) -> anyhow::Result<(Arc<dyn Storage>, Option<ExpirySweeper>)> {
    match config.backend {
        Backend::Cassandra => {
            let store = CassandraStore::connect(&config.cassandra()).await?;
            Ok((Arc::new(store), None))
        }
        Backend::Memory => {
            let store = Arc::new(MemoryStore::new());
            let sweeper = start_expiry_sweeper(Arc::clone(&store));
            info!("in-memory backend ready, expiry sweeper started");
            Ok((store, Some(sweeper)))
        }
    }
}

async fn accept_loop(listener: TcpListener, dispatcher: Dispatcher, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    dispatcher.clone(),
                    Arc::clone(&stats),
                ));
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}
