// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chainlog_node::config::{Cli, NodeConfig};
use chainlog_node::events::{BlockLogService, NoticeBus};
use chainlog_node::replay::Bootstrap;
use chainlog_node::server::{build_router, StatusState};
use chainlog_node::{db, processors, tables, telemetry};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();

    let cfg = NodeConfig::from(Cli::parse());
    tracing::info!("Initializing chainlog node with config: {:?}", cfg);

    let mut bootstrap = Bootstrap::new(cfg.clone());
    processors::register_defaults(&mut bootstrap);

    if cfg.reset_tables {
        let conn = db::open(&cfg.db_path, cfg.busy_timeout)?;
        // schemas register their table patterns
        chainlog_node::block_store::ensure_schema(&conn)?;
        chainlog_node::progress::ensure_schema(&conn)?;
        let dropped = tables::drop_registered_tables(&conn)?;
        tracing::warn!("Reset dropped {} tables", dropped.len());
    }

    // This binary produces no blocks itself. A chain integration embedding
    // the node publishes produced logs and irreversibility notices through
    // clones of `bus`; standalone, the store only replays what it holds.
    let (bus, notices) = NoticeBus::channel(cfg.notice_capacity);
    let cancel = CancellationToken::new();
    let service = BlockLogService::open(&cfg)?;
    let service_task = tokio::spawn(service.run(notices, cancel.clone()));
    tracing::info!("Waiting for block logs from the chain integration (none is built in)");

    bootstrap.start()?;

    let app = build_router(StatusState::open(&cfg)?);
    let listener = TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!("Listening on {}", cfg.bind_addr);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
            shutdown.cancel();
        })
        .await?;

    tracing::info!("Shutting down");
    cancel.cancel();
    service_task.await?;
    drop(bus);
    tokio::task::spawn_blocking(move || bootstrap.stop()).await?;
    Ok(())
}
