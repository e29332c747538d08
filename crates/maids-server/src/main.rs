#![doc = include_str!("../README.md")]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod server;

use anyhow::Context;
use clap::Parser;
use core::future::IntoFuture;
use maids_core::{AppIdService, UuidV4Generator};
use server::config::{CliArgs, ServerConfig};
use server::service::handler::{AppState, build_router};
use server::store::Backend;
use server::telemetry::{init_telemetry, shutdown_telemetry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let result = run(&config).await;
    if let Err(err) = &result {
        tracing::error!("Service stopped with an error: {err:#}");
    }

    shutdown_telemetry(providers);
    result
}

async fn run(config: &ServerConfig) -> anyhow::Result<()> {
    let backend = Backend::connect(config)
        .await
        .context("failed to prepare the App ID store")?;
    let backend_name = backend.name();

    let state = Arc::new(AppState {
        service: AppIdService::new(
            Arc::new(backend),
            UuidV4Generator,
            config.allocation.clone(),
        ),
        api_token: config.api_token.clone(),
        output_stack_trace: config.output_stack_trace,
    });

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(config, backend_name);

    let shutdown = Arc::new(Notify::new());
    let serve = axum::serve(listener, build_router(state)).with_graceful_shutdown({
        let shutdown = Arc::clone(&shutdown);
        async move {
            shutdown_signal().await;
            shutdown.notify_one();
        }
    });
    let drain_deadline = async {
        shutdown.notified().await;
        tokio::time::sleep(config.shutdown_timeout).await;
    };

    tokio::select! {
        res = serve.into_future() => res?,
        () = drain_deadline => {
            tracing::warn!(
                "In-flight requests did not finish within {}s, shutting down anyway",
                config.shutdown_timeout.as_secs()
            );
        }
    }

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig, backend: &str) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting App ID service on {} ({} store) with full config: {:#?}",
            config.server_addr,
            backend,
            config
        );
    } else {
        tracing::info!(
            "Starting App ID service on {} ({} store), max {} IDs per register, max {} IDs per create",
            config.server_addr,
            backend,
            config.allocation.max_ids_in_register,
            config.allocation.max_ids_in_create
        );
    }

    if config.allocation.can_set_ids_in_create || config.allocation.can_set_retries_in_create {
        tracing::warn!("Create requests may set their own IDs or retries, do not use in production");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {err}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {err}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
