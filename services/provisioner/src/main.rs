//! Ephemeral runner webhook service.
//!
//! Receives `workflow_job` webhooks, provisions one single-use runner per
//! admitted job and deletes runners on their self-destruct callback.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use ghr_provisioner::{api, cleanup::StaleResourceReaper, config, logging, wiring};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    logging::init_tracing(&config.log_level);

    info!("Starting ephemeral runner provisioner");
    info!(
        listen_addr = %config.listen_addr,
        region = %config.digitalocean.region,
        size = %config.digitalocean.size,
        max_concurrent = config.limits.max_concurrent,
        max_per_repo_per_min = config.limits.max_per_repo_per_min,
        "Configuration loaded"
    );

    let provider = wiring::digitalocean_provider(&config)?;
    let state = match wiring::build_state(&config, provider.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialise collaborators");
            return Err(e);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper_handle = config.reaper.interval.map(|_| {
        let reaper = StaleResourceReaper::new(provider.clone(), wiring::reaper_config(&config));
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            reaper.run(shutdown_rx).await;
        })
    });
    if reaper_handle.is_none() {
        info!("In-process reaper disabled; run the cleanup binary on a schedule");
    }

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let mut shutdown_rx = shutdown_rx;
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
            info!("HTTP server shutting down");
        })
        .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    if let Some(handle) = reaper_handle {
        if let Err(e) = tokio::time::timeout(Duration::from_secs(10), handle).await {
            warn!(error = %e, "Reaper did not shut down in time");
        }
    }

    info!("Provisioner shutdown complete");
    Ok(())
}
