//! Daemon entry point: bind, serve, shut down gracefully.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use approver_daemon::{app::App, dispatch, telemetry};

/// In-flight handlers get this long to drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Webhook daemon enforcing team-based review policy on pull requests.
#[derive(Parser, Debug)]
#[command(name = "approver-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// The 'host:port' pair to bind to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind_address: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init();

    let app = Arc::new(App::from_env()?);
    if !app.verifier.is_enabled() {
        warn!("webhook signature verification is disabled");
    }

    let listener = tokio::net::TcpListener::bind(&args.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", args.bind_address))?;
    info!(address = %args.bind_address, "listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("SIGINT or SIGTERM received, shutting server down");
        let _ = shutdown_tx.send(true);
    });

    let mut graceful_rx = shutdown_rx.clone();
    let server = axum::serve(listener, dispatch::router(app)).with_graceful_shutdown(
        async move {
            let _ = graceful_rx.wait_for(|fired| *fired).await;
        },
    );

    let mut watchdog_rx = shutdown_rx;
    let watchdog = async move {
        let _ = watchdog_rx.wait_for(|fired| *fired).await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };

    let mut server = pin!(std::future::IntoFuture::into_future(server));
    tokio::select! {
        result = &mut server => {
            result.context("failed to serve HTTP")?;
        }
        () = watchdog => {
            anyhow::bail!("graceful shutdown exceeded {SHUTDOWN_GRACE:?}");
        }
    }

    info!("server shutdown");
    Ok(())
}

async fn shutdown_signal() {
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "failed to install SIGINT handler");
            return std::future::pending().await;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "failed to install SIGTERM handler");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
}
