//! # A TCP Sidecar for Unique-ID Generation
//!
//! `idmint-sidecar` exposes one [`idmint`] generation strategy over a
//! connection-oriented socket: a client opens a TCP connection, reads exactly
//! one identifier as a byte sequence, and the sidecar closes the connection.
//! There is no framing, no request body and no connection reuse: just the
//! stateless contract co-located workers poll on.
//!
//! ## Running
//!
//! ```bash
//! GENERATOR_TYPE=HLC_SNOWFLAKE ./idmint-sidecar
//! ```
//!
//! The strategy is chosen once at startup via `GENERATOR_TYPE`
//! (`SNOWFLAKE`, `HLC_SNOWFLAKE`, `INSTA_SNOWFLAKE`, `SONYFLAKE`, `UUIDV4`,
//! `UUIDV7`, `DB_AUTO_INC`, `DUAL_BUFFER`, `ETCD_SNOWFLAKE`, `SPANNER`,
//! `SPANNER_TRUETIME`); unknown values fall back to `SNOWFLAKE`. Coordinator
//! endpoints are configured through the `DB_*`, `ETCD_SERVICE_*` and
//! `SPANNER_*` environment variables, each with an in-cluster default.
//!
//! The listener address defaults to `0.0.0.0:8080` and can be overridden via
//! CLI or environment (see `--help`). Logs are controlled with `RUST_LOG`.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use idmint::{build_generator, GeneratorKind, IdEmitter};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about)]
struct CliArgs {
    /// Address the sidecar accepts ID requests on.
    ///
    /// Environment variable: `LISTEN_ADDR`
    #[arg(long, env = "LISTEN_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    listen_addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let kind = GeneratorKind::from_env();
    tracing::info!(generator = %kind, "initializing generator");

    // Coordinator-backed strategies block on startup work (lease claims,
    // initial segment fetch, session creation).
    let generator: Arc<dyn IdEmitter> =
        Arc::from(tokio::task::spawn_blocking(move || build_generator(kind)).await??);

    let listener = TcpListener::bind(&args.listen_addr).await?;
    tracing::info!(addr = %args.listen_addr, generator = %kind, "sidecar listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let generator = Arc::clone(&generator);
                        tokio::spawn(serve_connection(stream, peer, generator));
                    }
                    Err(err) => tracing::warn!(error = %err, "accept failed"),
                }
            }
            () = shutdown_signal() => {
                tracing::info!("shutdown signal received, terminating");
                break;
            }
        }
    }

    Ok(())
}

/// Emits one identifier to the peer and lets the connection close on drop.
///
/// Blocking strategies (database round-trips, coordinator transactions) run
/// on the blocking pool so the accept loop never stalls. A clock regression
/// fails the call and the connection closes without a payload; other
/// generation failures emit the `0` sentinel.
async fn serve_connection(mut stream: TcpStream, peer: SocketAddr, generator: Arc<dyn IdEmitter>) {
    let emitted = tokio::task::spawn_blocking(move || generator.next_id_string()).await;

    let payload = match emitted {
        Ok(Ok(id)) => id,
        Ok(Err(idmint::Error::ClockRegressed)) => {
            tracing::error!(%peer, "refusing request: clock regressed");
            return;
        }
        Ok(Err(err)) => {
            tracing::error!(%peer, error = %err, "generation failed; emitting sentinel");
            String::from("0")
        }
        Err(err) => {
            tracing::error!(%peer, error = %err, "generator task failed");
            return;
        }
    };

    if let Err(err) = stream.write_all(payload.as_bytes()).await {
        tracing::warn!(%peer, error = %err, "write failed");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C signal"),
        () = terminate => tracing::info!("received SIGTERM signal"),
    }
}
