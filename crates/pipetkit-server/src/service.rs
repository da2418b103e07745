//! Request/response service binding
//!
//! Serves the facade over newline-delimited JSON on TCP: one request
//! object per line, one response object per line. Controller calls run
//! on the blocking pool while holding the instrument lock, so requests
//! from concurrent clients are serialized and never interleave on the
//! wire. Also hosts the optional keep-alive ping task, which contends
//! on the same lock.

use crate::dispatcher::{Dispatcher, FacadeResponse, Operation};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Configuration for the facade service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the listener binds to
    pub listen_addr: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7070".to_string(),
        }
    }
}

/// Bind and serve until the listener fails
pub async fn serve(dispatcher: Arc<Dispatcher>, config: &ServiceConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.listen_addr).await?;
    serve_listener(dispatcher, listener).await
}

/// Serve on an already bound listener
pub async fn serve_listener(
    dispatcher: Arc<Dispatcher>,
    listener: TcpListener,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "facade listening");
    }

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "client connected");
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(dispatcher, stream).await {
                tracing::debug!(%peer, "client connection ended: {}", e);
            }
        });
    }
}

async fn handle_client(dispatcher: Arc<Dispatcher>, stream: TcpStream) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        // A request that does not parse never touches the controller
        let response = match serde_json::from_str::<Operation>(&line) {
            Ok(operation) => dispatch_blocking(dispatcher.clone(), operation).await,
            Err(e) => FacadeResponse::error(400, format!("malformed request: {}", e)),
        };

        let payload = serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"status":"error","code":500,"message":"response serialization failed"}"#.to_string()
        });
        write_half.write_all(payload.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
    }

    Ok(())
}

/// Run one dispatch on the blocking pool.
///
/// The orchestrator does blocking serial I/O with timeouts, so it must
/// not run on the async worker threads.
async fn dispatch_blocking(dispatcher: Arc<Dispatcher>, operation: Operation) -> FacadeResponse {
    match tokio::task::spawn_blocking(move || dispatcher.dispatch(operation)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("dispatch task failed: {}", e);
            FacadeResponse::error(500, "internal dispatch failure")
        }
    }
}

/// Spawn the keep-alive task: pings the instrument on a fixed interval.
///
/// Each ping goes through the dispatcher and therefore acquires the
/// same instrument lock as client requests — it can never interleave
/// mid-command. A degraded link is re-handshaken by the ping itself.
pub fn spawn_keepalive(dispatcher: Arc<Dispatcher>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let response = dispatch_blocking(dispatcher.clone(), Operation::Ping).await;
            if !response.is_success() {
                tracing::warn!(
                    code = response.code,
                    "keep-alive ping failed: {}",
                    response.message
                );
            }
        }
    })
}
