// Server module entry point
// Accept loop, connection handling and the streaming body bridge

pub mod body;
pub mod connection;
pub mod listener;

pub use listener::bind;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::AppState;
use connection::accept_connection;

/// How long in-flight connections get to finish after shutdown starts
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept connections until `shutdown` resolves, then wait for in-flight
/// connections to drain (bounded by [`DRAIN_TIMEOUT`])
pub async fn run(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let active = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => accept_connection(stream, peer, &state, &active),
                // Usually EMFILE or a reset during the handshake; keep serving
                Err(e) => error!(error = %e, "failed to accept connection"),
            },
            () = &mut shutdown => break,
        }
    }

    drop(listener);
    info!(active = active.load(Ordering::SeqCst), "shutting down, draining connections");
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while active.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            warn!(
                active = active.load(Ordering::SeqCst),
                "drain timeout, closing remaining connections"
            );
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

/// Resolves on Ctrl-C (and SIGTERM on Unix)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl-C received"),
        () = terminate => info!("SIGTERM received"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MountConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_serves_over_tcp_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();
        let mut config = Config::load_from(dir.path().join("absent").to_str().unwrap()).unwrap();
        config.logging.access_log = false;
        config.content.mounts.insert(
            "files".to_string(),
            MountConfig {
                root: dir.path().to_path_buf(),
                immutable: true,
                max_age: None,
            },
        );
        let state = Arc::new(AppState::new(&config));

        let listener = bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(run(listener, state, async {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /files/a.txt HTTP/1.1\r\nHost: x\r\nRange: bytes=2-4\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8(raw).unwrap();

        assert!(text.starts_with("HTTP/1.1 206 Partial Content\r\n"), "{text}");
        assert!(text.to_ascii_lowercase().contains("content-range: bytes 2-4/10"));
        assert!(text.ends_with("\r\n\r\n234"));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
