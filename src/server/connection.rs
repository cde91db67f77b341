// Connection handling module
// Admits accepted TCP connections and serves them with hyper's HTTP/1 stack

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Sleep;
use tracing::{debug, warn};

use crate::config::AppState;
use crate::handler;

/// Reserve a slot for one more connection, honouring `max_connections`
///
/// Returns `false` (leaving the counter unchanged) when the cap is reached.
pub fn try_admit(active: &AtomicUsize, max_connections: Option<u64>) -> bool {
    // Increment first, then check, so concurrent accepts cannot overshoot
    let prev = active.fetch_add(1, Ordering::SeqCst);
    let Some(max) = max_connections else {
        return true;
    };
    if prev >= usize::try_from(max).unwrap_or(usize::MAX) {
        active.fetch_sub(1, Ordering::SeqCst);
        return false;
    }
    true
}

/// Accept and process a connection, checking limits and logging
pub fn accept_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: &Arc<AppState>,
    active: &Arc<AtomicUsize>,
) {
    if !try_admit(active, state.config.performance.max_connections) {
        warn!(
            %peer,
            max = ?state.config.performance.max_connections,
            "max connections reached, connection rejected"
        );
        return;
    }
    debug!(%peer, "connection accepted");

    let state = Arc::clone(state);
    let active = Arc::clone(active);
    tokio::spawn(async move {
        serve_connection(stream, peer, state).await;
        active.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Fails writes that make no progress for `timeout`
///
/// Long transfers are fine as long as the client keeps reading; only a
/// stalled socket trips the timer, which is re-armed after every completed
/// write.
pub struct WriteTimeout<T> {
    inner: T,
    timeout: Duration,
    stalled: Option<Pin<Box<Sleep>>>,
}

impl<T> WriteTimeout<T> {
    pub const fn new(inner: T, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            stalled: None,
        }
    }

    fn guard<R>(&mut self, cx: &mut Context<'_>, polled: Poll<io::Result<R>>) -> Poll<io::Result<R>> {
        if let Poll::Ready(result) = polled {
            self.stalled = None;
            return Poll::Ready(result);
        }
        let timeout = self.timeout;
        let sleep = self
            .stalled
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
        match sleep.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "write stalled",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T: hyper::rt::Read + Unpin> hyper::rt::Read for WriteTimeout<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T: hyper::rt::Write + Unpin> hyper::rt::Write for WriteTimeout<T> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.guard(cx, polled)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_flush(cx);
        this.guard(cx, polled)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        this.guard(cx, polled)
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, state: Arc<AppState>) {
    let perf = &state.config.performance;
    let io = WriteTimeout::new(TokioIo::new(stream), Duration::from_secs(perf.write_timeout.max(1)));

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .keep_alive(perf.keep_alive_timeout > 0)
        .header_read_timeout(Duration::from_secs(perf.read_timeout.max(1)));

    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req| handler::handle_request(req, Arc::clone(&service_state), peer)),
    );

    if let Err(err) = conn.await {
        if err.is_timeout() {
            warn!(%peer, error = %err, "connection timed out");
        } else {
            debug!(%peer, error = %err, "connection closed with error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_cap() {
        let active = AtomicUsize::new(0);
        assert!(try_admit(&active, Some(2)));
        assert!(try_admit(&active, Some(2)));
        assert!(!try_admit(&active, Some(2)));
        assert_eq!(active.load(Ordering::SeqCst), 2);

        assert!(try_admit(&active, None));
        assert_eq!(active.load(Ordering::SeqCst), 3);
    }

    async fn write_some<T: hyper::rt::Write + Unpin>(io: &mut T, data: &[u8]) -> io::Result<usize> {
        std::future::poll_fn(|cx| Pin::new(&mut *io).poll_write(cx, data)).await
    }

    #[tokio::test]
    async fn test_stalled_write_times_out() {
        let (client, _server) = tokio::io::duplex(8);
        let mut io = WriteTimeout::new(TokioIo::new(client), Duration::from_millis(50));

        // Fills the pipe; nobody reads the other end
        assert_eq!(write_some(&mut io, b"12345678").await.unwrap(), 8);
        let err = write_some(&mut io, b"9").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_progressing_writes_outlive_timeout() {
        use tokio::io::AsyncReadExt;

        let (client, mut server) = tokio::io::duplex(8);
        let mut io = WriteTimeout::new(TokioIo::new(client), Duration::from_millis(50));

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            let mut chunk = [0u8; 4];
            while received.len() < 64 {
                let n = server.read(&mut chunk).await.unwrap();
                received.extend_from_slice(&chunk[..n]);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            received
        });

        // Total time exceeds the timeout, but no single write waits that long
        let data: Vec<u8> = (0..64u8).collect();
        let mut sent = 0;
        while sent < data.len() {
            sent += write_some(&mut io, &data[sent..]).await.unwrap();
        }
        assert_eq!(reader.await.unwrap(), data);
    }
}
