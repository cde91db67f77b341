//! Streaming bridge between blocking file workers and hyper
//!
//! A [`ChannelWriter`] lives on a blocking thread and implements
//! [`ResponseWriter`]: the head goes over a oneshot, body chunks over a
//! bounded channel. The matching [`ChannelBody`] is handed to hyper. When the
//! connection goes away the receiver is dropped and the next write fails,
//! which ends the worker's copy loop.

use crate::http::writer::ResponseWriter;
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes, Frame};
use hyper::{HeaderMap, StatusCode};
use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// Body type of every response the server produces
pub type ResponseBody = BoxBody<Bytes, Infallible>;

/// Status and headers, as they were when the head was written
pub type Head = (StatusCode, HeaderMap);

/// Body fed by a [`ChannelWriter`]
#[derive(Debug)]
pub struct ChannelBody {
    rx: mpsc::Receiver<Bytes>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|data| Ok(Frame::data(data))))
    }
}

/// Blocking-side writer; must not be used from an async context
#[derive(Debug)]
pub struct ChannelWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: mpsc::Sender<Bytes>,
}

/// Create a connected writer, head receiver and body
pub fn channel(buffer: usize) -> (ChannelWriter, oneshot::Receiver<Head>, ChannelBody) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, rx) = mpsc::channel(buffer.max(1));
    let writer = ChannelWriter {
        headers: HeaderMap::new(),
        status: None,
        head_tx: Some(head_tx),
        body_tx,
    };
    (writer, head_rx, ChannelBody { rx })
}

fn disconnected() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
}

impl ResponseWriter for ChannelWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_some() {
            return;
        }
        self.status = Some(status);
        if let Some(tx) = self.head_tx.take() {
            // Receiver gone means the request future was dropped
            let _ = tx.send((status, self.headers.clone()));
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_header(StatusCode::OK);
        if data.is_empty() {
            return Ok(());
        }
        self.body_tx
            .blocking_send(Bytes::copy_from_slice(data))
            .map_err(|_| disconnected())
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl Drop for ChannelWriter {
    /// A worker that wrote nothing still answers with an empty 200, unless it panicked
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.write_header(StatusCode::OK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_streams_head_then_body() {
        let (mut writer, head_rx, body) = channel(2);
        let worker = tokio::task::spawn_blocking(move || {
            writer.headers_mut().insert("x-test", "1".parse().unwrap());
            writer.write_header(StatusCode::PARTIAL_CONTENT);
            writer.write(b"hello ").unwrap();
            writer.write(b"world").unwrap();
        });

        let (status, headers) = head_rx.await.unwrap();
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(headers.get("x-test").unwrap(), "1");

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"hello world");
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_body_aborts_writes() {
        let (mut writer, head_rx, body) = channel(1);
        drop(body);
        let result = tokio::task::spawn_blocking(move || writer.write(b"data"))
            .await
            .unwrap();

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(head_rx.await.unwrap().0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_silent_worker_sends_ok() {
        let (writer, head_rx, _body) = channel(1);
        drop(writer);
        assert_eq!(head_rx.await.unwrap().0, StatusCode::OK);
    }
}
