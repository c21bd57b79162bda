//! Stream decorators applied to request and response bodies.
//!
//! Each decorator wraps exactly one [`ByteStream`]. The pipeline composes them
//! as bounding -> progress -> crc -> timeout, the timeout being outermost.

use super::ByteStream;
use super::crc64::Crc64;
use crate::Error;
use bytes::Bytes;
use tokio_stream::Stream;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Sleep;

/// `(increment, transferred, total)`，`total`未知时为`-1`
pub type ProgressFn = Arc<dyn Fn(u64, u64, i64) + Send + Sync>;

/// Yields at most `remaining` bytes of the inner stream.
pub struct LimitStream {
    inner: ByteStream,
    remaining: u64,
}

impl LimitStream {
    pub fn new(inner: ByteStream, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }
}

impl Stream for LimitStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.remaining == 0 {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(mut chunk))) => {
                if chunk.len() as u64 > self.remaining {
                    chunk.truncate(self.remaining as usize);
                }
                self.remaining -= chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

pub struct ProgressStream {
    inner: ByteStream,
    progress: ProgressFn,
    transferred: u64,
    total: i64,
}

impl ProgressStream {
    pub fn new(inner: ByteStream, progress: ProgressFn, total: Option<u64>) -> Self {
        Self {
            inner,
            progress,
            transferred: 0,
            total: total.map_or(-1, |t| t as i64),
        }
    }
}

impl Stream for ProgressStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &poll {
            let n = chunk.len() as u64;
            if n > 0 {
                self.transferred += n;
                (self.progress)(n, self.transferred, self.total);
            }
        }
        poll
    }
}

/// Accumulates the CRC64 of every byte passing through.
///
/// The running value is published to a shared cell so the pipeline can read
/// it after the body was handed to the transport. When `expected` is set the
/// stream fails at EOF if the final value differs.
pub struct CrcStream {
    inner: ByteStream,
    digest: Crc64,
    shared: Arc<AtomicU64>,
    expected: Option<u64>,
    finished: bool,
}

impl CrcStream {
    pub fn new(inner: ByteStream, init_crc: u64, shared: Arc<AtomicU64>) -> Self {
        shared.store(init_crc, Ordering::Release);
        Self {
            inner,
            digest: Crc64::with_initial(init_crc),
            shared,
            expected: None,
            finished: false,
        }
    }

    pub fn verify(mut self, expected: u64) -> Self {
        self.expected = Some(expected);
        self
    }
}

impl Stream for CrcStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.digest.update(&chunk);
                let v = self.digest.value();
                self.shared.store(v, Ordering::Release);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                match self.expected {
                    Some(server_crc) if server_crc != self.digest.value() => {
                        let e = Error::InconsistentCrc {
                            client_crc: self.digest.value(),
                            server_crc,
                        };
                        Poll::Ready(Some(Err(io::Error::new(io::ErrorKind::InvalidData, e))))
                    }
                    _ => Poll::Ready(None),
                }
            }
            other => other,
        }
    }
}

/// Fails with [`io::ErrorKind::TimedOut`] when the inner stream makes no
/// progress for `timeout`.
pub struct TimeoutStream {
    inner: ByteStream,
    timeout: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TimeoutStream {
    pub fn new(inner: ByteStream, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            sleep: None,
        }
    }
}

impl Stream for TimeoutStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(item) => {
                self.sleep = None;
                Poll::Ready(item)
            }
            Poll::Pending => {
                let timeout = self.timeout;
                let sleep = self
                    .sleep
                    .get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
                match sleep.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        self.sleep = None;
                        Poll::Ready(Some(Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("no data transferred within {timeout:?}"),
                        ))))
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}
