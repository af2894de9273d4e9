use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use std::io;
use tokio::io::AsyncRead;
use tokio::sync::watch;

use super::{
    CloseNotify, Flush, Hijack, Hijacked, Observation, ReadFrom, ResponseObserver,
    ResponseWriter, unsupported,
};

/// Observer for writers that support every optional capability.
///
/// Plain writes and status changes go through the [`ResponseObserver`]
/// bookkeeping; the capabilities delegate to the wrapped writer.
pub struct CapableObserver<'a> {
    observer: ResponseObserver<'a>,
}

impl<'a> CapableObserver<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self {
            observer: ResponseObserver::new(inner),
        }
    }

    pub fn observation(&self) -> Observation {
        self.observer.observation()
    }
}

#[async_trait]
impl<'a> ResponseWriter for CapableObserver<'a> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.observer.headers_mut()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.observer.set_status(status);
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.observer.write(buf).await
    }

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }

    fn as_close_notify(&mut self) -> Option<&mut dyn CloseNotify> {
        Some(self)
    }

    fn as_hijack(&mut self) -> Option<&mut dyn Hijack> {
        Some(self)
    }

    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        Some(self)
    }
}

#[async_trait]
impl<'a> Flush for CapableObserver<'a> {
    async fn flush(&mut self) -> io::Result<()> {
        self.observer
            .inner
            .as_flush()
            .ok_or_else(|| unsupported("flush"))?
            .flush()
            .await
    }
}

impl<'a> CloseNotify for CapableObserver<'a> {
    fn close_notify(&mut self) -> watch::Receiver<bool> {
        match self.observer.inner.as_close_notify() {
            Some(notifier) => notifier.close_notify(),
            // sender dropped straight away; waiters see a closed channel
            None => watch::channel(false).1,
        }
    }
}

impl<'a> Hijack for CapableObserver<'a> {
    fn hijack(&mut self) -> io::Result<Hijacked> {
        self.observer
            .inner
            .as_hijack()
            .ok_or_else(|| unsupported("hijack"))?
            .hijack()
    }
}

#[async_trait]
impl<'a> ReadFrom for CapableObserver<'a> {
    async fn read_from(&mut self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> io::Result<u64> {
        self.observer.ensure_status();
        let n = self
            .observer
            .inner
            .as_read_from()
            .ok_or_else(|| unsupported("read_from"))?
            .read_from(reader)
            .await?;
        self.observer.state.written += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{Capabilities, MockWriter};

    fn full() -> MockWriter {
        MockWriter::with_capabilities(Capabilities::all())
    }

    #[tokio::test]
    async fn test_read_from_counts_bytes_and_sets_ok() {
        let mut inner = full();
        let mut observer = CapableObserver::new(&mut inner);

        observer.write(b"head:").await.unwrap();
        let mut body: &[u8] = b"streamed body";
        let n = observer.read_from(&mut body).await.unwrap();
        assert_eq!(n, 13);

        let seen = observer.observation();
        assert_eq!(seen.written, 18);
        assert_eq!(seen.status, Some(StatusCode::OK));
        assert_eq!(inner.body(), b"head:streamed body");
    }

    #[tokio::test]
    async fn test_read_from_first_sets_ok() {
        let mut inner = full();
        let mut observer = CapableObserver::new(&mut inner);

        let mut body: &[u8] = b"xyz";
        observer.read_from(&mut body).await.unwrap();
        assert_eq!(observer.observation().status, Some(StatusCode::OK));
        assert_eq!(observer.observation().written, 3);
    }

    #[tokio::test]
    async fn test_flush_delegates() {
        let mut inner = full();
        let mut observer = CapableObserver::new(&mut inner);
        observer.flush().await.unwrap();
        observer.flush().await.unwrap();
        assert_eq!(inner.flushes(), 2);
    }

    #[tokio::test]
    async fn test_close_notify_delegates() {
        let mut inner = full();
        let mut rx = {
            let mut observer = CapableObserver::new(&mut inner);
            observer.close_notify()
        };
        assert!(!*rx.borrow());

        inner.disconnect();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_hijack_delegates() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut inner = full();
        let mut hijacked = {
            let mut observer = CapableObserver::new(&mut inner);
            observer.hijack().unwrap()
        };
        assert!(inner.is_hijacked());

        hijacked.conn.write_all(b"raw").await.unwrap();
        let mut peer = inner.take_peer().unwrap();
        let mut buf = [0u8; 3];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"raw");
    }

    #[tokio::test]
    async fn test_status_and_write_are_observed() {
        let mut inner = full();
        let mut observer = CapableObserver::new(&mut inner);
        observer.set_status(StatusCode::ACCEPTED);
        observer.write(b"ok").await.unwrap();

        let seen = observer.observation();
        assert_eq!(seen.status, Some(StatusCode::ACCEPTED));
        assert_eq!(seen.written, 2);
    }
}
