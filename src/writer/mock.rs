use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, DuplexStream};
use tokio::sync::watch;

use super::{
    Capabilities, CloseNotify, Flush, Hijack, Hijacked, ReadFrom, ResponseWriter, unsupported,
};

/// In-memory writer with a configurable capability set, for tests.
#[derive(Debug)]
pub struct MockWriter {
    capabilities: Capabilities,
    headers: HeaderMap,
    status: Option<StatusCode>,
    status_calls: usize,
    body: Vec<u8>,
    flushes: usize,
    write_limit: Option<usize>,
    closed_tx: watch::Sender<bool>,
    hijacked: bool,
    peer: Option<DuplexStream>,
}

impl MockWriter {
    /// Writer with no optional capabilities.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::default())
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            capabilities,
            headers: HeaderMap::new(),
            status: None,
            status_calls: 0,
            body: Vec::new(),
            flushes: 0,
            write_limit: None,
            closed_tx,
            hijacked: false,
            peer: None,
        }
    }

    /// Accept at most `limit` body bytes, then fail every write with
    /// `BrokenPipe`.
    pub fn fail_writes_after(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn is_hijacked(&self) -> bool {
        self.hijacked
    }

    /// Client side of a hijacked connection.
    pub fn take_peer(&mut self) -> Option<DuplexStream> {
        self.peer.take()
    }

    /// Simulate the client hanging up.
    pub fn disconnect(&self) {
        self.closed_tx.send_replace(true);
    }
}

impl Default for MockWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseWriter for MockWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status_calls += 1;
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.hijacked {
            return Err(io::Error::other("connection hijacked"));
        }
        // the first body byte sends the header, like a real host writer
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        if let Some(limit) = self.write_limit {
            if self.body.len() + buf.len() > limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write limit reached"));
            }
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        if self.capabilities.flush { Some(self) } else { None }
    }

    fn as_close_notify(&mut self) -> Option<&mut dyn CloseNotify> {
        if self.capabilities.close_notify { Some(self) } else { None }
    }

    fn as_hijack(&mut self) -> Option<&mut dyn Hijack> {
        if self.capabilities.hijack { Some(self) } else { None }
    }

    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        if self.capabilities.read_from { Some(self) } else { None }
    }
}

#[async_trait]
impl Flush for MockWriter {
    async fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

impl CloseNotify for MockWriter {
    fn close_notify(&mut self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }
}

impl Hijack for MockWriter {
    fn hijack(&mut self) -> io::Result<Hijacked> {
        if self.hijacked {
            return Err(unsupported("a second hijack"));
        }
        let (server, client) = tokio::io::duplex(1024);
        self.hijacked = true;
        self.peer = Some(client);
        Ok(Hijacked {
            conn: Box::new(server),
            buffered: Bytes::new(),
        })
    }
}

#[async_trait]
impl ReadFrom for MockWriter {
    async fn read_from(&mut self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> io::Result<u64> {
        let mut chunk = Vec::new();
        reader.read_to_end(&mut chunk).await?;
        self.write(&chunk).await.map(|n| n as u64)
    }
}
