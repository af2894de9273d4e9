use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use std::io;

use super::{Flush, ResponseWriter};

/// What an observer saw of one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    /// Unset until the handler sets a status or writes its first byte
    pub status: Option<StatusCode>,
    pub written: u64,
    pub wrote_header: bool,
}

impl Observation {
    /// Numeric status for labelling; 0 when the handler never responded.
    pub fn status_code(&self) -> u16 {
        self.status.map(|s| s.as_u16()).unwrap_or(0)
    }
}

/// Records status and body size while passing every call through untouched.
pub struct ResponseObserver<'a> {
    pub(super) inner: &'a mut dyn ResponseWriter,
    pub(super) state: Observation,
}

impl<'a> ResponseObserver<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self {
            inner,
            state: Observation::default(),
        }
    }

    pub fn observation(&self) -> Observation {
        self.state
    }

    pub(super) fn ensure_status(&mut self) {
        if !self.state.wrote_header {
            self.set_status(StatusCode::OK);
        }
    }
}

#[async_trait]
impl<'a> ResponseWriter for ResponseObserver<'a> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.state.status = Some(status);
        self.state.wrote_header = true;
        self.inner.set_status(status);
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_status();
        let n = self.inner.write(buf).await?;
        self.state.written += n as u64;
        Ok(n)
    }

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }
}

#[async_trait]
impl<'a> Flush for ResponseObserver<'a> {
    async fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_flush() {
            Some(flusher) => flusher.flush().await,
            None => Ok(()),
        }
    }
}
