use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use std::io;
use tokio::io::AsyncRead;

use super::{Flush, ReadFrom, ResponseWriter};

/// Collects a whole response in memory and turns it into an axum
/// [`Response`] once the handler is done.
///
/// Flushing is accepted but has no effect until the response is handed back
/// to the server. There is no connection to hijack or watch.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status the client will see; 200 when the handler never set one.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[async_trait]
impl ResponseWriter for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }

    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        Some(self)
    }
}

#[async_trait]
impl Flush for BufferedResponse {
    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ReadFrom for BufferedResponse {
    async fn read_from(&mut self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> io::Result<u64> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        tokio::io::copy(reader, &mut self.body).await
    }
}
