//! Approximate inbound request size.
//!
//! The estimate is a lower bound on the wire size: it adds up the request
//! target, method, protocol, host, header names and values and the declared
//! body length, without separators or framing. Form fields are assumed to
//! be part of the target already. The body itself is never read.

use axum::body::HttpBody;
use axum::http::{HeaderMap, Method, Uri, Version, header};
use tokio::sync::oneshot;

use crate::handler::Request;

/// The parts of a request the estimate needs, detached from the body so the
/// computation can run while the handler consumes the request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub version: Version,
    pub host: String,
    pub headers: HeaderMap,
    /// `None` when the length is not known up front
    pub content_length: Option<u64>,
}

impl RequestHead {
    pub fn from_request(req: &Request) -> Self {
        let host = req
            .uri()
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                req.headers()
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let content_length = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .or_else(|| req.body().size_hint().exact());

        Self {
            method: req.method().clone(),
            version: req.version(),
            host,
            headers: req.headers().clone(),
            content_length,
        }
    }

    /// Size estimate, starting from the length of the request target.
    pub fn estimate(&self, target_len: usize) -> u64 {
        let mut size = target_len as u64;
        size += self.method.as_str().len() as u64;
        size += protocol(self.version).len() as u64;
        size += self.host.len() as u64;

        // Host is already counted above
        for name in self.headers.keys().filter(|n| **n != header::HOST) {
            size += name.as_str().len() as u64;
            for value in self.headers.get_all(name) {
                size += value.len() as u64;
            }
        }

        if let Some(len) = self.content_length {
            size += len;
        }
        size
    }
}

/// Length of the request target as the client sent it in origin form:
/// path and query, never scheme or authority. HTTP/2 requests arrive with
/// an absolute URI whose authority is already counted as the host.
pub fn target_len(uri: &Uri) -> usize {
    uri.path_and_query().map_or(0, |pq| pq.as_str().len())
}

pub(crate) fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Run the estimate on its own task. The receiver yields the value exactly
/// once.
pub fn spawn_estimate(head: RequestHead, target_len: usize) -> oneshot::Receiver<u64> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        // receiver gone means the request was abandoned
        let _ = tx.send(head.estimate(target_len));
    });
    rx
}
