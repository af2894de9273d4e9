//! Response writers and the observers that wrap them.
//!
//! A [`ResponseWriter`] only has to support headers, status and body writes.
//! Everything else is an optional capability the hosting server may or may
//! not provide, discovered at runtime through the `as_*` queries.

mod buffered;
mod capable;
mod mock;
mod observer;

pub use buffered::*;
pub use capable::*;
pub use mock::*;
pub use observer::*;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

#[async_trait]
pub trait ResponseWriter: Send {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Send the status line. Only the first call reaches the client.
    fn set_status(&mut self, status: StatusCode);

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        None
    }

    fn as_close_notify(&mut self) -> Option<&mut dyn CloseNotify> {
        None
    }

    fn as_hijack(&mut self) -> Option<&mut dyn Hijack> {
        None
    }

    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        None
    }
}

/// Push buffered body bytes to the client.
#[async_trait]
pub trait Flush: Send {
    async fn flush(&mut self) -> io::Result<()>;
}

/// Learn when the client goes away. The receiver flips to `true` once the
/// underlying connection is closed.
pub trait CloseNotify: Send {
    fn close_notify(&mut self) -> watch::Receiver<bool>;
}

/// Take over the raw connection. After a successful hijack the writer must
/// not be used again.
pub trait Hijack: Send {
    fn hijack(&mut self) -> io::Result<Hijacked>;
}

/// Copy a body straight from a reader, letting the writer use whatever
/// transfer path it has.
#[async_trait]
pub trait ReadFrom: Send {
    async fn read_from(&mut self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> io::Result<u64>;
}

pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

/// A connection taken over from the server, with any bytes the server had
/// already read past the request head.
pub struct Hijacked {
    pub conn: Box<dyn Connection>,
    pub buffered: Bytes,
}

impl std::fmt::Debug for Hijacked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hijacked")
            .field("buffered", &self.buffered.len())
            .finish_non_exhaustive()
    }
}

/// Result of querying a writer for its optional capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub flush: bool,
    pub close_notify: bool,
    pub hijack: bool,
    pub read_from: bool,
}

impl Capabilities {
    pub fn of(writer: &mut dyn ResponseWriter) -> Self {
        Self {
            flush: writer.as_flush().is_some(),
            close_notify: writer.as_close_notify().is_some(),
            hijack: writer.as_hijack().is_some(),
            read_from: writer.as_read_from().is_some(),
        }
    }

    pub fn all() -> Self {
        Self {
            flush: true,
            close_notify: true,
            hijack: true,
            read_from: true,
        }
    }

    pub fn is_full(&self) -> bool {
        self.flush && self.close_notify && self.hijack && self.read_from
    }
}

/// The observer chosen for one request.
///
/// Writers that support every optional capability get a
/// [`CapableObserver`]; anything less gets the plain [`ResponseObserver`].
/// There is no partial variant, so a handler that finds one capability on
/// the observer finds the same set it would on a capable server.
pub enum Observer<'a> {
    Plain(ResponseObserver<'a>),
    Capable(CapableObserver<'a>),
}

impl<'a> Observer<'a> {
    pub fn new(writer: &'a mut dyn ResponseWriter) -> Self {
        if Capabilities::of(&mut *writer).is_full() {
            Self::Capable(CapableObserver::new(writer))
        } else {
            Self::Plain(ResponseObserver::new(writer))
        }
    }

    pub fn is_capable(&self) -> bool {
        matches!(self, Self::Capable(_))
    }

    pub fn writer(&mut self) -> &mut dyn ResponseWriter {
        match self {
            Self::Plain(observer) => observer,
            Self::Capable(observer) => observer,
        }
    }

    pub fn observation(&self) -> Observation {
        match self {
            Self::Plain(observer) => observer.observation(),
            Self::Capable(observer) => observer.observation(),
        }
    }
}

pub(crate) fn unsupported(capability: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("response writer does not support {capability}"),
    )
}
