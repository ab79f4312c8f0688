//! Transport seam of the client.
//!
//! A [`Transaction`] is one logical exchange over a possibly shared physical
//! connection. It holds the connection's write lock and its read turn
//! independently; read turns are granted in the order write locks were acquired, so
//! pipelined responses are read in request order.
//!
//! A [`Connector`] hands out transactions for an [`Endpoint`]. The bundled
//! implementation is a [`Pool`] over a [`Dialer`], by default the [`TcpDialer`].
//! Encryption is reached through the [`TlsUpgrade`] hook; no TLS stack is bundled.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

mod connection;
pub use connection::Connection;
pub use connection::ConnectionTransaction;

mod pool;
pub use pool::Pool;
pub use pool::PoolConfig;

mod tcp;
pub use tcp::TcpDialer;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Plain,
    Tls,
}

impl SocketKind {
    /// `https` and `wss` are encrypted, every other scheme is plain.
    pub fn for_scheme(scheme: &str) -> Self {
        if scheme.eq_ignore_ascii_case("https") || scheme.eq_ignore_ascii_case("wss") {
            SocketKind::Tls
        } else {
            SocketKind::Plain
        }
    }
}

/// Where a connection goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub kind: SocketKind,
}

impl Endpoint {
    pub fn new<H: Into<String>>(host: H, port: u16, kind: SocketKind) -> Self {
        Self { host: host.into(), port, kind }
    }

    /// `host:port`, as used by a CONNECT request line.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A bidirectional byte stream a connection can run over.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

pub type BoxIo = Box<dyn Io>;

#[async_trait]
pub trait Transaction: Send {
    /// Whether the underlying connection is still usable.
    fn is_open(&self) -> bool;

    /// Whether this transaction holds the write lock.
    fn is_writable(&self) -> bool;

    /// Whether this transaction holds the read turn.
    fn is_readable(&self) -> bool;

    /// Acquires the write lock, no-op when already held.
    async fn start_write(&mut self) -> io::Result<()>;

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Writes a prefix of `bytes` and returns its length, or `None` without writing
    /// once data from the peer is waiting on this transaction's read turn.
    ///
    /// Lets a request body be cut short when the response arrives first.
    async fn write_some(&mut self, bytes: &[u8]) -> io::Result<Option<usize>> {
        self.write(bytes).await?;
        Ok(Some(bytes.len()))
    }

    /// Flushes and releases the write lock.
    async fn close_write(&mut self) -> io::Result<()>;

    /// Waits for this transaction's read turn and acquires it, no-op when already held.
    async fn start_read(&mut self) -> io::Result<()>;

    /// Returns at most `max` bytes, waiting for the peer if nothing is buffered.
    ///
    /// An empty result means the peer closed its side.
    async fn read_available(&mut self, max: usize) -> io::Result<Bytes>;

    /// Pushes bytes back so the next read returns them first.
    fn unread(&mut self, bytes: Bytes);

    /// True when nothing is buffered and the peer closed its side. May wait for the peer.
    async fn eof(&mut self) -> io::Result<bool>;

    /// Releases the read turn, handing it to the next transaction.
    fn close_read(&mut self);

    /// Closes the whole connection, for this and every other transaction on it.
    async fn close(&mut self);

    /// Replaces the connection's stream with an encrypted one for `host`.
    async fn upgrade(&mut self, host: &str) -> io::Result<()>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Transaction: Transaction;

    /// Acquires a transaction for `endpoint`. With `reuse` false a fresh connection is
    /// opened and never shared.
    async fn connect(&self, endpoint: &Endpoint, reuse: bool) -> io::Result<Self::Transaction>;
}

/// Opens raw connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, endpoint: &Endpoint) -> io::Result<BoxIo>;

    /// The hook used to upgrade connections in place, for CONNECT tunnels.
    fn tls(&self) -> Option<Arc<dyn TlsUpgrade>> {
        None
    }
}

/// Wraps an established stream in TLS for `host`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TlsUpgrade: Send + Sync {
    async fn upgrade(&self, io: BoxIo, host: &str) -> io::Result<BoxIo>;
}
