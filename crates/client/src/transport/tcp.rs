use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::transport::{BoxIo, Dialer, Endpoint, SocketKind, TlsUpgrade};

/// Dials plain TCP connections, wrapping them with the configured [`TlsUpgrade`]
/// when the endpoint asks for TLS.
#[derive(Clone, Default)]
pub struct TcpDialer {
    tls: Option<Arc<dyn TlsUpgrade>>,
}

impl TcpDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tls(tls: Arc<dyn TlsUpgrade>) -> Self {
        Self { tls: Some(tls) }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, endpoint: &Endpoint) -> io::Result<BoxIo> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "can't set nodelay");
        }
        info!(endpoint = %endpoint.authority(), "tcp connected");

        match endpoint.kind {
            SocketKind::Plain => Ok(Box::new(stream)),
            SocketKind::Tls => match &self.tls {
                Some(tls) => tls.upgrade(Box::new(stream), &endpoint.host).await,
                None => Err(io::Error::new(io::ErrorKind::Unsupported, "no tls upgrade configured")),
            },
        }
    }

    fn tls(&self) -> Option<Arc<dyn TlsUpgrade>> {
        self.tls.clone()
    }
}

impl fmt::Debug for TcpDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpDialer").field("tls", &self.tls.is_some()).finish()
    }
}
