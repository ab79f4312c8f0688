use std::sync::Arc;

use http::Method;
use tracing::{debug, info};
use url::Url;

use crate::handler::Handler;
use crate::layer::{ConnectOptions, ConnectionLayer, DefaultHeadersLayer, RedirectLayer, RedirectPolicy, StreamLayer};
use crate::protocol::{HttpError, Request, Response};
use crate::proxy::ProxyConfig;
use crate::transport::{Connector, Pool, PoolConfig, SocketKind, TcpDialer, TlsUpgrade};

pub struct ClientBuilder {
    proxy: Option<ProxyConfig>,
    redirect: RedirectPolicy,
    socket_kind: Option<SocketKind>,
    pool: PoolConfig,
    tls: Option<Arc<dyn TlsUpgrade>>,
}

impl ClientBuilder {
    fn new() -> Self {
        Self { proxy: None, redirect: RedirectPolicy::default(), socket_kind: None, pool: PoolConfig::default(), tls: None }
    }

    /// Proxy settings, read from the environment when not set.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn redirect(mut self, policy: RedirectPolicy) -> Self {
        self.redirect = policy;
        self
    }

    /// Forces the socket kind instead of deriving it from the url scheme.
    pub fn socket_kind(mut self, kind: SocketKind) -> Self {
        self.socket_kind = Some(kind);
        self
    }

    /// How many requests may be in flight on one pooled connection.
    pub fn pipeline_limit(mut self, limit: usize) -> Self {
        self.pool.pipeline_limit = limit;
        self
    }

    /// TLS hook used for `https` targets and CONNECT tunnels.
    pub fn tls(mut self, tls: Arc<dyn TlsUpgrade>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Builds a client over a [`Pool`] of TCP connections.
    pub fn build(self) -> Client {
        let dialer = match &self.tls {
            Some(tls) => TcpDialer::with_tls(Arc::clone(tls)),
            None => TcpDialer::new(),
        };
        let pool = Pool::with_config(dialer, self.pool);
        self.build_with(pool)
    }

    /// Builds a client over a custom connector. The pipeline limit and TLS hook are
    /// the connector's business then.
    pub fn build_with<C: Connector>(self, connector: C) -> Client<C> {
        let proxy = self.proxy.unwrap_or_else(ProxyConfig::from_env);
        let options = ConnectOptions { socket_kind: self.socket_kind, ..ConnectOptions::default() };
        info!(redirect_limit = self.redirect.limit, pipelining = self.pool.pipeline_limit, "client built");

        let connection = ConnectionLayer::new(connector, StreamLayer).with_proxy(proxy).with_options(options);
        Client { pipeline: RedirectLayer::with_policy(DefaultHeadersLayer::new(connection), self.redirect) }
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("proxy", &self.proxy)
            .field("redirect", &self.redirect)
            .field("socket_kind", &self.socket_kind)
            .field("pool", &self.pool)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

/// HTTP/1.1 client: redirects, proxies and pooled connections over the framing engine.
#[derive(Debug)]
pub struct Client<C = Pool<TcpDialer>> {
    pipeline: RedirectLayer<DefaultHeadersLayer<ConnectionLayer<C, StreamLayer>>>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn new() -> Self {
        Self::builder().build()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> Client<C> {
    pub fn connector(&self) -> &C {
        self.pipeline.inner().inner().connector()
    }

    /// Sends `request` and returns the final response, after any redirects.
    ///
    /// Each attempt declaring none of `Content-Length`, `Transfer-Encoding` and
    /// `Upgrade` gets the length of its body as `Content-Length`.
    pub async fn send(&self, request: Request) -> Result<Response, HttpError> {
        debug!(method = %request.method(), url = ?request.url().map(Url::as_str), "sending request");
        self.pipeline.call(request).await
    }

    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::invalid_url(url, e))?;
        self.send(Request::new(Method::GET, url)).await
    }
}
