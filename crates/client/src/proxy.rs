//! Proxy configuration.
//!
//! Settings are read once, usually with [`ProxyConfig::from_env`], and handed to the
//! [`ConnectionLayer`](crate::layer::ConnectionLayer). Nothing is looked up per request.

use tracing::warn;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    http_proxy: Option<Url>,
    https_proxy: Option<Url>,
    no_proxy: Vec<String>,
}

impl ProxyConfig {
    /// A configuration that never proxies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `http_proxy`, `https_proxy` and `no_proxy` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name to its value.
    ///
    /// For every setting the lowercase name is tried first, then the uppercase one;
    /// the first non-empty value wins.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let read = |lower: &str, upper: &str| {
            lookup(lower).filter(|v| !v.trim().is_empty()).or_else(|| lookup(upper).filter(|v| !v.trim().is_empty()))
        };

        let mut config = Self::new();
        config.http_proxy = read("http_proxy", "HTTP_PROXY").and_then(|v| parse_proxy("http_proxy", &v));
        config.https_proxy = read("https_proxy", "HTTPS_PROXY").and_then(|v| parse_proxy("https_proxy", &v));
        if let Some(list) = read("no_proxy", "NO_PROXY") {
            config = config.no_proxy(list.split(','));
        }
        config
    }

    pub fn http_proxy(mut self, proxy: Url) -> Self {
        self.http_proxy = Some(proxy);
        self
    }

    pub fn https_proxy(mut self, proxy: Url) -> Self {
        self.https_proxy = Some(proxy);
        self
    }

    /// Adds hosts that are reached directly. A leading `.` is ignored; every entry
    /// also matches its subdomains.
    pub fn no_proxy<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| host.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|host| !host.is_empty());
        self.no_proxy.extend(hosts);
        self
    }

    pub fn is_no_proxy(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.no_proxy
            .iter()
            .any(|entry| host == *entry || host.strip_suffix(entry.as_str()).is_some_and(|rest| rest.ends_with('.')))
    }

    /// The proxy to use for `url`, `None` when it should be reached directly.
    pub fn get_proxy(&self, url: &Url) -> Option<&Url> {
        if url.host_str().is_some_and(|host| self.is_no_proxy(host)) {
            return None;
        }
        match url.scheme() {
            "https" | "wss" => self.https_proxy.as_ref(),
            _ => self.http_proxy.as_ref(),
        }
    }
}

fn parse_proxy(name: &str, value: &str) -> Option<Url> {
    let value = value.trim();
    let parsed = if value.contains("://") { Url::parse(value) } else { Url::parse(&format!("http://{value}")) };
    match parsed {
        Ok(url) if url.host_str().is_some_and(|host| !host.is_empty()) => Some(url),
        Ok(_) => {
            warn!(name, value, "ignoring proxy setting without host");
            None
        }
        Err(e) => {
            warn!(name, value, error = %e, "ignoring unparsable proxy setting");
            None
        }
    }
}
