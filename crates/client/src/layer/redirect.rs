use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode, header};
use tracing::debug;
use url::Url;

use crate::handler::Handler;
use crate::protocol::{HttpError, Message, Request, Response};

/// Headers only forwarded when the redirect stays on the same domain or a subdomain of it.
const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "www-authenticate", "cookie", "cookie2"];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RedirectPolicy {
    pub enabled: bool,
    /// Redirects followed at most per call.
    pub limit: usize,
    /// Copy the request headers to the redirected request.
    pub forward_headers: bool,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self { enabled: true, limit: 3, forward_headers: true }
    }
}

/// Put in the context of the request that used up the redirect budget.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RedirectLimitReached;

/// Follows `3xx` responses carrying a `Location`.
///
/// The policy of the layer applies unless the request context carries a [`RedirectPolicy`].
#[derive(Debug)]
pub struct RedirectLayer<H> {
    inner: H,
    policy: RedirectPolicy,
}

impl<H> RedirectLayer<H> {
    pub fn new(inner: H) -> Self {
        Self::with_policy(inner, RedirectPolicy::default())
    }

    pub fn with_policy(inner: H, policy: RedirectPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: Handler> Handler for RedirectLayer<H> {
    async fn call(&self, request: Request) -> Result<Response, HttpError> {
        let policy = request.context().get::<RedirectPolicy>().copied().unwrap_or(self.policy);
        if !policy.enabled || policy.limit == 0 {
            return self.inner.call(request).await;
        }

        let mut request = request;
        let mut count = 0;
        loop {
            validate(&request)?;
            let response = self.inner.call(request).await?;

            if count == policy.limit || !response.is_redirect() {
                return Ok(response);
            }
            let location = response.headers().get_str(header::LOCATION).trim().to_string();
            if location.is_empty() {
                return Ok(response);
            }

            request = follow(response, &location, policy.forward_headers)?;
            count += 1;
            if count == policy.limit {
                request.context_mut().insert(RedirectLimitReached);
            }
            debug!(count, target = request.target(), "following redirect");
        }
    }
}

/// Only absolute http and websocket urls with a host are sent.
fn validate(request: &Request) -> Result<(), HttpError> {
    let url = request.url().ok_or_else(|| HttpError::invalid_url(request.target(), "request has no url"))?;
    if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
        return Err(HttpError::invalid_url(url, format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(HttpError::invalid_url(url, "missing host"));
    }
    Ok(())
}

/// Builds the request `response` redirects to. `response` becomes its parent.
fn follow(response: Response, location: &str, forward_headers: bool) -> Result<Request, HttpError> {
    let previous = response.request().ok_or(HttpError::InvalidState("redirect response without request"))?;
    let base = previous.url().ok_or(HttpError::InvalidState("redirected request without url"))?;
    let url = base.join(location).map_err(|e| HttpError::invalid_url(location, e))?;

    let see_other = response.status() == StatusCode::SEE_OTHER;
    let method = if see_other && previous.method() != Method::HEAD { Method::GET } else { previous.method().clone() };
    let body = if see_other { Bytes::new() } else { previous.body().clone() };

    let mut next = Request::new(method, url).with_version(previous.version()).with_body(body);
    if forward_headers {
        let keep_sensitive = same_domain(&next, base);
        let headers = previous.headers().iter().filter(|h| {
            h.name != header::HOST
                && (keep_sensitive || !SENSITIVE_HEADERS.contains(&h.name.as_str()))
                && !(see_other && (h.name == header::CONTENT_TYPE || h.name == header::CONTENT_LENGTH))
        });
        next.headers_mut().extend(headers.cloned());
    }
    next.set_context(previous.context().clone());
    next.set_parent(response);
    Ok(next)
}

fn same_domain(next: &Request, base: &Url) -> bool {
    match (next.url().and_then(Url::host_str), base.host_str()) {
        (Some(new), Some(old)) => is_domain_or_subdomain(new, old),
        _ => false,
    }
}

/// `sub` equals `parent` or is a dot delimited subdomain of it.
fn is_domain_or_subdomain(sub: &str, parent: &str) -> bool {
    let (sub, parent) = (sub.to_ascii_lowercase(), parent.to_ascii_lowercase());
    sub == parent || sub.strip_suffix(parent.as_str()).is_some_and(|rest| rest.ends_with('.'))
}
