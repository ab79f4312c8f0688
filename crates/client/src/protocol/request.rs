//! HTTP request message.
//!
//! A [`Request`] is the unit every layer of the client pipeline passes around. Besides
//! the wire fields it carries:
//!
//! - the [`Url`] it is aimed at (absent for requests parsed off the wire by a server side stream)
//! - the `parent` [`Response`] that redirected to it, forming the redirect chain
//! - an opaque `context` ([`Extensions`]) handed through every layer unchanged
//! - on the server side, the `response` being written back

use bytes::Bytes;
use http::{Extensions, HeaderName, HeaderValue, Method, Version};
use url::Url;

use crate::protocol::{Headers, Message, Response};

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    url: Option<Url>,
    version: Version,
    headers: Headers,
    body: Bytes,
    parent: Option<Box<Response>>,
    response: Option<Box<Response>>,
    context: Extensions,
}

impl Request {
    /// Creates an HTTP/1.1 request for `url`, targeting its path and query.
    pub fn new(method: Method, url: Url) -> Self {
        let mut request = Self::from_target(method, resource(&url));
        request.url = Some(url);
        request
    }

    /// Creates a request with a raw request-line target and no url.
    pub fn from_target<T: Into<String>>(method: Method, target: T) -> Self {
        Self {
            method,
            target: target.into(),
            url: None,
            version: Version::HTTP_11,
            headers: Headers::new(),
            body: Bytes::new(),
            parent: None,
            response: None,
            context: Extensions::new(),
        }
    }

    /// Appends a header, builder style.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The request-line target: origin form, absolute form when proxied, or authority for CONNECT.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target<T: Into<String>>(&mut self, target: T) {
        self.target = target.into();
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Points the request at `url` and resets the target to its origin form.
    pub fn set_url(&mut self, url: Url) {
        self.target = resource(&url);
        self.url = Some(url);
    }

    pub fn context(&self) -> &Extensions {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Extensions {
        &mut self.context
    }

    pub(crate) fn set_context(&mut self, context: Extensions) {
        self.context = context;
    }

    /// The response that redirected to this request, if any.
    pub fn parent(&self) -> Option<&Response> {
        self.parent.as_deref()
    }

    pub fn set_parent(&mut self, parent: Response) {
        self.parent = Some(Box::new(parent));
    }

    /// Number of redirects that led to this request, 0 for an original request.
    pub fn redirect_count(&self) -> usize {
        match self.parent() {
            Some(parent) => 1 + parent.request().map_or(0, Request::redirect_count),
            None => 0,
        }
    }

    /// The reply attached by a server side stream.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_deref_mut()
    }

    pub fn set_response(&mut self, response: Response) {
        self.response = Some(Box::new(response));
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take().map(|response| *response)
    }
}

impl Message for Request {
    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn body(&self) -> &Bytes {
        &self.body
    }

    fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }
}

/// The origin-form target of `url`: its path plus the query, if any.
pub(crate) fn resource(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// The `Host` header value for `url`, the port is omitted when it is the scheme default.
pub(crate) fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
