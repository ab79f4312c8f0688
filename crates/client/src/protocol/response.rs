//! HTTP response message.
//!
//! A client side [`Response`] owns the [`Request`] it answers, so the value returned
//! from the pipeline still knows which url, headers and redirect chain produced it.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode, Version};

use crate::protocol::{Headers, Message, Request};

#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: Headers,
    body: Bytes,
    request: Option<Box<Request>>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self { status, version: Version::HTTP_11, headers: Headers::new(), body: Bytes::new(), request: None }
    }

    /// An empty response bound to `request`, ready to be filled by a client side stream.
    pub fn for_request(request: Request) -> Self {
        Self::new(StatusCode::OK).with_request(request)
    }

    pub fn with_request(mut self, request: Request) -> Self {
        self.request = Some(Box::new(request));
        self
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

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_deref()
    }

    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_deref_mut()
    }

    pub fn take_request(&mut self) -> Option<Request> {
        self.request.take().map(|request| *request)
    }

    /// Returns true for the statuses a client follows: 301, 302, 303, 307 and 308.
    ///
    /// 300 and 304 are redirection class too but carry no single target to follow.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status.as_u16(), 301 | 302 | 303 | 307 | 308)
    }

    /// Returns true for 4xx and 5xx statuses.
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

impl Message for Response {
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
