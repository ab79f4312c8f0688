use async_trait::async_trait;
use http::{HeaderValue, header};

use crate::handler::Handler;
use crate::protocol::{HttpError, Message, Request, Response};

/// Fills in the headers every request on the wire should carry.
///
/// A request declaring none of `Content-Length`, `Transfer-Encoding` and `Upgrade`
/// gets the length of its in-memory body as `Content-Length`, `0` included. Placed
/// inside the [`RedirectLayer`](crate::layer::RedirectLayer) it applies to every
/// followed redirect as well.
#[derive(Debug)]
pub struct DefaultHeadersLayer<H> {
    inner: H,
}

impl<H> DefaultHeadersLayer<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: Handler> Handler for DefaultHeadersLayer<H> {
    async fn call(&self, mut request: Request) -> Result<Response, HttpError> {
        let headers = request.headers();
        if !headers.contains(header::CONTENT_LENGTH)
            && !headers.contains(header::TRANSFER_ENCODING)
            && !headers.contains(header::UPGRADE)
        {
            let length = HeaderValue::from(request.body().len());
            request.headers_mut().set(header::CONTENT_LENGTH, length);
        }
        self.inner.call(request).await
    }
}
