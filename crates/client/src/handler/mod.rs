//! Pipeline handler traits.
//!
//! The client pipeline is a chain of [`Handler`]s turning a [`Request`] into its
//! [`Response`]. The innermost piece works on an established exchange instead and
//! implements [`StreamHandler`].

use async_trait::async_trait;

use crate::protocol::{HttpError, Request, Response};
use crate::stream::Stream;
use crate::transport::Transaction;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Request) -> Result<Response, HttpError>;
}

/// Drives one exchange on a stream whose response is bound to the request being sent.
#[async_trait]
pub trait StreamHandler<T: Transaction + ?Sized>: Send + Sync {
    async fn call(&self, stream: &mut Stream<'_, Response, T>) -> Result<(), HttpError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HttpError>> + Send,
{
    async fn call(&self, request: Request) -> Result<Response, HttpError> {
        (self.f)(request).await
    }
}

pub fn make_handler<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Result<Response, HttpError>>,
{
    HandlerFn { f }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for std::sync::Arc<H> {
    async fn call(&self, request: Request) -> Result<Response, HttpError> {
        (**self).call(request).await
    }
}
