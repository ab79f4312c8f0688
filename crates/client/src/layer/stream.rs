use async_trait::async_trait;
use tracing::debug;

use crate::handler::StreamHandler;
use crate::protocol::{HttpError, Message, Response};
use crate::stream::Stream;
use crate::transport::Transaction;

/// The innermost handler: sends the request body, reads the response into memory.
///
/// The body stops short when the server refuses it early with an error and
/// `Connection: close`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamLayer;

#[async_trait]
impl<T: Transaction + ?Sized> StreamHandler<T> for StreamLayer {
    async fn call(&self, stream: &mut Stream<'_, Response, T>) -> Result<(), HttpError> {
        let body = stream.message().request().map(|request| request.body().clone()).unwrap_or_default();

        stream.send_body(&body).await?;
        stream.start_read().await?;
        let aborted = stream.is_aborted();
        if aborted {
            debug!(status = stream.message().status().as_u16(), "server refused the request body");
        } else {
            stream.close_write().await?;
        }

        let body = stream.read_body().await?;
        stream.message_mut().set_body(body);
        if aborted {
            stream.transaction().close().await;
        }
        stream.close_read().await
    }
}
