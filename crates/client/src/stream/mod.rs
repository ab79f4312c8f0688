//! Per message framing engine.
//!
//! A [`Stream`] binds one message to one [`Transaction`] and one [`Parser`] for the
//! duration of a single exchange. The write side frames the outgoing message's body
//! (chunked or fixed length), the read side parses the incoming head, strips the body
//! framing and decides when the connection can be handed to the next exchange and
//! when it must be closed.
//!
//! The stream borrows the transaction, so it cannot outlive it; whoever owns the
//! transaction can still close the connection after the stream is gone.

use std::fmt;
use std::io;

use bytes::{Buf, Bytes, BytesMut};
use http::{HeaderValue, Version, header};
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

use crate::codec::body::PayloadEncoder;
use crate::codec::{EncodeHead, Parser};
use crate::ensure;
use crate::protocol::{HttpError, Message, PayloadItem, PayloadSize, Request, Response};
use crate::transport::Transaction;

mod side;
pub(crate) use side::content_length;
pub use side::StreamSide;

/// Upper bound of a single read from the transaction.
const READ_SIZE: usize = 16 * 1024;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Bytes of the incoming body still to be read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Remaining {
    Known(u64),
    /// chunked or EOF delimited, known only once the parser reports completion
    Unknown,
}

pub struct Stream<'t, M, T: ?Sized> {
    message: M,
    parser: Parser,
    transaction: &'t mut T,
    encoder: Option<PayloadEncoder>,
    read_size: Option<PayloadSize>,
    remaining: Remaining,
}

impl<M: fmt::Debug, T: ?Sized> fmt::Debug for Stream<'_, M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("message", &self.message)
            .field("encoder", &self.encoder)
            .field("read_size", &self.read_size)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl<'t, M: StreamSide, T: Transaction + ?Sized> Stream<'t, M, T> {
    pub fn new(message: M, transaction: &'t mut T) -> Self {
        Self {
            message,
            parser: Parser::new(),
            transaction,
            encoder: None,
            read_size: None,
            remaining: Remaining::Known(0),
        }
    }

    pub fn message(&self) -> &M {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut M {
        &mut self.message
    }

    pub fn into_message(self) -> M {
        self.message
    }

    pub fn transaction(&mut self) -> &mut T {
        self.transaction
    }

    /// Body bytes written so far, `None` until the head has been written.
    pub fn bytes_written(&self) -> Option<u64> {
        self.encoder.as_ref().map(PayloadEncoder::written)
    }

    /// How the incoming body is framed, `None` until the head has been read.
    pub fn read_framing(&self) -> Option<PayloadSize> {
        self.read_size
    }

    /// Acquires the write lock and writes the outgoing head. Idempotent.
    ///
    /// Without `Content-Length`, `Transfer-Encoding` or `Upgrade` the body is sent
    /// chunked and `Transfer-Encoding: chunked` is added to the head.
    pub async fn start_write(&mut self) -> Result<(), HttpError> {
        if self.encoder.is_some() {
            return Ok(());
        }
        if !self.transaction.is_writable() {
            self.transaction.start_write().await?;
        }

        let outgoing = self.message.outgoing_mut().ok_or(HttpError::InvalidState("no outgoing message to write"))?;
        let headers = outgoing.headers();
        let undeclared = !headers.contains(header::CONTENT_LENGTH)
            && !headers.contains(header::TRANSFER_ENCODING)
            && !headers.contains(header::UPGRADE);

        let encoder = if undeclared && M::may_chunk(outgoing) {
            outgoing.headers_mut().append(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            PayloadEncoder::chunked()
        } else if outgoing.is_chunked() {
            PayloadEncoder::chunked()
        } else {
            PayloadEncoder::fix_length(content_length(outgoing)?)
        };

        let mut dst = BytesMut::new();
        outgoing.encode_head(&mut dst)?;
        self.transaction.write(&dst).await?;
        trace!(head = dst.len(), chunked = encoder.is_chunked(), "wrote head");
        self.encoder = Some(encoder);
        Ok(())
    }

    /// Writes body bytes, framed as the head declared. Returns the number of body bytes.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<usize, HttpError> {
        self.start_write().await?;
        if bytes.is_empty() {
            return Ok(0);
        }
        let encoder = self.encoder.as_mut().ok_or(HttpError::InvalidState("write side not started"))?;
        let mut dst = BytesMut::with_capacity(bytes.len() + 16);
        encoder.encode(PayloadItem::Chunk(bytes), &mut dst)?;
        self.transaction.write(&dst).await?;
        Ok(bytes.len())
    }

    /// Terminates a chunked body with `0\r\n\r\n`, once. No-op for fixed length bodies.
    pub async fn close_body(&mut self) -> Result<(), HttpError> {
        self.start_write().await?;
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        if encoder.is_chunked() && !encoder.is_finish() {
            let mut dst = BytesMut::with_capacity(5);
            encoder.encode(PayloadItem::<&[u8]>::Eof, &mut dst)?;
            self.transaction.write(&dst).await?;
            trace!("wrote last chunk");
        }
        Ok(())
    }

    /// Waits for the read turn and parses the incoming head.
    ///
    /// A client skips provisional `1xx` heads; a server answers `Expect: 100-continue`
    /// before returning.
    pub async fn start_read(&mut self) -> Result<(), HttpError> {
        if self.read_size.is_some() {
            return Ok(());
        }
        if !self.transaction.is_readable() {
            self.transaction.start_read().await?;
        }

        self.parser.reset();
        let mut buf = BytesMut::new();
        while !self.parse_final_head(&mut buf)? {
            let raw = self.transaction.read_available(READ_SIZE).await?;
            if raw.is_empty() {
                return Err(HttpError::eof(format!("connection closed after {} bytes of message head", buf.len())));
            }
            buf.extend_from_slice(&raw);
        }
        self.finish_head().await
    }

    /// Parses heads off the front of `buf`, skipping provisional ones. Once the final
    /// head is parsed the bytes after it are pushed back to the transaction.
    fn parse_final_head(&mut self, buf: &mut BytesMut) -> Result<bool, HttpError> {
        loop {
            if !self.parser.parse_head(buf, &mut self.message)? {
                return Ok(false);
            }
            if !self.message.is_provisional() {
                self.transaction.unread(buf.split().freeze());
                return Ok(true);
            }
            debug!("skipping provisional head");
            self.parser.reset();
        }
    }

    async fn finish_head(&mut self) -> Result<(), HttpError> {
        if self.message.expects_continue() {
            if !self.transaction.is_writable() {
                self.transaction.start_write().await?;
            }
            self.transaction.write(CONTINUE).await?;
            debug!("receive expect request header, sent continue response");
        }

        let size = self.message.read_framing()?;
        self.parser.set_payload(size);
        self.remaining = match size {
            PayloadSize::Length(length) => Remaining::Known(length),
            PayloadSize::Chunked | PayloadSize::UntilEof => Remaining::Unknown,
        };
        self.read_size = Some(size);
        trace!(?size, "read head");
        Ok(())
    }

    /// True once the body has been read entirely or the peer closed the connection.
    pub async fn eof(&mut self) -> Result<bool, HttpError> {
        self.start_read().await?;
        if self.remaining == Remaining::Known(0) {
            return Ok(true);
        }
        Ok(self.transaction.eof().await?)
    }

    /// Reads the next piece of body, empty when nothing is left.
    pub async fn read_available(&mut self) -> Result<Bytes, HttpError> {
        let size = self.read_size.ok_or(HttpError::InvalidState("message head not read"))?;
        let max = match self.remaining {
            Remaining::Known(0) => return Ok(Bytes::new()),
            Remaining::Known(n) => usize::try_from(n).map_or(READ_SIZE, |n| n.min(READ_SIZE)),
            Remaining::Unknown => READ_SIZE,
        };

        let raw = self.transaction.read_available(max).await?;
        if size.is_chunked() {
            let (body, excess) = self.parser.parse_body(raw)?;
            self.transaction.unread(excess);
            if self.parser.body_complete() {
                self.remaining = Remaining::Known(0);
            }
            return Ok(body);
        }

        if let Remaining::Known(n) = self.remaining {
            let len = raw.len() as u64;
            ensure!(len <= n, HttpError::InvalidState("read past the end of the body"));
            self.remaining = Remaining::Known(n - len);
        }
        Ok(raw)
    }

    /// Reads the rest of the body.
    pub async fn read_body(&mut self) -> Result<Bytes, HttpError> {
        let mut body = BytesMut::new();
        while !self.eof().await? {
            body.extend_from_slice(&self.read_available().await?);
        }
        Ok(body.freeze())
    }

    /// Reads the trailer section of a completed chunked body and appends it to the headers.
    pub async fn read_trailers(&mut self) -> Result<(), HttpError> {
        if self.read_size != Some(PayloadSize::Chunked) {
            return Ok(());
        }
        ensure!(self.parser.body_complete(), HttpError::InvalidState("trailers read before the body"));

        while !self.parser.message_complete() {
            let raw = self.transaction.read_available(READ_SIZE).await?;
            if raw.is_empty() {
                self.transaction.close().await;
                return Err(HttpError::eof("connection closed before the trailer section ended"));
            }
            let (_, excess) = self.parser.parse_body(raw)?;
            self.transaction.unread(excess);
        }

        let trailers = self.parser.take_trailers()?;
        trace!(count = trailers.len(), "read trailers");
        self.message.headers_mut().extend(trailers);
        Ok(())
    }

    fn is_message_complete(&self) -> bool {
        match self.read_size {
            Some(PayloadSize::Chunked) => self.parser.message_complete(),
            Some(_) => self.remaining == Remaining::Known(0),
            None => false,
        }
    }
}

impl<T: Transaction + ?Sized> Stream<'_, Response, T> {
    /// True when the server answered with an error and `Connection: close` while the
    /// request is still being written: the rest of the request body would be dropped.
    pub fn is_aborted(&self) -> bool {
        self.transaction.is_writable() && self.message.is_error() && self.message.has_connection_close()
    }

    /// Writes `body` as the whole request body while watching for the response.
    ///
    /// A response head arriving mid-body is parsed right away; when it aborts the
    /// request (see [`is_aborted`](Self::is_aborted)) the rest of the body is not sent.
    pub async fn send_body(&mut self, body: &[u8]) -> Result<(), HttpError> {
        self.start_write().await?;
        let encoder = self.encoder.as_mut().ok_or(HttpError::InvalidState("write side not started"))?;
        let mut framed = BytesMut::with_capacity(body.len() + 16);
        if !body.is_empty() {
            encoder.encode(PayloadItem::Chunk(body), &mut framed)?;
        }
        if encoder.is_chunked() && !encoder.is_finish() {
            encoder.encode(PayloadItem::<&[u8]>::Eof, &mut framed)?;
        }

        let mut head = BytesMut::new();
        if self.read_size.is_none() {
            self.parser.reset();
        }
        while !framed.is_empty() {
            if self.read_size.is_some() {
                if self.is_aborted() {
                    debug!(unsent = framed.len(), "response aborted the request body");
                    return Ok(());
                }
                self.transaction.write(&framed).await?;
                break;
            }

            match self.transaction.write_some(&framed).await? {
                Some(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Some(written) => framed.advance(written),
                None => {
                    head.extend_from_slice(&self.transaction.read_available(READ_SIZE).await?);
                    if self.parse_final_head(&mut head)? {
                        self.finish_head().await?;
                    }
                }
            }
        }

        if self.read_size.is_none() {
            self.transaction.unread(head.freeze());
        }
        Ok(())
    }

    /// Ends the request: terminates the body and releases the write lock.
    pub async fn close_write(&mut self) -> Result<(), HttpError> {
        if !self.transaction.is_writable() {
            return Ok(());
        }
        self.close_body().await?;
        self.transaction.close_write().await?;
        Ok(())
    }

    /// Ends the response: drains what is left of the body and either hands the
    /// connection to the next exchange or closes it.
    pub async fn close_read(&mut self) -> Result<(), HttpError> {
        while !self.eof().await? {
            self.read_available().await?;
        }

        let chunked = self.read_size == Some(PayloadSize::Chunked);
        if chunked && self.parser.body_complete() {
            self.read_trailers().await?;
        }

        if chunked && !self.parser.body_complete() {
            self.transaction.close().await;
            return Err(HttpError::eof("connection closed before the last chunk"));
        }
        if let Remaining::Known(n @ 1..) = self.remaining {
            self.transaction.close().await;
            return Err(HttpError::eof(format!("connection closed with {n} bytes of body missing")));
        }

        let request_close = self.message.request().is_some_and(Message::has_connection_close);
        if self.message.has_connection_close() || request_close || self.read_size == Some(PayloadSize::UntilEof) {
            debug!(status = self.message.status().as_u16(), "closing connection after response");
            self.transaction.close().await;
        } else if self.transaction.is_readable() {
            self.transaction.close_read();
        }
        Ok(())
    }
}

impl<T: Transaction + ?Sized> Stream<'_, Request, T> {
    /// Ends the reply. Closes the connection when either side asked for it.
    pub async fn close_write(&mut self) -> Result<(), HttpError> {
        ensure!(self.transaction.is_writable(), HttpError::InvalidState("write side is not open"));
        self.close_body().await?;
        self.transaction.close_write().await?;

        let keep_alive = self.message.headers().contains_token(header::CONNECTION, "keep-alive");
        let http10_close = self.message.version() == Version::HTTP_10 && !keep_alive;
        let reply_close = self.message.response().is_some_and(Message::has_connection_close);
        if self.message.has_connection_close() || reply_close || http10_close {
            debug!("closing connection after reply");
            self.transaction.close().await;
        }
        Ok(())
    }

    /// Ends the request. An incompletely read request closes the connection.
    pub async fn close_read(&mut self) -> Result<(), HttpError> {
        if !self.is_message_complete() {
            self.transaction.close().await;
            return Err(HttpError::eof("request closed before it was read completely"));
        }
        if self.transaction.is_readable() {
            self.transaction.close_read();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
