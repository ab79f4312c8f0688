//! Head decoding for requests and responses.
//!
//! Parsing is done by `httparse`. Header names and values are not copied out of the
//! parser: their byte ranges are recorded first, then the head is split off the
//! source buffer and every value becomes a slice of that shared buffer.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum head size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use bytes::{Bytes, BytesMut};
use http::{HeaderName, HeaderValue, Method, StatusCode, Version};
use httparse::{Error, Status};
use tracing::trace;

use crate::ensure;
use crate::protocol::{Header, Headers, Message, ParseError, Request, Response};

/// Maximum number of headers allowed in a head
pub(crate) const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire head
pub(crate) const MAX_HEADER_BYTES: usize = 8 * 1024;

/// A message whose head can be parsed off the wire.
pub trait DecodeHead: Message {
    /// Parses a complete head from the front of `src` into `self`.
    ///
    /// Returns `Ok(false)` and leaves `src` untouched when more bytes are needed.
    /// On success the head bytes are consumed and the parsed headers replace the
    /// message's headers.
    fn decode_head(&mut self, src: &mut BytesMut) -> Result<bool, ParseError>;
}

impl DecodeHead for Request {
    fn decode_head(&mut self, src: &mut BytesMut) -> Result<bool, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let body_offset = match req.parse(src).map_err(map_httparse_error)? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => return partial(src),
        };
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let method = req.method.ok_or(ParseError::InvalidMethod)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
        let target = req.path.ok_or(ParseError::InvalidUri)?.to_string();
        let version = parse_version(req.version)?;

        let mut header_index = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];
        let header_count = req.headers.len();
        HeaderIndex::record(src, req.headers, &mut header_index);

        let header_bytes = src.split_to(body_offset).freeze();
        let headers = build_headers(&header_bytes, &header_index[..header_count])?;

        trace!(%method, target, ?version, header_count, "decoded request head");
        self.set_method(method);
        self.set_target(target);
        self.set_version(version);
        *self.headers_mut() = headers;
        Ok(true)
    }
}

impl DecodeHead for Response {
    fn decode_head(&mut self, src: &mut BytesMut) -> Result<bool, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut res = httparse::Response::new(&mut headers);

        let body_offset = match res.parse(src).map_err(map_httparse_error)? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => return partial(src),
        };
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let code = res.code.ok_or(ParseError::InvalidStatus)?;
        let status = StatusCode::from_u16(code).map_err(|_| ParseError::InvalidStatus)?;
        let version = parse_version(res.version)?;

        let mut header_index = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];
        let header_count = res.headers.len();
        HeaderIndex::record(src, res.headers, &mut header_index);

        let header_bytes = src.split_to(body_offset).freeze();
        let headers = build_headers(&header_bytes, &header_index[..header_count])?;

        trace!(status = status.as_u16(), ?version, header_count, "decoded response head");
        self.set_status(status);
        self.set_version(version);
        *self.headers_mut() = headers;
        Ok(true)
    }
}

fn partial(src: &BytesMut) -> Result<bool, ParseError> {
    ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
    Ok(false)
}

fn map_httparse_error(e: Error) -> ParseError {
    match e {
        Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        Error::Version => ParseError::InvalidVersion(None),
        Error::Status => ParseError::InvalidStatus,
        e => ParseError::invalid_header(e.to_string()),
    }
}

fn parse_version(version: Option<u8>) -> Result<Version, ParseError> {
    match version {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        v => Err(ParseError::InvalidVersion(v)),
    }
}

fn build_headers(header_bytes: &Bytes, indices: &[HeaderIndex]) -> Result<Headers, ParseError> {
    let mut headers = Headers::with_capacity(indices.len());
    for index in indices {
        let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
            .map_err(ParseError::invalid_header)?;
        headers.extend([Header::new(name, value)]);
    }
    Ok(headers)
}

/// Byte ranges of a header's name and value within the source buffer.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            indices.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            indices.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Parses a bare header block, as found in a chunked trailer section.
///
/// The block must end with an empty line. An empty block yields no fields.
pub(crate) fn decode_fields(block: &Bytes) -> Result<Headers, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let parsed = httparse::parse_headers(block, &mut headers).map_err(map_httparse_error)?;
    let fields = match parsed {
        Status::Complete((_, fields)) => fields,
        Status::Partial => return Err(ParseError::invalid_header("incomplete trailer section")),
    };

    let mut header_index = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];
    HeaderIndex::record(block, fields, &mut header_index);
    build_headers(block, &header_index[..fields.len()])
}
