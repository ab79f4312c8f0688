//! Head encoding for requests and responses.
//!
//! The start line is followed by every header field in insertion order and the empty
//! line. Header names are written as stored, which for [`http::HeaderName`] means
//! lower case.

use bytes::{BufMut, BytesMut};
use http::Version;
use std::io;
use std::io::Write;
use tracing::error;

use crate::protocol::{Headers, Message, ParseError, Request, Response};

/// Initial buffer size allocated for head serialization
const INIT_HEADER_SIZE: usize = 1024;

/// A message whose head can be written to the wire.
pub trait EncodeHead: Message {
    fn encode_head(&self, dst: &mut BytesMut) -> Result<(), ParseError>;
}

impl EncodeHead for Request {
    fn encode_head(&self, dst: &mut BytesMut) -> Result<(), ParseError> {
        let version = version_str(self.version())?;
        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {version}\r\n", self.method(), self.target()).map_err(ParseError::invalid_header)?;
        encode_fields(self.headers(), dst);
        Ok(())
    }
}

impl EncodeHead for Response {
    fn encode_head(&self, dst: &mut BytesMut) -> Result<(), ParseError> {
        let version = version_str(self.version())?;
        let status = self.status();
        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{version} {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or(""))
            .map_err(ParseError::invalid_header)?;
        encode_fields(self.headers(), dst);
        Ok(())
    }
}

fn version_str(version: Version) -> Result<&'static str, ParseError> {
    match version {
        Version::HTTP_11 => Ok("HTTP/1.1"),
        Version::HTTP_10 => Ok("HTTP/1.0"),
        v => {
            error!(http_version = ?v, "unsupported http version");
            Err(ParseError::InvalidVersion(None))
        }
    }
}

fn encode_fields(headers: &Headers, dst: &mut BytesMut) {
    for header in headers {
        dst.put_slice(header.name.as_ref());
        dst.put_slice(b": ");
        dst.put_slice(header.value.as_ref());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

/// Writer appending to a `BytesMut` that already has capacity reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue, Method, StatusCode, header};

    #[test]
    fn request_head() {
        let request = Request::from_target(Method::POST, "/upload?x=1")
            .header(header::HOST, HeaderValue::from_static("example.com"))
            .header(HeaderName::from_static("x-trace"), HeaderValue::from_static("a"))
            .header(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let mut dst = BytesMut::new();
        request.encode_head(&mut dst).unwrap();

        let expected = "POST /upload?x=1 HTTP/1.1\r\nhost: example.com\r\nx-trace: a\r\ntransfer-encoding: chunked\r\n\r\n";
        assert_eq!(std::str::from_utf8(&dst).unwrap(), expected);
    }

    #[test]
    fn status_line() {
        let mut dst = BytesMut::new();
        Response::new(StatusCode::CONTINUE).encode_head(&mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.1 100 Continue\r\n\r\n");

        let mut dst = BytesMut::new();
        let mut response = Response::new(StatusCode::NOT_FOUND);
        response.set_version(Version::HTTP_10);
        response.encode_head(&mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.0 404 Not Found\r\n\r\n");
    }

    #[test]
    fn unsupported_version() {
        let request = Request::from_target(Method::GET, "/").with_version(Version::HTTP_2);
        assert!(request.encode_head(&mut BytesMut::new()).is_err());
    }
}
