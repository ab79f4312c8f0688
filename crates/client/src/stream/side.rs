use http::{Method, StatusCode, Version, header};
use tracing::warn;

use crate::codec::{DecodeHead, EncodeHead};
use crate::protocol::{Message, ParseError, PayloadSize, Request, Response};

/// The part of stream behaviour that depends on which end of the exchange we are.
///
/// A client side stream is bound to a [`Response`]: it writes the response's request
/// and reads the response. A server side stream is bound to a [`Request`]: it reads
/// the request and writes the reply attached with [`Request::set_response`].
pub trait StreamSide: DecodeHead + Send {
    type Outgoing: EncodeHead + Send;

    fn outgoing(&self) -> Option<&Self::Outgoing>;

    fn outgoing_mut(&mut self) -> Option<&mut Self::Outgoing>;

    /// How the body following the parsed head is delimited.
    fn read_framing(&self) -> Result<PayloadSize, ParseError>;

    /// Whether the outgoing message may be given chunked framing when it declares none.
    fn may_chunk(outgoing: &Self::Outgoing) -> bool;

    /// An interim head that is skipped while waiting for the final one.
    fn is_provisional(&self) -> bool {
        false
    }

    /// Whether the peer waits for `100 Continue` before sending the body.
    fn expects_continue(&self) -> bool {
        false
    }
}

impl StreamSide for Response {
    type Outgoing = Request;

    fn outgoing(&self) -> Option<&Request> {
        self.request()
    }

    fn outgoing_mut(&mut self) -> Option<&mut Request> {
        self.request_mut()
    }

    fn read_framing(&self) -> Result<PayloadSize, ParseError> {
        let status = self.status();
        let method = self.request().map(Request::method);

        // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length
        if method == Some(&Method::HEAD)
            || status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
            || (method == Some(&Method::CONNECT) && status.is_success())
        {
            return Ok(PayloadSize::Length(0));
        }

        if self.is_chunked() {
            if self.headers().contains(header::CONTENT_LENGTH) {
                warn!("response carries both transfer-encoding and content-length, using chunked");
            }
            return Ok(PayloadSize::Chunked);
        }

        if self.headers().contains(header::TRANSFER_ENCODING) {
            return Ok(PayloadSize::UntilEof);
        }

        match content_length(self)? {
            Some(length) => Ok(PayloadSize::Length(length)),
            None => Ok(PayloadSize::UntilEof),
        }
    }

    fn may_chunk(request: &Request) -> bool {
        request.version() >= Version::HTTP_11
    }

    fn is_provisional(&self) -> bool {
        self.status().is_informational() && self.status() != StatusCode::SWITCHING_PROTOCOLS
    }
}

impl StreamSide for Request {
    type Outgoing = Response;

    fn outgoing(&self) -> Option<&Response> {
        self.response()
    }

    fn outgoing_mut(&mut self) -> Option<&mut Response> {
        self.response_mut()
    }

    fn read_framing(&self) -> Result<PayloadSize, ParseError> {
        let te = self.headers().contains(header::TRANSFER_ENCODING);
        let cl = content_length(self)?;

        match (te, cl) {
            (true, Some(_)) => {
                Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers"))
            }
            (true, None) if self.is_chunked() => Ok(PayloadSize::Chunked),
            (_, Some(length)) => Ok(PayloadSize::Length(length)),
            _ => Ok(PayloadSize::Length(0)),
        }
    }

    fn may_chunk(response: &Response) -> bool {
        let status = response.status();
        response.version() >= Version::HTTP_11
            && !status.is_informational()
            && status != StatusCode::NO_CONTENT
            && status != StatusCode::NOT_MODIFIED
    }

    fn expects_continue(&self) -> bool {
        self.headers().contains_token(header::EXPECT, "100-continue")
    }
}

/// The declared `Content-Length`, if any.
pub(crate) fn content_length<M: Message + ?Sized>(message: &M) -> Result<Option<u64>, ParseError> {
    let Some(value) = message.headers().get(header::CONTENT_LENGTH) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(ParseError::invalid_content_length)?;
    value
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| ParseError::invalid_content_length(format!("value {value} is not u64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use url::Url;

    fn response(method: Method, status: StatusCode) -> Response {
        let request = Request::new(method, Url::parse("http://a.test/").unwrap());
        Response::new(status).with_request(request)
    }

    #[test]
    fn bodiless_responses() {
        let cases = [
            (Method::HEAD, StatusCode::OK),
            (Method::GET, StatusCode::CONTINUE),
            (Method::GET, StatusCode::NO_CONTENT),
            (Method::GET, StatusCode::NOT_MODIFIED),
            (Method::CONNECT, StatusCode::OK),
        ];
        for (method, status) in cases {
            let response = response(method.clone(), status)
                .header(header::CONTENT_LENGTH, HeaderValue::from_static("10"));
            assert_eq!(response.read_framing().unwrap(), PayloadSize::Length(0), "{method} {status}");
        }
    }

    #[test]
    fn response_framing() {
        let chunked = response(Method::GET, StatusCode::OK)
            .header(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"))
            .header(header::CONTENT_LENGTH, HeaderValue::from_static("10"));
        assert_eq!(chunked.read_framing().unwrap(), PayloadSize::Chunked);

        let sized = response(Method::GET, StatusCode::OK).header(header::CONTENT_LENGTH, HeaderValue::from_static(" 42 "));
        assert_eq!(sized.read_framing().unwrap(), PayloadSize::Length(42));

        let undeclared = response(Method::GET, StatusCode::OK);
        assert_eq!(undeclared.read_framing().unwrap(), PayloadSize::UntilEof);

        let connect_refused = response(Method::CONNECT, StatusCode::FORBIDDEN);
        assert_eq!(connect_refused.read_framing().unwrap(), PayloadSize::UntilEof);

        let broken = response(Method::GET, StatusCode::OK).header(header::CONTENT_LENGTH, HeaderValue::from_static("ten"));
        assert!(matches!(broken.read_framing(), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn request_framing() {
        let plain = Request::from_target(Method::GET, "/");
        assert_eq!(plain.read_framing().unwrap(), PayloadSize::Length(0));

        let chunked = Request::from_target(Method::POST, "/")
            .header(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        assert_eq!(chunked.read_framing().unwrap(), PayloadSize::Chunked);

        let both = chunked.clone().header(header::CONTENT_LENGTH, HeaderValue::from_static("1"));
        assert!(both.read_framing().is_err());

        let expect = Request::from_target(Method::PUT, "/").header(header::EXPECT, HeaderValue::from_static("100-continue"));
        assert!(expect.expects_continue());
        assert!(!plain.expects_continue());
    }

    #[test]
    fn provisional_statuses() {
        assert!(Response::new(StatusCode::CONTINUE).is_provisional());
        assert!(!Response::new(StatusCode::SWITCHING_PROTOCOLS).is_provisional());
        assert!(!Response::new(StatusCode::OK).is_provisional());
    }
}
