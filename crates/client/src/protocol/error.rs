use std::io;
use thiserror::Error;

/// Top-level error of the client pipeline.
///
/// Every failure surfaced by a [`Stream`](crate::stream::Stream), a layer or the
/// [`Client`](crate::client::Client) is one of these kinds:
///
/// - [`HttpError::Transport`]: the underlying connection failed (connect, read, write, TLS)
/// - [`HttpError::Eof`]: a message ended before its declared framing was satisfied
/// - [`HttpError::InvalidUrl`]: a request or redirect target failed validation
/// - [`HttpError::Parse`]: the peer sent a malformed head or body
/// - [`HttpError::InvalidState`]: the engine was driven out of order
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("transport error on {}: {source}", .url.as_deref().unwrap_or("<unknown url>"))]
    Transport {
        url: Option<String>,
        #[source]
        source: io::Error,
    },

    #[error("unexpected end of message: {reason}")]
    Eof { reason: String },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("invalid stream state: {0}")]
    InvalidState(&'static str),
}

impl HttpError {
    pub fn eof<S: ToString>(reason: S) -> Self {
        Self::Eof { reason: reason.to_string() }
    }

    pub fn invalid_url<U: ToString, S: ToString>(url: U, reason: S) -> Self {
        Self::InvalidUrl { url: url.to_string(), reason: reason.to_string() }
    }

    pub fn transport<E: Into<io::Error>>(url: &str, e: E) -> Self {
        Self::Transport { url: Some(url.to_string()), source: e.into() }
    }

    /// Attaches `url` to a transport error that has not been tagged yet.
    ///
    /// Other kinds are returned unchanged.
    pub fn with_url(self, url: &str) -> Self {
        match self {
            Self::Transport { url: None, source } => Self::Transport { url: Some(url.to_string()), source },
            e => e,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }
}

impl From<io::Error> for HttpError {
    fn from(source: io::Error) -> Self {
        Self::Transport { url: None, source }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http status")]
    InvalidStatus,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }
}
