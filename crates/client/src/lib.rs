//! An asynchronous micro HTTP/1.1 client core
//!
//! This crate provides the request execution part of an HTTP/1.1 client built on top of
//! tokio: a per message framing engine and the pipeline layers around it.
//!
//! # Features
//!
//! - Chunked and fixed length body framing, in both directions
//! - Trailers, `Expect: 100-continue` and provisional `1xx` responses
//! - Pipelined connections with responses delivered in request order
//! - Connection reuse through a pool
//! - HTTP proxies, including CONNECT tunnels for encrypted targets
//! - Redirect following with a bounded budget and credential stripping across domains
//!
//!
//! # Example
//!
//! ```no_run
//! use micro_client::client::Client;
//! use micro_client::protocol::Message;
//! use tracing::{Level, error, info};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let client = Client::new();
//!     match client.get("http://example.com/").await {
//!         Ok(response) => info!(status = %response.status(), len = response.body().len(), "done"),
//!         Err(e) => error!(cause = %e, "request failed"),
//!     }
//! }
//! ```
//!
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`protocol`]: Request, response, header and error types
//! - [`codec`]: Head encoding/decoding and body framing codecs
//! - [`transport`]: Transactions over shared connections, the pool and the TCP dialer
//! - [`stream`]: The framing engine binding one message to one transaction
//! - [`handler`]: Pipeline handler traits
//! - [`layer`]: Redirect, connection and stream layers
//! - [`proxy`]: Proxy configuration
//! - [`client`]: The composed client and its builder
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: Head and body parsing errors
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - No TLS stack is bundled, encryption goes through [`transport::TlsUpgrade`]
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod client;
pub mod codec;
pub mod handler;
pub mod layer;
pub mod protocol;
pub mod proxy;
pub mod stream;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
