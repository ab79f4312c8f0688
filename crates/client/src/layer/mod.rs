//! Request pipeline layers.
//!
//! A client call flows `RedirectLayer -> DefaultHeadersLayer -> ConnectionLayer -> StreamLayer`:
//!
//! - [`RedirectLayer`] re-runs the chain for every followed `3xx`
//! - [`DefaultHeadersLayer`] declares the body length of each attempt
//! - [`ConnectionLayer`] resolves the proxy, acquires a transaction, opens a CONNECT
//!   tunnel for encrypted targets behind a proxy and builds the [`Stream`](crate::stream::Stream)
//! - [`StreamLayer`] writes the request and reads the response on that stream
//!
//! Each layer wraps the next one by value; any [`Handler`](crate::handler::Handler)
//! or [`StreamHandler`](crate::handler::StreamHandler) can take the place of an inner layer.

mod connection;
pub use connection::ConnectOptions;
pub use connection::ConnectionLayer;
pub use connection::ProxyMode;

mod defaults;
pub use defaults::DefaultHeadersLayer;

mod redirect;
pub use redirect::RedirectLayer;
pub use redirect::RedirectLimitReached;
pub use redirect::RedirectPolicy;

mod stream;
pub use stream::StreamLayer;
