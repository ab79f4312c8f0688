//! Fetches a url and prints the response.
//!
//! ```sh
//! cargo run -p micro-client --example fetch -- http://example.com/
//! ```
//!
//! Proxies are taken from `http_proxy`, `https_proxy` and `no_proxy`.

use micro_client::client::Client;
use micro_client::layer::RedirectPolicy;
use micro_client::protocol::Message;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let Some(url) = std::env::args().nth(1) else {
        error!("usage: fetch <url>");
        return;
    };

    let client = Client::builder().redirect(RedirectPolicy { limit: 5, ..RedirectPolicy::default() }).build();
    let response = match client.get(&url).await {
        Ok(response) => response,
        Err(e) => {
            error!(cause = %e, url = %url, "request failed");
            return;
        }
    };

    let redirects = response.request().map_or(0, |request| request.redirect_count());
    info!(status = %response.status(), redirects, "received response");
    for header in response.headers().iter() {
        info!("{}: {}", header.name, header.value.to_str().unwrap_or("<binary>"));
    }
    println!("{}", String::from_utf8_lossy(response.body()));
}
