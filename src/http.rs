use reqwest::Client;
use std::time::Duration;

/// Shared client builder for every outbound HTTP surface. No overall
/// request timeout here: each call site arms its own deadline and drops the
/// in-flight future, which aborts the underlying transfer.
pub fn build_http_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}
