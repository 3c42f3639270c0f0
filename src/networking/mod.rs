use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::Client;

use crate::error::SyncError;
use crate::util::{format_size, format_speed};

#[cfg(test)]
pub mod fake;

/// Anything that can turn a URL into bytes.
///
/// Implementations fail with [`SyncError::Network`] and never retry; retry policy
/// belongs to the caller.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError>;
}

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quarzism-launcher/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }
}

#[async_trait]
impl Fetch for NetworkClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::network(url, format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SyncError::network(url, format!("bad status: {e}")))?;

        let total = response.content_length();
        let mut body = Vec::with_capacity(total.unwrap_or(0).min(16 * 1024 * 1024) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SyncError::network(url, format!("stream error: {e}")))?;
            body.extend_from_slice(&chunk);
        }

        if let Some(total) = total
            && (body.len() as u64) < total
        {
            return Err(SyncError::network(
                url,
                format!("incomplete body: received {} of {total} bytes", body.len()),
            ));
        }

        let elapsed = started.elapsed().as_secs_f32();
        let speed = if elapsed > 0.0 {
            body.len() as f32 / elapsed
        } else {
            0.0
        };
        debug!(
            "fetched {url}: {} in {elapsed:.2}s ({})",
            format_size(body.len() as u64),
            format_speed(speed)
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let client = NetworkClient::new(Duration::from_secs(2));
        // Port 9 on localhost is the discard service; nothing listens there in CI.
        let err = client.fetch("http://127.0.0.1:9/version.txt").await.unwrap_err();
        assert!(matches!(err, SyncError::Network { ref url, .. } if url.ends_with("version.txt")));
    }

    #[tokio::test]
    async fn silent_server_hits_the_request_timeout() {
        // The kernel completes the handshake; nothing ever answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/source.txt", listener.local_addr().unwrap());
        let client = NetworkClient::new(Duration::from_millis(300));

        let started = Instant::now();
        let err = client.fetch(&url).await.unwrap_err();
        assert!(matches!(err, SyncError::Network { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[tokio::test]
    async fn invalid_url_is_a_network_error() {
        let client = NetworkClient::new(Duration::from_secs(2));
        let err = client.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, SyncError::Network { .. }));
    }
}
