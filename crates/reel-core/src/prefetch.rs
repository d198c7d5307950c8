//! Network warm-up for streaming manifests
//!
//! Warm-up requests exist only to prime HTTP caches before the viewer
//! taps. Their results are never read and failures are logged and dropped.

use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fire-and-forget fetcher
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Request `url` and discard the response
    async fn warm(&self, url: &str) -> Result<()>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn warm(&self, url: &str) -> Result<()> {
        let response = self.client.get(url).send().await?;
        debug!(status = %response.status(), "Warm-up complete");
        Ok(())
    }
}

/// Fetcher that does nothing, for offline hosts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFetcher;

#[async_trait]
impl Fetcher for NoopFetcher {
    async fn warm(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

/// Warm every URL in order; returns how many succeeded
pub async fn warm_all(fetcher: &dyn Fetcher, urls: &[String]) -> usize {
    let mut ok = 0;
    for url in urls {
        match fetcher.warm(url).await {
            Ok(()) => ok += 1,
            Err(e) => debug!(%url, error = %e, "Warm-up failed"),
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for Counting {
        async fn warm(&self, url: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("bad") {
                Err(Error::MediaLoad { url: url.to_string() })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_warm_all_ignores_failures() {
        let fetcher = Counting { calls: AtomicUsize::new(0) };
        let urls = vec!["https://a/master.m3u8".to_string(), "https://bad/1.m3u8".to_string()];
        assert_eq!(warm_all(&fetcher, &urls).await, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
