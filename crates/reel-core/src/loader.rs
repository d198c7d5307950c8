//! Media loading for headless hosts
//!
//! A browser reports dimensions and duration through element events. Off
//! the browser, a [`MediaLoader`] stands in for the element: it resolves
//! to a [`MediaReport`] or fails.

use crate::{playback::MediaReport, types::MediaKind, Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, instrument};

/// Loads one media URL and reports its metadata
#[async_trait]
pub trait MediaLoader: Send + Sync {
    async fn load(&self, url: &str, kind: MediaKind) -> Result<MediaReport>;
}

/// Loader that fetches over HTTP and checks the response status
///
/// Dimensions and duration are not decoded, so videos fall back to the
/// image duration.
#[derive(Debug, Clone)]
pub struct HttpMediaLoader {
    client: Client,
}

impl HttpMediaLoader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaLoader for HttpMediaLoader {
    #[instrument(skip(self))]
    async fn load(&self, url: &str, kind: MediaKind) -> Result<MediaReport> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Media request rejected");
            return Err(Error::MediaLoad { url: url.to_string() });
        }
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), %kind, "Media loaded");
        Ok(MediaReport::image(0, 0))
    }
}

/// Deterministic loader for tests and dry runs
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    latency: Duration,
    video_seconds: f64,
    failing: HashSet<String>,
}

impl SimulatedMedia {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            video_seconds: 5.0,
            failing: HashSet::new(),
        }
    }

    /// Duration reported for every video
    pub fn with_video_duration(mut self, seconds: f64) -> Self {
        self.video_seconds = seconds;
        self
    }

    /// Make loads of `url` fail
    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl MediaLoader for SimulatedMedia {
    async fn load(&self, url: &str, kind: MediaKind) -> Result<MediaReport> {
        tokio::time::sleep(self.latency).await;
        if self.failing.contains(url) {
            return Err(Error::MediaLoad { url: url.to_string() });
        }
        Ok(match kind {
            MediaKind::Image => MediaReport::image(1080, 1920),
            MediaKind::Video => MediaReport::video(1080, 1920, self.video_seconds),
        })
    }
}
