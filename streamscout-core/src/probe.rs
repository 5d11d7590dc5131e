use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

use crate::browser::{BrowserError, BrowserResult};
use crate::config::ProbeSection;

const DEFAULT_PROBE_AGENT: &str = "StreamScout-Probe/1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub playable: bool,
}

/// HEAD-checks manifest URLs for a successful streaming response.
#[derive(Debug, Clone)]
pub struct ManifestProbe {
    client: Client,
}

impl ManifestProbe {
    pub fn new(section: &ProbeSection) -> BrowserResult<Self> {
        let client = Client::builder()
            .user_agent(
                section
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROBE_AGENT.to_string()),
            )
            .timeout(Duration::from_secs(section.timeout_seconds))
            .build()
            .map_err(|err| BrowserError::Probe(err.to_string()))?;
        Ok(Self { client })
    }

    pub async fn probe(&self, url: &str) -> BrowserResult<ProbeResult> {
        let response = self.client.head(url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let playable = status == StatusCode::OK
            && content_type.as_deref().is_some_and(is_stream_content_type);
        debug!(url, status = status.as_u16(), content_type = ?content_type, "manifest probed");
        if playable {
            info!(url, "manifest answers with a stream");
        }
        Ok(ProbeResult {
            url: url.to_string(),
            status: status.as_u16(),
            content_type,
            playable,
        })
    }
}

pub fn is_stream_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    ["video", "stream", "mpegurl"]
        .iter()
        .any(|marker| lowered.contains(marker))
}
