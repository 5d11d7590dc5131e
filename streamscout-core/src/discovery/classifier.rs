use serde::Serialize;
use serde_json::Value;

use crate::browser::LogEntry;
use crate::config::MarkerSection;

pub const REQUEST_SENT_METHOD: &str = "Network.requestWillBeSent";
pub const RESPONSE_RECEIVED_METHOD: &str = "Network.responseReceived";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkEventKind {
    RequestSent,
    ResponseReceived,
}

impl NetworkEventKind {
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            REQUEST_SENT_METHOD => Some(NetworkEventKind::RequestSent),
            RESPONSE_RECEIVED_METHOD => Some(NetworkEventKind::ResponseReceived),
            _ => None,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            NetworkEventKind::RequestSent => REQUEST_SENT_METHOD,
            NetworkEventKind::ResponseReceived => RESPONSE_RECEIVED_METHOD,
        }
    }

    fn url_container(&self) -> &'static str {
        match self {
            NetworkEventKind::RequestSent => "request",
            NetworkEventKind::ResponseReceived => "response",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkEvent {
    pub kind: NetworkEventKind,
    pub url: String,
}

impl NetworkEvent {
    /// Parses a raw log entry. Any missing or mistyped field yields `None`.
    pub fn parse(entry: &LogEntry) -> Option<Self> {
        let payload: Value = serde_json::from_str(&entry.message).ok()?;
        let message = payload.get("message")?;
        let kind = NetworkEventKind::from_method(message.get("method")?.as_str()?)?;
        let url = message
            .get("params")?
            .get(kind.url_container())?
            .get("url")?
            .as_str()?;
        if url.is_empty() {
            return None;
        }
        Some(NetworkEvent {
            kind,
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UrlCategory {
    Manifest,
    IntermediateHost,
    ManifestAndIntermediate,
    Unclassified,
}

impl UrlCategory {
    fn from_flags(manifest: bool, intermediate: bool) -> Self {
        match (manifest, intermediate) {
            (true, true) => UrlCategory::ManifestAndIntermediate,
            (true, false) => UrlCategory::Manifest,
            (false, true) => UrlCategory::IntermediateHost,
            (false, false) => UrlCategory::Unclassified,
        }
    }

    pub fn includes_manifest(&self) -> bool {
        matches!(
            self,
            UrlCategory::Manifest | UrlCategory::ManifestAndIntermediate
        )
    }

    pub fn includes_intermediate_host(&self) -> bool {
        matches!(
            self,
            UrlCategory::IntermediateHost | UrlCategory::ManifestAndIntermediate
        )
    }
}

/// Substring markers that identify manifest and intermediate-host URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMarkers {
    pub manifest: String,
    pub intermediate_host: String,
    pub intermediate_path: String,
}

impl Default for UrlMarkers {
    fn default() -> Self {
        Self::from(&MarkerSection::default())
    }
}

impl From<&MarkerSection> for UrlMarkers {
    fn from(section: &MarkerSection) -> Self {
        Self {
            manifest: section.manifest.clone(),
            intermediate_host: section.intermediate_host.clone(),
            intermediate_path: section.intermediate_path.clone(),
        }
    }
}

impl UrlMarkers {
    pub fn is_manifest(&self, url: &str) -> bool {
        url.contains(self.manifest.as_str())
    }

    pub fn is_intermediate_host(&self, url: &str) -> bool {
        url.contains(self.intermediate_host.as_str()) && url.contains(self.intermediate_path.as_str())
    }

    /// Categorizes a bare URL. The manifest rule only applies when
    /// `search_for_manifest` is set.
    pub fn categorize(&self, url: &str, search_for_manifest: bool) -> UrlCategory {
        let intermediate = self.is_intermediate_host(url);
        let manifest = search_for_manifest && self.is_manifest(url);
        UrlCategory::from_flags(manifest, intermediate)
    }
}

pub fn classify(
    entry: &LogEntry,
    markers: &UrlMarkers,
    search_for_manifest: bool,
) -> Option<(UrlCategory, String)> {
    let event = NetworkEvent::parse(entry)?;
    let category = markers.categorize(&event.url, search_for_manifest);
    Some((category, event.url))
}
