use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::BrowserResult;

/// One raw record from the browser's network activity log.
///
/// `message` carries the serialized payload in the performance-log shape
/// `{"message": {"method": "...", "params": {...}}}`. It is parsed lazily and
/// tolerantly by the classifier; nothing here guarantees it is valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    #[serde(default)]
    pub timestamp_ms: i64,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp_ms: 0,
        }
    }
}

/// Opaque reference to an element located by [`BrowserSession::find_element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: usize,
    pub selector: String,
}

/// Embedded frame present in the document when [`BrowserSession::list_frames`]
/// was called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameHandle {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickStrategy {
    /// Native click dispatched at the element's centre.
    Direct,
    /// `element.click()` invoked from page script.
    Script,
    /// Simulated pointer travel to the element followed by a press.
    Pointer,
}

impl ClickStrategy {
    pub const FALLBACK_ORDER: [ClickStrategy; 3] = [
        ClickStrategy::Direct,
        ClickStrategy::Script,
        ClickStrategy::Pointer,
    ];
}

impl fmt::Display for ClickStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClickStrategy::Direct => "direct",
            ClickStrategy::Script => "script",
            ClickStrategy::Pointer => "pointer",
        };
        f.write_str(label)
    }
}

/// The browser capabilities the discovery engine consumes. Click fallback
/// chains and settle waits are the caller's concern.
#[async_trait(?Send)]
pub trait BrowserSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Polls for `selector` until it matches or `timeout` elapses.
    /// A miss is `Ok(None)`, not an error.
    async fn find_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> BrowserResult<Option<ElementHandle>>;

    async fn click(&mut self, element: &ElementHandle, strategy: ClickStrategy)
        -> BrowserResult<()>;

    /// Runs `script` in the active context. With an element, `script` must be
    /// a function declaration and is invoked with the element bound to `this`.
    async fn run_script(
        &mut self,
        script: &str,
        element: Option<&ElementHandle>,
    ) -> BrowserResult<serde_json::Value>;

    /// Drains the network events recorded since the previous call.
    async fn telemetry_snapshot(&mut self) -> BrowserResult<Vec<LogEntry>>;

    async fn list_frames(&mut self) -> BrowserResult<Vec<FrameHandle>>;

    async fn switch_to_frame(&mut self, frame: &FrameHandle) -> BrowserResult<()>;

    async fn switch_to_default_content(&mut self) -> BrowserResult<()>;
}
