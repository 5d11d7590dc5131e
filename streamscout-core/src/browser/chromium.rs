use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CreateIsolatedWorldParams, FrameId, FrameTree, GetFrameTreeParams, NavigateParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::discovery::classifier::{REQUEST_SENT_METHOD, RESPONSE_RECEIVED_METHOD};

use super::error::{BrowserError, BrowserResult};
use super::human::PointerController;
use super::session::{BrowserSession, ClickStrategy, ElementHandle, FrameHandle, LogEntry};

const SCRIPT_CLICK: &str = "function() { this.click(); }";
const ISOLATED_WORLD_NAME: &str = "streamscout";

type TelemetryBuffer = Arc<Mutex<Vec<LogEntry>>>;

/// [`BrowserSession`] backed by a single Chromium tab.
///
/// Network events are recorded by background listeners into a shared buffer
/// that [`BrowserSession::telemetry_snapshot`] drains. The buffer is tab-wide,
/// so a snapshot taken while a frame is active also carries top-level traffic.
#[derive(Debug)]
pub struct ChromiumSession {
    page: Page,
    pointer: PointerController,
    elements: Vec<Element>,
    frame_context: Option<ExecutionContextId>,
    telemetry: TelemetryBuffer,
    listeners: Vec<JoinHandle<()>>,
    poll_interval: Duration,
}

impl ChromiumSession {
    pub async fn attach(
        page: Page,
        pointer: PointerController,
        poll_interval: Duration,
    ) -> BrowserResult<Self> {
        page.execute(NetworkEnableParams::default()).await?;
        let telemetry: TelemetryBuffer = Arc::new(Mutex::new(Vec::new()));

        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let buffer = Arc::clone(&telemetry);
        let request_task = tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                record(&buffer, REQUEST_SENT_METHOD, "request", &event.request.url);
            }
        });

        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let buffer = Arc::clone(&telemetry);
        let response_task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                record(&buffer, RESPONSE_RECEIVED_METHOD, "response", &event.response.url);
            }
        });

        Ok(Self {
            page,
            pointer,
            elements: Vec::new(),
            frame_context: None,
            telemetry,
            listeners: vec![request_task, response_task],
            poll_interval,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    fn element(&self, handle: &ElementHandle) -> BrowserResult<&Element> {
        self.elements.get(handle.id).ok_or_else(|| {
            BrowserError::Element(format!("stale element handle for {}", handle.selector))
        })
    }
}

fn record(buffer: &TelemetryBuffer, method: &str, container: &str, url: &str) {
    let message = json!({
        "message": {
            "method": method,
            "params": { container: { "url": url } }
        }
    });
    let entry = LogEntry {
        message: message.to_string(),
        timestamp_ms: Utc::now().timestamp_millis(),
    };
    match buffer.lock() {
        Ok(mut entries) => entries.push(entry),
        Err(_) => warn!("telemetry buffer poisoned, dropping network event"),
    }
}

fn child_frames(tree: &FrameTree) -> Vec<FrameHandle> {
    tree.child_frames
        .iter()
        .flatten()
        .map(|child| FrameHandle {
            id: child.frame.id.inner().clone(),
            url: child.frame.url.clone(),
        })
        .collect()
}

#[async_trait(?Send)]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.elements.clear();
        self.frame_context = None;
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        self.page.goto(params).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn find_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> BrowserResult<Option<ElementHandle>> {
        if self.frame_context.is_some() {
            return Err(BrowserError::Frame(
                "element lookup is only supported in the top-level document".into(),
            ));
        }
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => {
                    self.elements.push(element);
                    return Ok(Some(ElementHandle {
                        id: self.elements.len() - 1,
                        selector: selector.to_string(),
                    }));
                }
                Err(err) => debug!(selector, error = %err, "element not present yet"),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn click(&mut self, handle: &ElementHandle, strategy: ClickStrategy) -> BrowserResult<()> {
        let element = self.elements.get(handle.id).ok_or_else(|| {
            BrowserError::Element(format!("stale element handle for {}", handle.selector))
        })?;
        match strategy {
            ClickStrategy::Direct => {
                element
                    .click()
                    .await
                    .map_err(|err| BrowserError::Element(format!("direct click failed: {err}")))?;
            }
            ClickStrategy::Script => {
                element
                    .call_js_fn(SCRIPT_CLICK, false)
                    .await
                    .map_err(|err| BrowserError::Element(format!("script click failed: {err}")))?;
            }
            ClickStrategy::Pointer => {
                self.pointer.click_element(&self.page, element).await?;
            }
        }
        Ok(())
    }

    async fn run_script(
        &mut self,
        script: &str,
        element: Option<&ElementHandle>,
    ) -> BrowserResult<Value> {
        if let Some(handle) = element {
            let returns = self
                .element(handle)?
                .call_js_fn(script, false)
                .await
                .map_err(|err| BrowserError::Script(err.to_string()))?;
            return Ok(returns.result.value.unwrap_or(Value::Null));
        }

        let mut builder = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true);
        if let Some(context) = &self.frame_context {
            builder = builder.context_id(context.clone());
        }
        let params = builder.build().map_err(BrowserError::Script)?;
        let evaluation = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|err| BrowserError::Script(err.to_string()))?;
        Ok(evaluation.value().cloned().unwrap_or(Value::Null))
    }

    async fn telemetry_snapshot(&mut self) -> BrowserResult<Vec<LogEntry>> {
        if self.listeners.iter().any(JoinHandle::is_finished) {
            return Err(BrowserError::Telemetry(
                "network event listener stopped".into(),
            ));
        }
        let mut entries = self
            .telemetry
            .lock()
            .map_err(|_| BrowserError::Telemetry("telemetry buffer poisoned".into()))?;
        Ok(std::mem::take(&mut *entries))
    }

    async fn list_frames(&mut self) -> BrowserResult<Vec<FrameHandle>> {
        let tree = self.page.execute(GetFrameTreeParams::default()).await?;
        Ok(child_frames(&tree.result.frame_tree))
    }

    async fn switch_to_frame(&mut self, frame: &FrameHandle) -> BrowserResult<()> {
        let params = CreateIsolatedWorldParams::builder()
            .frame_id(FrameId::new(frame.id.clone()))
            .world_name(ISOLATED_WORLD_NAME)
            .build()
            .map_err(BrowserError::Configuration)?;
        let world = self
            .page
            .execute(params)
            .await
            .map_err(|err| BrowserError::Frame(format!("cannot enter frame {}: {err}", frame.id)))?;
        self.frame_context = Some(world.result.execution_context_id.clone());
        Ok(())
    }

    async fn switch_to_default_content(&mut self) -> BrowserResult<()> {
        self.frame_context = None;
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::classifier::{classify, UrlCategory, UrlMarkers};

    #[test]
    fn recorded_events_match_the_classifier_shape() {
        let buffer: TelemetryBuffer = Arc::new(Mutex::new(Vec::new()));
        record(
            &buffer,
            RESPONSE_RECEIVED_METHOD,
            "response",
            "https://cloudnestra.com/rcp/abc",
        );
        record(&buffer, REQUEST_SENT_METHOD, "request", "https://cdn.example/a.m3u8");

        let entries = buffer.lock().unwrap().clone();
        let markers = UrlMarkers::default();
        let (first, _) = classify(&entries[0], &markers, false).unwrap();
        let (second, url) = classify(&entries[1], &markers, true).unwrap();
        assert_eq!(first, UrlCategory::IntermediateHost);
        assert_eq!(second, UrlCategory::Manifest);
        assert_eq!(url, "https://cdn.example/a.m3u8");
        assert!(entries.iter().all(|entry| entry.timestamp_ms > 0));
    }
}
