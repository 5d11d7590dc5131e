use std::cell::RefCell;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{
    BrowserResult, BrowserSession, ClickStrategy, DiscoveryMetrics, ElementHandle, FrameHandle,
    PageDetails, PageDetailsExtractor, RetryPolicy,
};
use crate::config::{ScoutConfig, SelectorSection, TimingSection};

use super::classifier::{classify, UrlMarkers};
use super::registry::{RegistrySnapshot, UrlRegistry};

const SCROLL_INTO_VIEW: &str = "function() { this.scrollIntoView(true); }";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPhase {
    /// Landing page: follow the player to the redirect host.
    IntermediateHost,
    /// Redirect host page: the player traffic carries the manifest.
    Manifest,
}

impl DiscoveryPhase {
    pub fn search_for_manifest(self) -> bool {
        matches!(self, DiscoveryPhase::Manifest)
    }
}

#[derive(Debug)]
enum DiscoveryState {
    LocateControl(DiscoveryPhase),
    ActivateControl(DiscoveryPhase, ElementHandle),
    MonitorTraffic(DiscoveryPhase),
    NavigateIntermediate,
    Done,
}

#[derive(Debug)]
struct DiscoverySession {
    phase: DiscoveryPhase,
    search_for_manifest: bool,
    registry: UrlRegistry,
    metrics: DiscoveryMetrics,
    details: Option<PageDetails>,
}

impl DiscoverySession {
    fn new() -> Self {
        Self {
            phase: DiscoveryPhase::IntermediateHost,
            search_for_manifest: false,
            registry: UrlRegistry::new(),
            metrics: DiscoveryMetrics::default(),
            details: None,
        }
    }

    fn enter(&mut self, phase: DiscoveryPhase) {
        self.phase = phase;
        self.search_for_manifest = phase.search_for_manifest();
    }
}

/// Result of one page investigation. Callers inspect the URL sets; a
/// `diagnostic` only explains why the run stopped early.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryOutcome {
    pub page_url: String,
    pub manifest_urls: Vec<String>,
    pub intermediate_urls: Vec<String>,
    pub page_details: Option<PageDetails>,
    pub metrics: DiscoveryMetrics,
    pub diagnostic: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DiscoveryOutcome {
    pub fn found_manifest(&self) -> bool {
        !self.manifest_urls.is_empty()
    }

    pub fn registry(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            manifest_urls: self.manifest_urls.clone(),
            intermediate_urls: self.intermediate_urls.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    entry_controls: Vec<String>,
    secondary_controls: Vec<String>,
    markers: UrlMarkers,
    timing: TimingSection,
    retry: RetryPolicy,
    details: PageDetailsExtractor,
}

impl DiscoveryEngine {
    pub fn new(selectors: &SelectorSection, markers: UrlMarkers, timing: TimingSection) -> Self {
        Self {
            entry_controls: selectors.entry_controls.clone(),
            secondary_controls: selectors.secondary_controls.clone(),
            markers,
            timing,
            retry: RetryPolicy::telemetry(),
            details: PageDetailsExtractor::new(selectors),
        }
    }

    pub fn from_config(config: &ScoutConfig) -> Self {
        Self::new(
            &config.selectors,
            UrlMarkers::from(&config.markers),
            config.timing.clone(),
        )
    }

    pub fn markers(&self) -> &UrlMarkers {
        &self.markers
    }

    /// Investigates `page_url` and returns whatever was collected. Never fails:
    /// session-level errors end the run and are reported in `diagnostic`.
    pub async fn discover(
        &self,
        session: &mut dyn BrowserSession,
        page_url: &str,
    ) -> DiscoveryOutcome {
        let started_at = Utc::now();
        let mut state = DiscoverySession::new();
        let diagnostic = match self.drive(session, page_url, &mut state).await {
            Ok(()) => None,
            Err(err) => {
                warn!(url = %page_url, error = %err, "discovery aborted");
                Some(err.to_string())
            }
        };
        let snapshot = state.registry.snapshot();
        info!(
            url = %page_url,
            manifests = snapshot.manifest_urls.len(),
            intermediates = snapshot.intermediate_urls.len(),
            frames = state.metrics.frames_visited,
            "discovery finished"
        );
        DiscoveryOutcome {
            page_url: page_url.to_string(),
            manifest_urls: snapshot.manifest_urls,
            intermediate_urls: snapshot.intermediate_urls,
            page_details: state.details,
            metrics: state.metrics,
            diagnostic,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        page_url: &str,
        state: &mut DiscoverySession,
    ) -> BrowserResult<()> {
        info!(url = %page_url, "opening target page");
        session.navigate(page_url).await?;
        state.metrics.record_page_open();
        state.details = self.read_details(session).await;

        let mut step = DiscoveryState::LocateControl(DiscoveryPhase::IntermediateHost);
        loop {
            debug!(state = ?step, "discovery step");
            step = match step {
                DiscoveryState::LocateControl(phase) => {
                    state.enter(phase);
                    match self.locate_control(session, phase).await {
                        Some(element) => DiscoveryState::ActivateControl(phase, element),
                        None => {
                            info!(phase = ?phase, "no play control found");
                            DiscoveryState::Done
                        }
                    }
                }
                DiscoveryState::ActivateControl(phase, element) => {
                    if self.activate_control(session, &element).await.is_some() {
                        state.metrics.record_activation();
                        DiscoveryState::MonitorTraffic(phase)
                    } else {
                        warn!(selector = %element.selector, "every click strategy failed");
                        DiscoveryState::Done
                    }
                }
                DiscoveryState::MonitorTraffic(phase) => {
                    self.monitor_traffic(session, state).await?;
                    match phase {
                        DiscoveryPhase::IntermediateHost => DiscoveryState::NavigateIntermediate,
                        DiscoveryPhase::Manifest => DiscoveryState::Done,
                    }
                }
                DiscoveryState::NavigateIntermediate => {
                    match state.registry.first_intermediate().map(str::to_owned) {
                        Some(url) => {
                            info!(url = %url, "following intermediate host");
                            session.navigate(&url).await?;
                            state.metrics.record_page_open();
                            sleep(self.timing.intermediate_settle()).await;
                            DiscoveryState::LocateControl(DiscoveryPhase::Manifest)
                        }
                        None => {
                            info!("no intermediate host url captured");
                            DiscoveryState::Done
                        }
                    }
                }
                DiscoveryState::Done => return Ok(()),
            };
        }
    }

    async fn read_details(&self, session: &mut dyn BrowserSession) -> Option<PageDetails> {
        match self.details.extract(session).await {
            Ok(details) if details.is_empty() => None,
            Ok(details) => {
                info!(
                    title = details.title.as_deref().unwrap_or(""),
                    genre = details.genre.as_deref().unwrap_or(""),
                    "page details"
                );
                Some(details)
            }
            Err(err) => {
                debug!(error = %err, "page details unavailable");
                None
            }
        }
    }

    fn selectors_for(&self, phase: DiscoveryPhase) -> &[String] {
        match phase {
            DiscoveryPhase::IntermediateHost => &self.entry_controls,
            DiscoveryPhase::Manifest => &self.secondary_controls,
        }
    }

    async fn locate_control(
        &self,
        session: &mut dyn BrowserSession,
        phase: DiscoveryPhase,
    ) -> Option<ElementHandle> {
        for selector in self.selectors_for(phase) {
            match session
                .find_element(selector, self.timing.element_timeout())
                .await
            {
                Ok(Some(element)) => {
                    info!(selector = %selector, "play control found");
                    return Some(element);
                }
                Ok(None) => debug!(selector = %selector, "selector did not match"),
                Err(err) => warn!(selector = %selector, error = %err, "selector lookup failed"),
            }
        }
        None
    }

    async fn activate_control(
        &self,
        session: &mut dyn BrowserSession,
        element: &ElementHandle,
    ) -> Option<ClickStrategy> {
        if let Err(err) = session.run_script(SCROLL_INTO_VIEW, Some(element)).await {
            debug!(error = %err, "scroll into view failed");
        }
        sleep(self.timing.scroll_settle()).await;

        for strategy in ClickStrategy::FALLBACK_ORDER {
            match session.click(element, strategy).await {
                Ok(()) => {
                    info!(strategy = %strategy, selector = %element.selector, "clicked play control");
                    return Some(strategy);
                }
                Err(err) => debug!(strategy = %strategy, error = %err, "click strategy failed"),
            }
        }
        None
    }

    async fn monitor_traffic(
        &self,
        session: &mut dyn BrowserSession,
        state: &mut DiscoverySession,
    ) -> BrowserResult<()> {
        info!(phase = ?state.phase, search_for_manifest = state.search_for_manifest, "monitoring network traffic");
        self.settle_and_capture(session, state, self.timing.traffic_settle())
            .await;
        self.sweep_frames(session, state).await?;
        self.settle_and_capture(session, state, self.timing.traffic_settle())
            .await;
        Ok(())
    }

    async fn settle_and_capture(
        &self,
        session: &mut dyn BrowserSession,
        state: &mut DiscoverySession,
        settle: Duration,
    ) {
        sleep(settle).await;
        if let Err(err) = self.capture_pass(session, state, "document").await {
            warn!(error = %err, "telemetry capture abandoned");
        }
    }

    async fn sweep_frames(
        &self,
        session: &mut dyn BrowserSession,
        state: &mut DiscoverySession,
    ) -> BrowserResult<()> {
        let frames = session.list_frames().await?;
        debug!(count = frames.len(), "sweeping frames");
        for frame in &frames {
            let visit = self.visit_frame(session, state, frame).await;
            state.metrics.record_frame_visit(visit.is_ok());
            if let Err(err) = visit {
                warn!(frame = %frame.id, url = %frame.url, error = %err, "frame sweep step failed");
            }
            session.switch_to_default_content().await?;
        }
        Ok(())
    }

    async fn visit_frame(
        &self,
        session: &mut dyn BrowserSession,
        state: &mut DiscoverySession,
        frame: &FrameHandle,
    ) -> BrowserResult<()> {
        session.switch_to_frame(frame).await?;
        sleep(self.timing.frame_settle()).await;
        self.capture_pass(session, state, "frame").await
    }

    async fn capture_pass(
        &self,
        session: &mut dyn BrowserSession,
        state: &mut DiscoverySession,
        scope: &str,
    ) -> BrowserResult<()> {
        let cell = RefCell::new(session);
        let cell = &cell;
        let fetched = self
            .retry
            .run("telemetry_snapshot", move |_| async move {
                cell.borrow_mut().telemetry_snapshot().await
            })
            .await;
        let outcome = match fetched {
            Ok(outcome) => outcome,
            Err(err) => {
                state.metrics.record_telemetry_failure();
                return Err(err);
            }
        };
        state.metrics.record_telemetry_fetch(outcome.attempts);

        let entries = outcome.result;
        let mut skipped = 0u64;
        for entry in &entries {
            let Some((category, url)) = classify(entry, &self.markers, state.search_for_manifest)
            else {
                skipped += 1;
                continue;
            };
            let recorded = state.registry.record(category, &url);
            if recorded.new_manifest {
                state.metrics.record_manifest();
                info!(url = %url, scope, "found manifest url");
            }
            if recorded.new_intermediate {
                state.metrics.record_intermediate();
                info!(url = %url, scope, "found intermediate host url");
            }
        }
        state.metrics.record_entries(entries.len() as u64, skipped);
        Ok(())
    }
}
