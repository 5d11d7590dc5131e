use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use streamscout_core::browser::{
    BrowserError, BrowserResult, BrowserSession, ClickStrategy, ElementHandle, FrameHandle,
    LogEntry,
};
use streamscout_core::config::{SelectorSection, TimingSection};
use streamscout_core::discovery::{DiscoveryEngine, UrlMarkers};

const LANDING: &str = "https://ww3.tinyzone.org/movie/heist-1/";
const INTERMEDIATE: &str = "https://cloudnestra.com/rcp/abc123";
const MANIFEST: &str = "https://tmstr.example/pl/master.m3u8";

fn request(url: &str) -> LogEntry {
    LogEntry::new(
        json!({"message": {"method": "Network.requestWillBeSent", "params": {"request": {"url": url}}}})
            .to_string(),
    )
}

fn response(url: &str) -> LogEntry {
    LogEntry::new(
        json!({"message": {"method": "Network.responseReceived", "params": {"response": {"url": url}}}})
            .to_string(),
    )
}

fn malformed() -> LogEntry {
    LogEntry::new(r#"{"message": {"method": "Network.requestWillBeSent", "params": {}}"#)
}

enum Snapshot {
    Entries(Vec<LogEntry>),
    Fail,
}

#[derive(Default)]
struct MockSession {
    calls: Vec<String>,
    present: HashSet<String>,
    failing_clicks: HashSet<&'static str>,
    snapshots: VecDeque<Snapshot>,
    frames: Vec<FrameHandle>,
    failing_frames: HashSet<String>,
    failing_navigations: HashSet<String>,
    fail_restore: bool,
    active_frame: Option<String>,
    details: Option<Value>,
}

impl MockSession {
    fn with_controls(selectors: &[&str]) -> Self {
        Self {
            present: selectors.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    fn snapshot(mut self, step: Snapshot) -> Self {
        self.snapshots.push_back(step);
        self
    }

    fn calls_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }
}

fn label(strategy: ClickStrategy) -> &'static str {
    match strategy {
        ClickStrategy::Direct => "direct",
        ClickStrategy::Script => "script",
        ClickStrategy::Pointer => "pointer",
    }
}

#[async_trait(?Send)]
impl BrowserSession for MockSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.calls.push(format!("navigate:{url}"));
        if self.failing_navigations.contains(url) {
            return Err(BrowserError::Timeout(format!("navigation to {url}")));
        }
        Ok(())
    }

    async fn find_element(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> BrowserResult<Option<ElementHandle>> {
        self.calls.push(format!("find:{selector}"));
        Ok(self.present.contains(selector).then(|| ElementHandle {
            id: 0,
            selector: selector.to_string(),
        }))
    }

    async fn click(&mut self, _element: &ElementHandle, strategy: ClickStrategy) -> BrowserResult<()> {
        let name = label(strategy);
        self.calls.push(format!("click:{name}"));
        if self.failing_clicks.contains(name) {
            return Err(BrowserError::Element(format!("{name} click intercepted")));
        }
        Ok(())
    }

    async fn run_script(
        &mut self,
        _script: &str,
        element: Option<&ElementHandle>,
    ) -> BrowserResult<Value> {
        if element.is_some() {
            self.calls.push("scroll".into());
            return Ok(Value::Null);
        }
        self.calls.push("details".into());
        match &self.details {
            Some(payload) => Ok(payload.clone()),
            None => Err(BrowserError::Script("document not ready".into())),
        }
    }

    async fn telemetry_snapshot(&mut self) -> BrowserResult<Vec<LogEntry>> {
        let scope = self.active_frame.clone().unwrap_or_else(|| "top".into());
        self.calls.push(format!("telemetry:{scope}"));
        match self.snapshots.pop_front() {
            Some(Snapshot::Entries(entries)) => Ok(entries),
            Some(Snapshot::Fail) => Err(BrowserError::Telemetry("driver busy".into())),
            None => Ok(Vec::new()),
        }
    }

    async fn list_frames(&mut self) -> BrowserResult<Vec<FrameHandle>> {
        self.calls.push("list_frames".into());
        Ok(self.frames.clone())
    }

    async fn switch_to_frame(&mut self, frame: &FrameHandle) -> BrowserResult<()> {
        self.calls.push(format!("enter:{}", frame.id));
        if self.failing_frames.contains(&frame.id) {
            return Err(BrowserError::Frame(format!("{} detached", frame.id)));
        }
        self.active_frame = Some(frame.id.clone());
        Ok(())
    }

    async fn switch_to_default_content(&mut self) -> BrowserResult<()> {
        self.calls.push("restore".into());
        if self.fail_restore {
            return Err(BrowserError::Frame("execution context lost".into()));
        }
        self.active_frame = None;
        Ok(())
    }
}

fn engine() -> DiscoveryEngine {
    DiscoveryEngine::new(
        &SelectorSection::default(),
        UrlMarkers::default(),
        TimingSection::default(),
    )
}

fn frame(id: &str) -> FrameHandle {
    FrameHandle {
        id: id.to_string(),
        url: format!("https://player.example/{id}"),
    }
}

#[tokio::test(start_paused = true)]
async fn missing_entry_control_ends_without_interaction() {
    let mut session = MockSession::default();
    let outcome = engine().discover(&mut session, LANDING).await;

    assert!(outcome.manifest_urls.is_empty());
    assert!(outcome.intermediate_urls.is_empty());
    assert!(outcome.diagnostic.is_none());
    assert_eq!(
        session.calls,
        vec![
            format!("navigate:{LANDING}"),
            "details".to_string(),
            "find:i.fas.fa-play".to_string(),
            "find:i[class*='fa-play']".to_string(),
            "find:i[class*='play']".to_string(),
        ]
    );
    assert_eq!(outcome.metrics.controls_activated, 0);
}

#[tokio::test(start_paused = true)]
async fn first_matching_selector_wins() {
    let mut session = MockSession::with_controls(&["i[class*='fa-play']", "i[class*='play']"]);
    engine().discover(&mut session, LANDING).await;

    assert_eq!(
        session.calls_starting_with("find:"),
        vec!["find:i.fas.fa-play", "find:i[class*='fa-play']"]
    );
}

#[tokio::test(start_paused = true)]
async fn click_strategies_fall_back_in_order() {
    let mut session = MockSession::with_controls(&["i.fas.fa-play"]);
    session.failing_clicks = ["direct", "script"].into_iter().collect();
    let outcome = engine().discover(&mut session, LANDING).await;

    assert_eq!(
        session.calls_starting_with("click:"),
        vec!["click:direct", "click:script", "click:pointer"]
    );
    assert_eq!(outcome.metrics.controls_activated, 1);
    let scroll = session.calls.iter().position(|c| c == "scroll").unwrap();
    let first_click = session.calls.iter().position(|c| c == "click:direct").unwrap();
    assert!(scroll < first_click);
}

#[tokio::test(start_paused = true)]
async fn exhausted_click_strategies_skip_monitoring() {
    let mut session = MockSession::with_controls(&["i.fas.fa-play"]);
    session.failing_clicks = ["direct", "script", "pointer"].into_iter().collect();
    let outcome = engine().discover(&mut session, LANDING).await;

    assert!(session.calls_starting_with("telemetry").is_empty());
    assert!(session.calls_starting_with("list_frames").is_empty());
    assert_eq!(outcome.metrics.controls_activated, 0);
    assert!(outcome.diagnostic.is_none());
}

#[tokio::test(start_paused = true)]
async fn intermediate_phase_ignores_manifests_and_follows_redirect_host() {
    let mut session = MockSession::with_controls(&["i.fas.fa-play"]).snapshot(Snapshot::Entries(vec![
        response(INTERMEDIATE),
        request("https://cdn.example/a.m3u8"),
        malformed(),
    ]));
    let outcome = engine().discover(&mut session, LANDING).await;

    assert_eq!(outcome.intermediate_urls, vec![INTERMEDIATE]);
    assert!(outcome.manifest_urls.is_empty());
    assert_eq!(outcome.metrics.entries_skipped, 1);
    assert_eq!(
        session.calls_starting_with("navigate:"),
        vec![format!("navigate:{LANDING}"), format!("navigate:{INTERMEDIATE}")]
    );
    // secondary control is absent on the redirect host
    assert_eq!(session.calls.last().map(String::as_str), Some("find:#pl_but.fas.fa-play"));
}

#[tokio::test(start_paused = true)]
async fn two_phase_flow_collects_manifest_from_redirect_host() {
    let second_intermediate = "https://cloudnestra.com/rcp/zzz999";
    let mut session = MockSession::with_controls(&["i.fas.fa-play", "#pl_but.fas.fa-play"])
        .snapshot(Snapshot::Entries(vec![response(INTERMEDIATE)]))
        .snapshot(Snapshot::Entries(vec![request(second_intermediate), response(INTERMEDIATE)]))
        .snapshot(Snapshot::Entries(vec![request("https://cdn.example/ad.js")]))
        .snapshot(Snapshot::Entries(vec![request(MANIFEST), response(MANIFEST)]));
    session.details = Some(json!({
        "title": "Heist (2024)",
        "description": "  A crew plans\n one last job. ",
        "genre": null
    }));

    let started = Instant::now();
    let outcome = engine().discover(&mut session, LANDING).await;

    assert_eq!(outcome.manifest_urls, vec![MANIFEST]);
    assert_eq!(outcome.intermediate_urls, vec![INTERMEDIATE, second_intermediate]);
    assert_eq!(
        session.calls_starting_with("navigate:"),
        vec![format!("navigate:{LANDING}"), format!("navigate:{INTERMEDIATE}")]
    );
    assert_eq!(session.calls_starting_with("click:").len(), 2);
    assert_eq!(outcome.metrics.pages_opened, 2);
    assert_eq!(outcome.metrics.manifests_collected, 1);
    assert!(outcome.diagnostic.is_none());

    let details = outcome.page_details.expect("details captured");
    assert_eq!(details.title.as_deref(), Some("Heist (2024)"));
    assert_eq!(details.description.as_deref(), Some("A crew plans one last job."));
    assert_eq!(details.genre, None);

    // scroll settle, two traffic settles per phase, and the redirect wait
    assert_eq!(started.elapsed(), Duration::from_secs(1 + 5 + 5 + 15 + 1 + 5 + 5));
}

#[tokio::test(start_paused = true)]
async fn manifest_on_redirect_host_lands_in_both_sets() {
    let dual = "https://cloudnestra.com/rcp/list.m3u8";
    let mut session = MockSession::with_controls(&["i.fas.fa-play", "#pl_but.fas.fa-play"])
        .snapshot(Snapshot::Entries(vec![response(INTERMEDIATE)]))
        .snapshot(Snapshot::Entries(vec![]))
        .snapshot(Snapshot::Entries(vec![request(dual)]));
    let outcome = engine().discover(&mut session, LANDING).await;

    assert_eq!(outcome.manifest_urls, vec![dual]);
    assert_eq!(outcome.intermediate_urls, vec![INTERMEDIATE, dual]);
}

#[tokio::test(start_paused = true)]
async fn frame_sweep_survives_a_failing_frame() {
    let mut session = MockSession::with_controls(&["i.fas.fa-play"])
        .snapshot(Snapshot::Entries(vec![]))
        .snapshot(Snapshot::Entries(vec![]))
        .snapshot(Snapshot::Entries(vec![response(INTERMEDIATE)]));
    session.frames = vec![frame("f0"), frame("f1"), frame("f2")];
    session.failing_frames = ["f1".to_string()].into_iter().collect();
    session.present.remove("#pl_but.fas.fa-play");

    let outcome = engine().discover(&mut session, LANDING).await;

    assert_eq!(
        session.calls_starting_with("enter:"),
        vec!["enter:f0", "enter:f1", "enter:f2"]
    );
    assert_eq!(session.calls_starting_with("restore").len(), 3);
    assert!(session.active_frame.is_none());
    assert_eq!(
        session.calls_starting_with("telemetry:"),
        vec!["telemetry:top", "telemetry:f0", "telemetry:f2", "telemetry:top"]
    );
    assert_eq!(outcome.metrics.frames_visited, 3);
    assert_eq!(outcome.metrics.frame_failures, 1);
    // traffic seen inside f2 still drives the redirect
    assert_eq!(outcome.intermediate_urls, vec![INTERMEDIATE]);
}

#[tokio::test(start_paused = true)]
async fn transient_telemetry_failures_are_retried() {
    let mut session = MockSession::with_controls(&["i.fas.fa-play"])
        .snapshot(Snapshot::Fail)
        .snapshot(Snapshot::Fail)
        .snapshot(Snapshot::Entries(vec![response(INTERMEDIATE)]));
    session.present.remove("#pl_but.fas.fa-play");

    let outcome = engine().discover(&mut session, LANDING).await;

    assert_eq!(outcome.metrics.telemetry_retries, 2);
    assert_eq!(outcome.metrics.telemetry_failures, 0);
    assert_eq!(outcome.intermediate_urls, vec![INTERMEDIATE]);
}

#[tokio::test(start_paused = true)]
async fn exhausted_telemetry_retries_do_not_stop_the_step() {
    let mut session = MockSession::with_controls(&["i.fas.fa-play"])
        .snapshot(Snapshot::Fail)
        .snapshot(Snapshot::Fail)
        .snapshot(Snapshot::Fail)
        .snapshot(Snapshot::Entries(vec![response(INTERMEDIATE)]));
    session.present.remove("#pl_but.fas.fa-play");

    let outcome = engine().discover(&mut session, LANDING).await;

    assert_eq!(outcome.metrics.telemetry_failures, 1);
    let telemetry = session.calls_starting_with("telemetry:");
    assert_eq!(telemetry.len(), 4);
    let list_frames = session.calls.iter().position(|c| c == "list_frames").unwrap();
    let third_attempt = session
        .calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.starts_with("telemetry:"))
        .nth(2)
        .map(|(idx, _)| idx)
        .unwrap();
    assert!(list_frames > third_attempt);
    assert_eq!(outcome.intermediate_urls, vec![INTERMEDIATE]);
    assert!(outcome.diagnostic.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_landing_navigation_is_reported() {
    let mut session = MockSession::with_controls(&["i.fas.fa-play"]);
    session.failing_navigations = [LANDING.to_string()].into_iter().collect();

    let outcome = engine().discover(&mut session, LANDING).await;

    assert!(outcome
        .diagnostic
        .as_deref()
        .is_some_and(|msg| msg.contains("navigation")));
    assert!(outcome.manifest_urls.is_empty());
    assert_eq!(session.calls.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_context_restore_ends_the_call() {
    let mut session = MockSession::with_controls(&["i.fas.fa-play"])
        .snapshot(Snapshot::Entries(vec![response(INTERMEDIATE)]));
    session.frames = vec![frame("f0"), frame("f1")];
    session.fail_restore = true;

    let outcome = engine().discover(&mut session, LANDING).await;

    assert!(outcome.diagnostic.is_some());
    assert_eq!(session.calls_starting_with("enter:"), vec!["enter:f0"]);
    // urls gathered before the failure are still reported
    assert_eq!(outcome.intermediate_urls, vec![INTERMEDIATE]);
    assert_eq!(session.calls_starting_with("navigate:").len(), 1);
}
