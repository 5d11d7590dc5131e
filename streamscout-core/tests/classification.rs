use serde_json::json;

use streamscout_core::browser::LogEntry;
use streamscout_core::discovery::{classify, UrlMarkers, UrlRegistry};

fn markers() -> UrlMarkers {
    UrlMarkers {
        manifest: ".m3u8".into(),
        intermediate_host: "redirecthost.example".into(),
        intermediate_path: "/rcp/".into(),
    }
}

fn capture() -> Vec<LogEntry> {
    vec![
        LogEntry::new(
            json!({"message": {"method": "Network.requestWillBeSent",
                "params": {"request": {"url": "https://video.example/a.m3u8"}}}})
            .to_string(),
        ),
        LogEntry::new(
            json!({"message": {"method": "Network.responseReceived",
                "params": {"response": {"url": "https://redirecthost.example/rcp/xyz"}}}})
            .to_string(),
        ),
        LogEntry::new(r#"{"message": {"method": "Network.responseReceived", "params": {"response": 42}}}"#),
    ]
}

fn run_pass(search_for_manifest: bool) -> UrlRegistry {
    let markers = markers();
    let mut registry = UrlRegistry::new();
    for entry in capture() {
        if let Some((category, url)) = classify(&entry, &markers, search_for_manifest) {
            registry.record(category, &url);
        }
    }
    registry
}

#[test]
fn manifest_search_collects_both_sets() {
    let registry = run_pass(true);
    assert_eq!(
        registry.snapshot().manifest_urls,
        vec!["https://video.example/a.m3u8"]
    );
    assert_eq!(
        registry.snapshot().intermediate_urls,
        vec!["https://redirecthost.example/rcp/xyz"]
    );
}

#[test]
fn without_manifest_search_only_intermediates_are_kept() {
    let registry = run_pass(false);
    assert_eq!(registry.manifest_count(), 0);
    assert_eq!(
        registry.snapshot().intermediate_urls,
        vec!["https://redirecthost.example/rcp/xyz"]
    );
}

#[test]
fn replaying_a_capture_changes_nothing() {
    let mut registry = run_pass(true);
    let before = registry.snapshot();
    registry.merge(&run_pass(true));
    assert_eq!(registry.snapshot(), before);
}
