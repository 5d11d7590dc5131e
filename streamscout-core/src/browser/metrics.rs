use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryMetrics {
    pub pages_opened: u64,
    pub controls_activated: u64,
    pub telemetry_fetches: u64,
    pub telemetry_retries: u64,
    pub telemetry_failures: u64,
    pub entries_seen: u64,
    pub entries_skipped: u64,
    pub frames_visited: u64,
    pub frame_failures: u64,
    pub manifests_collected: u64,
    pub intermediates_collected: u64,
}

impl DiscoveryMetrics {
    pub fn record_page_open(&mut self) {
        self.pages_opened = self.pages_opened.saturating_add(1);
    }

    pub fn record_activation(&mut self) {
        self.controls_activated = self.controls_activated.saturating_add(1);
    }

    pub fn record_telemetry_fetch(&mut self, attempts: usize) {
        self.telemetry_fetches = self.telemetry_fetches.saturating_add(1);
        self.telemetry_retries = self
            .telemetry_retries
            .saturating_add(attempts.saturating_sub(1) as u64);
    }

    pub fn record_telemetry_failure(&mut self) {
        self.telemetry_failures = self.telemetry_failures.saturating_add(1);
    }

    pub fn record_entries(&mut self, seen: u64, skipped: u64) {
        self.entries_seen = self.entries_seen.saturating_add(seen);
        self.entries_skipped = self.entries_skipped.saturating_add(skipped);
    }

    pub fn record_frame_visit(&mut self, success: bool) {
        self.frames_visited = self.frames_visited.saturating_add(1);
        if !success {
            self.frame_failures = self.frame_failures.saturating_add(1);
        }
    }

    pub fn record_manifest(&mut self) {
        self.manifests_collected = self.manifests_collected.saturating_add(1);
    }

    pub fn record_intermediate(&mut self) {
        self.intermediates_collected = self.intermediates_collected.saturating_add(1);
    }

    pub fn skipped_ratio(&self) -> f64 {
        if self.entries_seen == 0 {
            0.0
        } else {
            self.entries_skipped as f64 / self.entries_seen as f64
        }
    }
}
