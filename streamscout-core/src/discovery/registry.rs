use std::collections::HashSet;

use serde::Serialize;

use super::classifier::UrlCategory;

/// Deduplicated URL set that remembers first-seen order.
#[derive(Debug, Clone, Default)]
struct UrlSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl UrlSet {
    fn insert(&mut self, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_string());
        self.ordered.push(url.to_string());
        true
    }

    fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }
}

/// Manifest and intermediate-host URLs accumulated over one discovery call.
#[derive(Debug, Clone, Default)]
pub struct UrlRegistry {
    manifests: UrlSet,
    intermediates: UrlSet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    pub new_manifest: bool,
    pub new_intermediate: bool,
}

impl UrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: UrlCategory, url: &str) -> RecordOutcome {
        let mut outcome = RecordOutcome::default();
        if category.includes_manifest() {
            outcome.new_manifest = self.manifests.insert(url);
        }
        if category.includes_intermediate_host() {
            outcome.new_intermediate = self.intermediates.insert(url);
        }
        outcome
    }

    pub fn merge(&mut self, other: &UrlRegistry) {
        for url in &other.manifests.ordered {
            self.manifests.insert(url);
        }
        for url in &other.intermediates.ordered {
            self.intermediates.insert(url);
        }
    }

    pub fn manifest_urls(&self) -> HashSet<String> {
        self.manifests.seen.clone()
    }

    pub fn intermediate_urls(&self) -> HashSet<String> {
        self.intermediates.seen.clone()
    }

    pub fn contains_manifest(&self, url: &str) -> bool {
        self.manifests.contains(url)
    }

    pub fn contains_intermediate(&self, url: &str) -> bool {
        self.intermediates.contains(url)
    }

    /// Earliest recorded intermediate-host URL.
    pub fn first_intermediate(&self) -> Option<&str> {
        self.intermediates.ordered.first().map(String::as_str)
    }

    pub fn first_manifest(&self) -> Option<&str> {
        self.manifests.ordered.first().map(String::as_str)
    }

    pub fn manifest_count(&self) -> usize {
        self.manifests.ordered.len()
    }

    pub fn intermediate_count(&self) -> usize {
        self.intermediates.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest_count() == 0 && self.intermediate_count() == 0
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            manifest_urls: self.manifests.ordered.clone(),
            intermediate_urls: self.intermediates.ordered.clone(),
        }
    }
}

/// Serializable copy of a registry, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub manifest_urls: Vec<String>,
    pub intermediate_urls: Vec<String>,
}
