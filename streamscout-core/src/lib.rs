pub mod browser;
pub mod config;
pub mod discovery;
pub mod error;
pub mod probe;

pub use browser::{
    BrowserAutomation, BrowserError, BrowserLauncher, BrowserResult, BrowserSession,
    ChromiumSession, ClickStrategy, DiscoveryMetrics, ElementHandle, FrameHandle, LogEntry,
    PageDetails, RetryPolicy,
};
pub use config::{load_scout_config, parse_scout_config, ScoutConfig};
pub use discovery::{
    classify, DiscoveryEngine, DiscoveryOutcome, DiscoveryPhase, DiscoveryRequest,
    DiscoveryRunner, RegistrySnapshot, UrlCategory, UrlMarkers, UrlRegistry,
};
pub use error::{ConfigError, Result};
pub use probe::{is_stream_content_type, ManifestProbe, ProbeResult};
