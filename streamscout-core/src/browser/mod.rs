mod automation;
mod chromium;
mod error;
mod fingerprint;
mod human;
mod metadata;
mod metrics;
mod profile;
mod retry;
mod session;

pub use automation::{BrowserAutomation, BrowserLauncher, LaunchOverrides, ViewportSpec};
pub use chromium::ChromiumSession;
pub use error::{BrowserError, BrowserResult};
pub use fingerprint::FingerprintMasker;
pub use human::{PointerController, PointerStep};
pub use metadata::{PageDetails, PageDetailsExtractor};
pub use metrics::DiscoveryMetrics;
pub use profile::BrowserProfile;
pub use retry::{RetryOutcome, RetryPolicy};
pub use session::{BrowserSession, ClickStrategy, ElementHandle, FrameHandle, LogEntry};
