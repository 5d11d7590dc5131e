use tracing::{info, warn};

use crate::browser::{BrowserLauncher, BrowserResult, LaunchOverrides};
use crate::config::ScoutConfig;

use super::engine::{DiscoveryEngine, DiscoveryOutcome};

#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub url: String,
    pub headless: Option<bool>,
}

impl DiscoveryRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headless: None,
        }
    }
}

/// Launches a browser, runs one discovery against it and tears it down on
/// every path.
#[derive(Debug, Clone)]
pub struct DiscoveryRunner {
    launcher: BrowserLauncher,
    engine: DiscoveryEngine,
}

impl DiscoveryRunner {
    pub fn new(config: ScoutConfig) -> Self {
        let engine = DiscoveryEngine::from_config(&config);
        Self {
            launcher: BrowserLauncher::new(config),
            engine,
        }
    }

    pub fn engine(&self) -> &DiscoveryEngine {
        &self.engine
    }

    pub async fn run(&self, request: &DiscoveryRequest) -> BrowserResult<DiscoveryOutcome> {
        let automation = self
            .launcher
            .launch_with_overrides(LaunchOverrides {
                headless: request.headless,
            })
            .await?;

        let outcome = match automation.new_session().await {
            Ok(mut session) => {
                let outcome = self.engine.discover(&mut session, &request.url).await;
                drop(session);
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, "failed to open browser session");
                Err(err)
            }
        };

        automation.shutdown().await?;
        info!(url = %request.url, "browser released");
        outcome
    }
}
