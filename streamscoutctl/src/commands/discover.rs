use clap::Args;
use serde::Serialize;
use streamscout_core::{
    DiscoveryOutcome, DiscoveryRequest, DiscoveryRunner, ManifestProbe, ProbeResult, ScoutConfig,
};
use tracing::warn;
use url::Url;

use crate::{AppError, Result};

/// Investigates one page and reports the streaming manifests it plays.
#[derive(Args, Debug, Clone)]
pub struct DiscoverArgs {
    /// Landing page to investigate
    pub url: String,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headful: bool,

    /// HEAD-check every manifest URL after discovery
    #[arg(long)]
    pub probe: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverReport {
    #[serde(flatten)]
    pub outcome: DiscoveryOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<ProbeResult>,
}

pub fn validate_target(config: &ScoutConfig, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|err| AppError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    if !config.is_allowed_source(raw) {
        return Err(AppError::SourceNotAllowed(raw.to_string()));
    }
    Ok(url)
}

pub async fn execute(config: ScoutConfig, args: &DiscoverArgs) -> Result<DiscoverReport> {
    let target = validate_target(&config, &args.url)?;
    let prober = if args.probe {
        Some(ManifestProbe::new(&config.probe)?)
    } else {
        None
    };

    let runner = DiscoveryRunner::new(config);
    let mut request = DiscoveryRequest::new(target.as_str());
    if args.headful {
        request.headless = Some(false);
    }
    let outcome = runner.run(&request).await?;

    let mut probes = Vec::new();
    if let Some(prober) = prober {
        for url in &outcome.manifest_urls {
            match prober.probe(url).await {
                Ok(result) => probes.push(result),
                Err(err) => warn!(url = %url, error = %err, "manifest probe failed"),
            }
        }
    }
    Ok(DiscoverReport { outcome, probes })
}
