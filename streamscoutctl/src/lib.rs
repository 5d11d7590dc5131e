use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use streamscout_core::{load_scout_config, BrowserError, ScoutConfig, UrlMarkers};
use thiserror::Error;

pub mod commands;

use commands::classify::{ClassifyArgs, ClassifyReport};
use commands::discover::{DiscoverArgs, DiscoverReport};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] streamscout_core::ConfigError),
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read telemetry dump {path}: {source}")]
    Dump {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("source not in whitelist: {0}")]
    SourceNotAllowed(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Streaming manifest discovery", long_about = None)]
pub struct Cli {
    /// Path to scout.toml
    #[arg(long, default_value = "configs/scout.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a discovery against a landing page
    Discover(DiscoverArgs),
    /// Classify a JSON-lines telemetry dump offline
    Classify(ClassifyArgs),
    /// Load the configuration and print a summary
    CheckConfig,
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_scout_config(&cli.config)?;

    match &cli.command {
        Commands::Discover(args) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let report = runtime.block_on(commands::discover::execute(config, args))?;
            render(&report, cli.format)?;
        }
        Commands::Classify(args) => {
            let markers = UrlMarkers::from(&config.markers);
            let report = commands::classify::execute(&markers, args)?;
            render(&report, cli.format)?;
        }
        Commands::CheckConfig => {
            let summary = ConfigSummary::new(&cli.config, &config);
            render(&summary, cli.format)?;
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    path: PathBuf,
    executable: String,
    headless: bool,
    user_agents: usize,
    entry_controls: Vec<String>,
    secondary_controls: Vec<String>,
    manifest_marker: String,
    intermediate_host: String,
    intermediate_path: String,
    whitelist: Vec<String>,
}

impl ConfigSummary {
    fn new(path: &std::path::Path, config: &ScoutConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            executable: config.chromium.executable_path.clone(),
            headless: config.chromium.headless,
            user_agents: config.user_agents.pool.len(),
            entry_controls: config.selectors.entry_controls.clone(),
            secondary_controls: config.selectors.secondary_controls.clone(),
            manifest_marker: config.markers.manifest.clone(),
            intermediate_host: config.markers.intermediate_host.clone(),
            intermediate_path: config.markers.intermediate_path.clone(),
            whitelist: config.sources.whitelist.clone(),
        }
    }
}

impl DisplayFallback for ConfigSummary {
    fn display(&self) -> String {
        let whitelist = if self.whitelist.is_empty() {
            "<any>".to_string()
        } else {
            self.whitelist.join(", ")
        };
        [
            format!("Config: {}", self.path.display()),
            format!("Chromium: {} (headless={})", self.executable, self.headless),
            format!("User agents: {}", self.user_agents),
            format!("Entry controls: {}", self.entry_controls.join(" | ")),
            format!("Secondary controls: {}", self.secondary_controls.join(" | ")),
            format!(
                "Markers: manifest={} host={} path={}",
                self.manifest_marker, self.intermediate_host, self.intermediate_path
            ),
            format!("Whitelist: {whitelist}"),
        ]
        .join("\n")
    }
}

impl DisplayFallback for DiscoverReport {
    fn display(&self) -> String {
        let outcome = &self.outcome;
        let mut lines = vec![format!("Page: {}", outcome.page_url)];
        if let Some(details) = &outcome.page_details {
            if let Some(title) = &details.title {
                lines.push(format!("Title: {title}"));
            }
            if let Some(genre) = &details.genre {
                lines.push(format!("Genre: {genre}"));
            }
            if let Some(description) = &details.description {
                lines.push(format!("Description: {description}"));
            }
        }
        if outcome.manifest_urls.is_empty() {
            lines.push("No manifest URL found".to_string());
        } else {
            lines.push("Manifests:".to_string());
            for url in &outcome.manifest_urls {
                let verdict = self
                    .probes
                    .iter()
                    .find(|probe| &probe.url == url)
                    .map(|probe| {
                        if probe.playable {
                            format!(" [{} playable]", probe.status)
                        } else {
                            format!(" [{} not playable]", probe.status)
                        }
                    })
                    .unwrap_or_default();
                lines.push(format!("  - {url}{verdict}"));
            }
        }
        if !outcome.intermediate_urls.is_empty() {
            lines.push("Intermediate hosts:".to_string());
            for url in &outcome.intermediate_urls {
                lines.push(format!("  - {url}"));
            }
        }
        let metrics = &outcome.metrics;
        lines.push(format!(
            "Frames: {} visited, {} failed | telemetry: {} fetches, {} retries, {} failures",
            metrics.frames_visited,
            metrics.frame_failures,
            metrics.telemetry_fetches,
            metrics.telemetry_retries,
            metrics.telemetry_failures
        ));
        if let Some(diagnostic) = &outcome.diagnostic {
            lines.push(format!("Stopped early: {diagnostic}"));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for ClassifyReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Entries: {} ({} skipped)",
            self.entries, self.skipped
        )];
        lines.push(format!("Manifests: {}", self.registry.manifest_urls.len()));
        for url in &self.registry.manifest_urls {
            lines.push(format!("  - {url}"));
        }
        lines.push(format!(
            "Intermediate hosts: {}",
            self.registry.intermediate_urls.len()
        ));
        for url in &self.registry.intermediate_urls {
            lines.push(format!("  - {url}"));
        }
        lines.join("\n")
    }
}
