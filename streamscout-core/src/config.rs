use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ScoutConfig {
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub user_agents: UserAgentSection,
    pub viewport: ViewportSection,
    #[serde(default)]
    pub fingerprint: FingerprintSection,
    pub human_simulation: HumanSimulationSection,
    #[serde(default)]
    pub selectors: SelectorSection,
    #[serde(default)]
    pub markers: MarkerSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub sources: SourcesSection,
    #[serde(default)]
    pub probe: ProbeSection,
}

impl ScoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.selectors.entry_controls.is_empty() {
            return Err(ConfigError::Invalid {
                field: "selectors.entry_controls",
                reason: "at least one selector is required".into(),
            });
        }
        if self.selectors.secondary_controls.is_empty() {
            return Err(ConfigError::Invalid {
                field: "selectors.secondary_controls",
                reason: "at least one selector is required".into(),
            });
        }
        if self.markers.manifest.is_empty() {
            return Err(ConfigError::Invalid {
                field: "markers.manifest",
                reason: "marker must not be empty".into(),
            });
        }
        if self.markers.intermediate_host.is_empty() || self.markers.intermediate_path.is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "markers.intermediate_host",
                reason: "host and path markers must not be empty".into(),
            });
        }
        if self.human_simulation.mouse_speed_min_px_s > self.human_simulation.mouse_speed_max_px_s
        {
            return Err(ConfigError::Invalid {
                field: "human_simulation.mouse_speed_min_px_s",
                reason: "minimum speed exceeds maximum speed".into(),
            });
        }
        Ok(())
    }

    /// Whether `url` starts with one of the whitelisted source prefixes.
    /// An empty whitelist accepts every URL.
    pub fn is_allowed_source(&self, url: &str) -> bool {
        self.sources.whitelist.is_empty()
            || self
                .sources
                .whitelist
                .iter()
                .any(|prefix| url.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChromiumSection {
    pub executable_path: String,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub tab_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagsSection {
    pub no_first_run: bool,
    pub disable_automation_controlled: bool,
    pub disable_site_isolation: bool,
    pub ignore_certificate_errors: bool,
    pub disable_popup_blocking: bool,
    pub mute_audio: bool,
    pub autoplay_policy: String,
    pub lang: Option<String>,
    pub accept_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentSection {
    pub pool: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportSection {
    pub resolutions: Vec<[u32; 2]>,
    pub jitter_pixels: u32,
    pub device_scale_factor: [f32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintSection {
    pub hide_webdriver: bool,
    pub spoof_plugins: bool,
    pub spoof_chrome_runtime: bool,
    pub languages: Vec<String>,
}

impl Default for FingerprintSection {
    fn default() -> Self {
        Self {
            hide_webdriver: true,
            spoof_plugins: true,
            spoof_chrome_runtime: true,
            languages: vec!["en-US".into(), "en".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HumanSimulationSection {
    pub mouse_speed_min_px_s: u32,
    pub mouse_speed_max_px_s: u32,
    pub mouse_jitter_px: u32,
    pub click_hesitation_ms: [u32; 2],
    pub click_duration_ms: [u32; 2],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorSection {
    /// Play affordances on the landing page, most specific first.
    pub entry_controls: Vec<String>,
    /// Play button on the intermediate host page.
    pub secondary_controls: Vec<String>,
    pub description: String,
    pub genre: String,
}

impl Default for SelectorSection {
    fn default() -> Self {
        Self {
            entry_controls: vec![
                "i.fas.fa-play".into(),
                "i[class*='fa-play']".into(),
                "i[class*='play']".into(),
            ],
            secondary_controls: vec!["#pl_but.fas.fa-play".into()],
            description: "div.description".into(),
            genre: ".col-xl-7.col-lg-7.col-md-8.col-sm-12".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MarkerSection {
    pub manifest: String,
    pub intermediate_host: String,
    pub intermediate_path: String,
}

impl Default for MarkerSection {
    fn default() -> Self {
        Self {
            manifest: ".m3u8".into(),
            intermediate_host: "cloudnestra.com".into(),
            intermediate_path: "/rcp/".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub element_timeout_seconds: u64,
    pub element_poll_ms: u64,
    pub scroll_settle_ms: u64,
    pub traffic_settle_seconds: u64,
    pub frame_settle_seconds: u64,
    pub intermediate_settle_seconds: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            element_timeout_seconds: 10,
            element_poll_ms: 250,
            scroll_settle_ms: 1000,
            traffic_settle_seconds: 5,
            frame_settle_seconds: 2,
            intermediate_settle_seconds: 15,
        }
    }
}

impl TimingSection {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_seconds)
    }

    pub fn element_poll(&self) -> Duration {
        Duration::from_millis(self.element_poll_ms.max(10))
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn traffic_settle(&self) -> Duration {
        Duration::from_secs(self.traffic_settle_seconds)
    }

    pub fn frame_settle(&self) -> Duration {
        Duration::from_secs(self.frame_settle_seconds)
    }

    pub fn intermediate_settle(&self) -> Duration {
        Duration::from_secs(self.intermediate_settle_seconds)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesSection {
    pub whitelist: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeSection {
    pub timeout_seconds: u64,
    pub user_agent: Option<String>,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: None,
        }
    }
}

pub fn load_scout_config<P: AsRef<Path>>(path: P) -> Result<ScoutConfig> {
    let config: ScoutConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

pub fn parse_scout_config(content: &str) -> std::result::Result<ScoutConfig, toml::de::Error> {
    toml::from_str(content)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/scout.toml");
        let config = load_scout_config(path).expect("fixture should parse");
        assert!(config.user_agents.pool.len() >= 2);
        assert_eq!(config.markers.manifest, ".m3u8");
        assert_eq!(config.selectors.entry_controls.len(), 3);
        assert_eq!(config.timing.element_timeout(), Duration::from_secs(10));
        assert!(config.is_allowed_source("https://ww3.tinyzone.org/movie/example-1/"));
        assert!(!config.is_allowed_source("https://example.com/movie/"));
    }

    #[test]
    fn missing_optional_sections_fall_back_to_defaults() {
        let content = r#"
[chromium]
executable_path = "/usr/bin/chromium"
headless = true
sandbox = false
disable_gpu = true

[flags]
no_first_run = true
disable_automation_controlled = true
disable_site_isolation = true
ignore_certificate_errors = false
disable_popup_blocking = true
mute_audio = true
autoplay_policy = "no-user-gesture-required"

[user_agents]
pool = ["Mozilla/5.0"]

[viewport]
resolutions = [[1920, 1080]]
jitter_pixels = 0
device_scale_factor = [1.0, 1.0]

[human_simulation]
mouse_speed_min_px_s = 600
mouse_speed_max_px_s = 1200
mouse_jitter_px = 2
click_hesitation_ms = [80, 160]
click_duration_ms = [40, 90]
"#;
        let config = parse_scout_config(content).unwrap();
        config.validate().unwrap();
        assert_eq!(config.markers, MarkerSection::default());
        assert_eq!(config.timing.intermediate_settle(), Duration::from_secs(15));
        assert_eq!(config.selectors.secondary_controls, vec!["#pl_but.fas.fa-play"]);
        assert!(config.is_allowed_source("https://anything.example/"));
    }

    #[test]
    fn validate_rejects_empty_selector_lists() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/scout.toml");
        let mut config = load_scout_config(path).unwrap();
        config.selectors.entry_controls.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "selectors.entry_controls",
                ..
            })
        ));
    }
}
