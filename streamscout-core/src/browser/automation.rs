use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::{seq::SliceRandom, Rng};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ScoutConfig, ViewportSection};

use super::chromium::ChromiumSession;
use super::error::{BrowserError, BrowserResult};
use super::fingerprint::FingerprintMasker;
use super::human::PointerController;
use super::profile::BrowserProfile;

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSpec {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl ViewportSpec {
    fn to_chromium(&self) -> ChromiumViewport {
        ChromiumViewport {
            width: self.width,
            height: self.height,
            device_scale_factor: Some(self.device_scale_factor),
            emulating_mobile: false,
            is_landscape: self.width >= self.height,
            has_touch: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
}

/// Per-launch choices: a fresh profile plus the identity the tab presents.
#[derive(Debug)]
struct LaunchPlan {
    profile: BrowserProfile,
    viewport: ViewportSpec,
    user_agent: String,
    headless: bool,
}

#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<ScoutConfig>,
    fingerprint: Arc<FingerprintMasker>,
}

impl BrowserLauncher {
    pub fn new(config: ScoutConfig) -> Self {
        let fingerprint = Arc::new(FingerprintMasker::new(config.fingerprint.clone()));
        Self {
            config: Arc::new(config),
            fingerprint,
        }
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    pub async fn launch(&self) -> BrowserResult<BrowserAutomation> {
        self.launch_with_overrides(LaunchOverrides::default()).await
    }

    pub async fn launch_with_overrides(
        &self,
        overrides: LaunchOverrides,
    ) -> BrowserResult<BrowserAutomation> {
        let plan = LaunchPlan {
            profile: BrowserProfile::ephemeral()?,
            viewport: select_viewport(&self.config.viewport),
            user_agent: select_user_agent(&self.config.user_agents.pool),
            headless: overrides.headless.unwrap_or(self.config.chromium.headless),
        };
        let chromium_config = self.chromium_config(&plan)?;
        info!(
            profile = %plan.profile.id(),
            ua = %plan.user_agent,
            width = plan.viewport.width,
            height = plan.viewport.height,
            headless = plan.headless,
            "launching chromium"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler error");
                }
            }
        });

        Ok(BrowserAutomation {
            browser,
            plan,
            handler_task: Some(handler_task),
            config: Arc::clone(&self.config),
            fingerprint: Arc::clone(&self.fingerprint),
        })
    }

    fn chromium_config(&self, plan: &LaunchPlan) -> BrowserResult<ChromiumConfig> {
        let chromium = &self.config.chromium;
        let mut builder = ChromiumConfig::builder()
            .chrome_executable(&chromium.executable_path)
            .user_data_dir(plan.profile.path())
            .viewport(plan.viewport.to_chromium())
            .args(chromium_args(&self.config, &plan.viewport, &plan.user_agent));
        if !plan.headless {
            builder = builder.with_head();
        }
        if !chromium.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(seconds) = chromium.tab_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(seconds));
        }
        builder.build().map_err(BrowserError::Configuration)
    }
}

fn select_viewport(section: &ViewportSection) -> ViewportSpec {
    let mut rng = rand::thread_rng();
    let base = section
        .resolutions
        .choose(&mut rng)
        .cloned()
        .unwrap_or([1366, 768]);
    let jitter = section.jitter_pixels as i32;
    let width = (base[0] as i32 + rng.gen_range(-jitter..=jitter)).clamp(640, 2560) as u32;
    let height = (base[1] as i32 + rng.gen_range(-jitter..=jitter)).clamp(480, 1600) as u32;
    let [low, high] = section.device_scale_factor;
    let scale = rng.gen_range(low.min(high)..=high.max(low)) as f64;
    ViewportSpec {
        width,
        height,
        device_scale_factor: scale,
    }
}

fn select_user_agent(pool: &[String]) -> String {
    pool.choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
}

/// Command-line switches for one launch, derived from the `[chromium]` and
/// `[flags]` sections.
fn chromium_args(config: &ScoutConfig, viewport: &ViewportSpec, user_agent: &str) -> Vec<String> {
    let flags = &config.flags;
    let mut args = vec![
        format!("--user-agent={user_agent}"),
        format!("--window-size={},{}", viewport.width, viewport.height),
    ];

    if config.chromium.disable_gpu {
        args.push("--disable-gpu".into());
    }
    if flags.mute_audio {
        args.push("--mute-audio".into());
    }
    if !flags.autoplay_policy.is_empty() {
        args.push(format!("--autoplay-policy={}", flags.autoplay_policy));
    }
    if let Some(lang) = &flags.lang {
        args.push(format!("--lang={lang}"));
    }
    if let Some(accept) = &flags.accept_language {
        args.push(format!("--accept-lang={accept}"));
    }
    if flags.no_first_run {
        args.push("--no-first-run".into());
    }

    let mut disabled_features = Vec::new();
    if flags.disable_automation_controlled {
        args.push("--disable-blink-features=AutomationControlled".into());
        disabled_features.push("AutomationControlled");
    }
    if flags.disable_site_isolation {
        disabled_features.push("IsolateOrigins");
        disabled_features.push("site-per-process");
        args.push("--disable-site-isolation-trials".into());
    }
    if !disabled_features.is_empty() {
        args.push(format!("--disable-features={}", disabled_features.join(",")));
    }
    if flags.ignore_certificate_errors {
        args.push("--ignore-certificate-errors".into());
    }
    if flags.disable_popup_blocking {
        args.push("--disable-popup-blocking".into());
    }
    args.push("--disable-background-timer-throttling".into());
    args.push("--password-store=basic".into());
    args
}

/// A running browser. Call [`BrowserAutomation::shutdown`] when done; the
/// profile directory goes away with this value.
#[derive(Debug)]
pub struct BrowserAutomation {
    browser: Browser,
    plan: LaunchPlan,
    handler_task: Option<JoinHandle<()>>,
    config: Arc<ScoutConfig>,
    fingerprint: Arc<FingerprintMasker>,
}

impl BrowserAutomation {
    pub fn profile(&self) -> &BrowserProfile {
        &self.plan.profile
    }

    pub fn viewport(&self) -> &ViewportSpec {
        &self.plan.viewport
    }

    pub fn user_agent(&self) -> &str {
        &self.plan.user_agent
    }

    /// Opens a blank tab with stealth settings applied and network capture
    /// running.
    pub async fn new_session(&self) -> BrowserResult<ChromiumSession> {
        let page = self
            .browser
            .new_page(CreateTargetParams::new("about:blank"))
            .await?;
        self.disguise(&page).await?;
        let pointer = PointerController::new(self.config.human_simulation.clone());
        ChromiumSession::attach(page, pointer, self.config.timing.element_poll()).await
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!(profile = %self.plan.profile.id(), "closing chromium");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "browser did not close cleanly");
        }
        if let Some(handler) = self.handler_task.take() {
            handler.await?;
        }
        Ok(())
    }

    async fn disguise(&self, page: &Page) -> BrowserResult<()> {
        let user_agent = self.plan.user_agent.clone();
        page.enable_stealth_mode_with_agent(&user_agent).await?;

        let override_params = match &self.config.flags.accept_language {
            Some(accept) => SetUserAgentOverrideParams::builder()
                .user_agent(user_agent)
                .accept_language(accept.clone())
                .build(),
            None => SetUserAgentOverrideParams::builder()
                .user_agent(user_agent)
                .build(),
        }
        .map_err(BrowserError::Configuration)?;
        page.set_user_agent(override_params).await?;

        self.fingerprint.apply(page).await
    }
}

impl Drop for BrowserAutomation {
    fn drop(&mut self) {
        let running = self
            .handler_task
            .as_ref()
            .is_some_and(|handler| !handler.is_finished());
        if running {
            warn!(
                profile = %self.plan.profile.id(),
                "browser dropped without shutdown"
            );
        }
    }
}
