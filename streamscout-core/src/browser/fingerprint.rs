use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;

use crate::config::FingerprintSection;

use super::error::{BrowserError, BrowserResult};

/// Installs init scripts that hide the usual automation giveaways.
#[derive(Debug, Clone)]
pub struct FingerprintMasker {
    config: FingerprintSection,
}

impl FingerprintMasker {
    pub fn new(config: FingerprintSection) -> Self {
        Self { config }
    }

    pub async fn apply(&self, page: &Page) -> BrowserResult<()> {
        for script in self.scripts() {
            page.evaluate_on_new_document(
                AddScriptToEvaluateOnNewDocumentParams::builder()
                    .source(script)
                    .build()
                    .map_err(|err| BrowserError::Configuration(err.to_string()))?,
            )
            .await?;
        }
        Ok(())
    }

    pub fn scripts(&self) -> Vec<String> {
        let mut scripts = Vec::new();
        if self.config.hide_webdriver {
            scripts.push(
                "Object.defineProperty(Navigator.prototype, 'webdriver', { get: () => undefined });"
                    .to_string(),
            );
        }
        if self.config.spoof_plugins {
            scripts.push(
                r#"
(() => {
    const plugins = [
        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
        { name: 'Native Client', filename: 'internal-nacl-plugin' },
    ];
    Object.defineProperty(Navigator.prototype, 'plugins', { get: () => plugins });
})();
"#
                .to_string(),
            );
        }
        if self.config.spoof_chrome_runtime {
            scripts.push(
                "if (!window.chrome) { window.chrome = {}; } if (!window.chrome.runtime) { window.chrome.runtime = {}; }"
                    .to_string(),
            );
        }
        if !self.config.languages.is_empty() {
            let languages = serde_json::to_string(&self.config.languages)
                .unwrap_or_else(|_| "[]".to_string());
            scripts.push(format!(
                "Object.defineProperty(Navigator.prototype, 'languages', {{ get: () => {languages} }});"
            ));
        }
        scripts
    }
}
