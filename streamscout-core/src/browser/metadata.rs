use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SelectorSection;

use super::error::{BrowserError, BrowserResult};
use super::session::BrowserSession;

/// Descriptive text scraped from the landing page.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PageDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
}

impl PageDetails {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.genre.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct RawDetailsPayload {
    title: Option<String>,
    description: Option<String>,
    genre: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageDetailsExtractor {
    description_selector: String,
    genre_selector: String,
    whitespace: Regex,
}

impl PageDetailsExtractor {
    pub fn new(selectors: &SelectorSection) -> Self {
        let whitespace = Regex::new(r"\s+").expect("valid regex");
        Self {
            description_selector: selectors.description.clone(),
            genre_selector: selectors.genre.clone(),
            whitespace,
        }
    }

    pub async fn extract(&self, session: &mut dyn BrowserSession) -> BrowserResult<PageDetails> {
        let value = session.run_script(&self.script(), None).await?;
        let payload: RawDetailsPayload = serde_json::from_value(value).map_err(|err| {
            BrowserError::Script(format!("failed to decode page details payload: {err}"))
        })?;
        Ok(PageDetails {
            title: self.normalize(payload.title),
            description: self.normalize(payload.description),
            genre: self.normalize(payload.genre),
        })
    }

    fn normalize(&self, text: Option<String>) -> Option<String> {
        let text = text?;
        let collapsed = self.whitespace.replace_all(text.trim(), " ").to_string();
        if collapsed.is_empty() {
            None
        } else {
            Some(collapsed)
        }
    }

    fn script(&self) -> String {
        format!(
            r#"
(() => {{
    const text = (selector) => {{
        const node = document.querySelector(selector);
        return node ? (node.innerText || node.textContent || null) : null;
    }};
    return {{
        title: document.title || null,
        description: text("{description}"),
        genre: text("{genre}")
    }};
}})()
"#,
            description = escape_js(&self.description_selector),
            genre = escape_js(&self.genre_selector),
        )
    }
}

fn escape_js(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}
