//! Web Driver implementation using Playwright
//!
//! Element handles are tokens stamped into a `data-lumi-handle` attribute
//! during lookup. Every later operation looks the token up again, so an
//! element that left the DOM reports `StaleReference` instead of acting on
//! a detached node.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use log::{debug, info};
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::capture::WebCaptureListener;
use crate::driver::traits::{BrowserDriver, ElementHandle};
use crate::error::{MacroError, Result};
use crate::model::Locator;

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        let headless = std::env::var("LUMI_HEADLESS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            browser_type: BrowserType::Chromium,
            headless,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

/// Web Driver using Playwright
pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Browser>,
    #[allow(dead_code)]
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    config: WebDriverConfig,
}

/// Lookup by locator, stamping a token on every match
const FIND_JS: &str = r#"
(loc) => {
    const textOf = el => (el.innerText || el.textContent || '').trim();
    let found = [];
    try {
        if (loc.strategy === 'id') {
            found = Array.from(document.querySelectorAll('[id="' + CSS.escape(loc.value) + '"]'));
        } else if (loc.strategy === 'cssPath') {
            found = Array.from(document.querySelectorAll(loc.value));
        } else {
            // Innermost elements whose own text is the value
            found = Array.from(document.querySelectorAll('body *')).filter(el =>
                textOf(el) === loc.value &&
                !Array.from(el.children).some(child => textOf(child) === loc.value));
        }
    } catch (e) {
        found = [];
    }
    window.__lumiHandleSeq = window.__lumiHandleSeq || 0;
    const epoch = window.__lumiEpoch || (window.__lumiEpoch = Date.now().toString(36));
    return found.map(el => {
        if (!el.dataset.lumiHandle) {
            window.__lumiHandleSeq += 1;
            el.dataset.lumiHandle = epoch + '-' + window.__lumiHandleSeq;
        }
        return el.dataset.lumiHandle;
    });
}
"#;

const CLICK_JS: &str = "el => { el.scrollIntoView({ block: 'center' }); el.click(); }";

const SET_VALUE_JS: &str = r#"(el, text) => {
    el.focus();
    if ('value' in el) { el.value = text; } else { el.textContent = text; }
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

const SELECT_JS: &str = r#"(el, option) => {
    el.value = option;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

const OPTIONS_JS: &str = "el => Array.from(el.options || []).map(o => o.value)";

const ENABLED_JS: &str =
    "el => !el.disabled && el.getAttribute('aria-disabled') !== 'true' && !el.closest('fieldset:disabled')";

const CHECKED_JS: &str = "el => !!el.checked";

/// Click first so page handlers run, then force the state if a handler vetoed it
const SET_CHECKED_JS: &str = r#"(el, wanted) => {
    if (el.checked !== wanted) { el.click(); }
    if (el.checked !== wanted) {
        el.checked = wanted;
        el.dispatchEvent(new Event('change', { bubbles: true }));
    }
}"#;

#[derive(Debug, Deserialize)]
struct Outcome {
    stale: bool,
    #[serde(default)]
    result: Value,
}

impl WebDriver {
    /// Launch the configured browser and open one page
    pub async fn new(config: WebDriverConfig) -> AnyResult<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser_type {
            BrowserType::Chromium => launch_chromium_browser(&playwright.chromium(), &config).await?,
            BrowserType::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;
        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;

        info!("Launched {:?} (headless: {})", config.browser_type, config.headless);

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            config,
        })
    }

    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }

    /// Capture listener bound to this driver's page
    pub fn capture_listener(&self) -> WebCaptureListener {
        WebCaptureListener::new(self.page.clone())
    }

    /// Close the browser
    pub async fn close(&self) -> AnyResult<()> {
        self.browser.close().await?;
        Ok(())
    }

    /// Run `body` (a JS `(el, arg) => ...` function) against the element behind `handle`
    async fn on_element<R: DeserializeOwned>(
        &self,
        handle: &ElementHandle,
        body: &str,
        arg: Value,
    ) -> Result<R> {
        let js = format!(
            r#"(input) => {{
                const el = document.querySelector('[data-lumi-handle="' + input.token + '"]');
                if (!el || !el.isConnected) {{ return {{ stale: true, result: null }}; }}
                const result = ({body})(el, input.arg);
                return {{ stale: false, result: result === undefined ? null : result }};
            }}"#
        );
        let page = self.page.lock().await;
        let outcome: Outcome = page
            .evaluate(&js, json!({ "token": handle.as_str(), "arg": arg }))
            .await
            .map_err(|e| classify_error(&e.to_string()))?;
        drop(page);

        if outcome.stale {
            debug!("Handle {} no longer in the DOM", handle);
            return Err(MacroError::StaleReference);
        }
        serde_json::from_value(outcome.result)
            .map_err(|e| MacroError::Driver(format!("unexpected page result: {}", e)))
    }
}

#[async_trait]
impl BrowserDriver for WebDriver {
    fn name(&self) -> &str {
        "web"
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.goto_builder(url)
            .goto()
            .await
            .map_err(|e| classify_error(&e.to_string()))?;
        Ok(())
    }

    async fn find_candidates(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let page = self.page.lock().await;
        let tokens: Vec<String> = page
            .evaluate(FIND_JS, locator)
            .await
            .map_err(|e| classify_error(&e.to_string()))?;
        Ok(tokens.into_iter().map(ElementHandle::new).collect())
    }

    async fn click(&self, handle: &ElementHandle) -> Result<()> {
        self.on_element(handle, CLICK_JS, Value::Null).await
    }

    async fn set_value(&self, handle: &ElementHandle, text: &str) -> Result<()> {
        self.on_element(handle, SET_VALUE_JS, json!(text)).await
    }

    async fn select_option(&self, handle: &ElementHandle, option_id: &str) -> Result<()> {
        self.on_element(handle, SELECT_JS, json!(option_id)).await
    }

    async fn list_options(&self, handle: &ElementHandle) -> Result<Vec<String>> {
        self.on_element(handle, OPTIONS_JS, Value::Null).await
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> Result<bool> {
        self.on_element(handle, ENABLED_JS, Value::Null).await
    }

    async fn get_checked_state(&self, handle: &ElementHandle) -> Result<bool> {
        self.on_element(handle, CHECKED_JS, Value::Null).await
    }

    async fn set_checked_state(&self, handle: &ElementHandle, checked: bool) -> Result<()> {
        self.on_element(handle, SET_CHECKED_JS, json!(checked)).await
    }
}

/// Map a Playwright error message onto the driver error contract
pub(crate) fn classify_error(message: &str) -> MacroError {
    let lower = message.to_lowercase();
    let session_lost = [
        "target closed",
        "has been closed",
        "browser closed",
        "connection closed",
        "disconnected",
        "receiver is gone",
    ]
    .iter()
    .any(|needle| lower.contains(needle));

    if session_lost {
        MacroError::DriverSession(message.to_string())
    } else {
        MacroError::Driver(message.to_string())
    }
}

/// Launch a new Chromium browser, preferring an installed Chrome
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> AnyResult<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(std::path::PathBuf::from);

    let executable_path = env_path.or_else(find_system_browser);
    if let Some(ref path) = executable_path {
        info!("Using browser executable {}", path.display());
        launcher = launcher.executable(path);
    } else {
        debug!("No browser executable found, using the Playwright default");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    launcher = launcher.args(&args);

    Ok(launcher.launch().await?)
}

fn find_system_browser() -> Option<std::path::PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    common_paths
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
        .map(|p| p.to_path_buf())
}
