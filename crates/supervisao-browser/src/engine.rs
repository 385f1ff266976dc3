use crate::actions::{PageLauncher, PortalPage};
use crate::controls::{ControlInspector, ControlProbe, FormControlKind};
use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Options for launching a browser instance.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub executable: Option<PathBuf>,
    /// Upper bound for a single CDP request (navigation included)
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1366,
            window_height: 768,
            executable: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One browser process with exactly one page.
pub struct BrowserEngine {
    browser: Option<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserEngine {
    /// Launch a new browser and open a blank page.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(options.window_width, options.window_height)
            .request_timeout(options.request_timeout);

        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }

        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                // Handle events if needed
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        tracing::debug!(headless = options.headless, "browser launched");

        Ok(Self {
            browser: Some(browser),
            page,
            handler,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        if self.browser.is_none() {
            return Err(BrowserError::Closed);
        }
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::ScriptError(format!("unexpected script result: {e}")))
    }
}

/// Render a Rust string as a JavaScript string literal.
fn js_str(value: &str) -> String {
    // JSON string syntax is a subset of JS string literal syntax
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[derive(Deserialize)]
struct ProbeReply {
    found: bool,
    tag: Option<String>,
    #[serde(rename = "type")]
    input_type: Option<String>,
}

#[async_trait::async_trait]
impl ControlInspector for BrowserEngine {
    async fn inspect_control(&self, selector: &str) -> Result<Option<FormControlKind>> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return {{ found: false, tag: null, type: null }};
                return {{ found: true, tag: el.tagName.toLowerCase(), type: el.getAttribute('type') }};
            }})()"#,
            sel = js_str(selector)
        );

        let reply: ProbeReply = self.eval(script).await?;
        if !reply.found {
            return Ok(None);
        }

        let probe = ControlProbe {
            tag: reply.tag.unwrap_or_default(),
            input_type: reply.input_type,
        };
        Ok(Some(probe.kind()))
    }
}

#[async_trait::async_trait]
impl PortalPage for BrowserEngine {
    async fn navigate(&self, url: &str) -> Result<()> {
        if self.browser.is_none() {
            return Err(BrowserError::Closed);
        }
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        if self.browser.is_none() {
            return Err(BrowserError::Closed);
        }
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.focus();
                if ('value' in el) {{ el.value = {val}; }} else {{ el.textContent = {val}; }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_str(selector),
            val = js_str(value)
        );

        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        if self.browser.is_none() {
            return Err(BrowserError::Closed);
        }
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("click on {selector}: {e}")))?;
        Ok(())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<()> {
        if self.browser.is_none() {
            return Err(BrowserError::Closed);
        }
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationError(e.to_string())),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation did not finish within {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return 'missing';
                const wanted = {val};
                const option = Array.from(el.options || []).find(o => o.value === wanted);
                if (!option) return 'no-option';
                el.value = wanted;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"#,
            sel = js_str(selector),
            val = js_str(value)
        );

        match self.eval::<String>(script).await?.as_str() {
            "ok" => Ok(()),
            "no-option" => Err(BrowserError::OptionNotFound {
                selector: selector.to_string(),
                value: value.to_string(),
            }),
            _ => Err(BrowserError::SelectorNotFound(selector.to_string())),
        }
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()> {
        // Clicking keeps the portal's own change handlers in the loop
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                if (el.checked !== {want}) {{ el.click(); }}
                return true;
            }})()"#,
            sel = js_str(selector),
            want = checked
        );

        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let result = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::ChromiumError(e.to_string()));

        if let Err(e) = browser.wait().await {
            tracing::warn!("Failed to reap browser process: {}", e);
        }
        self.handler.abort();

        tracing::debug!("browser closed");
        result
    }
}

/// Launches a chromium-backed page per report.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    options: LaunchOptions,
}

impl ChromiumLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait::async_trait]
impl PageLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PortalPage>> {
        let engine = BrowserEngine::launch(&self.options).await?;
        Ok(Box::new(engine))
    }
}
