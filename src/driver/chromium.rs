//! Chromium driver over the Chrome DevTools Protocol.
//!
//! DOM queries run as small page scripts so absence is reported as a value
//! instead of a protocol error. Navigation completion is observed through
//! `Page.frameNavigated` events.

#[cfg(feature = "browser")]
use std::path::{Path, PathBuf};
#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventFrameNavigated, NavigateParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::listeners::EventStream;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures_util::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;

#[cfg(feature = "browser")]
use super::Visibility;
use super::{AutomationDriver, DriverError, DriverLauncher, LaunchMode};
#[cfg(feature = "browser")]
use crate::auth::SessionCookie;
use crate::settings::BrowserSettings;

/// Interval between DOM checks while waiting for a selector.
#[cfg(feature = "browser")]
const SELECTOR_POLL: Duration = Duration::from_millis(200);

#[cfg(feature = "browser")]
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Common Chrome executable paths to check.
#[cfg(feature = "browser")]
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

#[cfg(feature = "browser")]
const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Launches Chromium contexts configured by [`BrowserSettings`].
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self, mode: LaunchMode) -> Result<Box<dyn AutomationDriver>, DriverError> {
        let chrome_path = match &self.settings.chrome_executable {
            Some(path) => path.clone(),
            None => find_chrome()?,
        };

        let headless = mode == LaunchMode::Capture && self.settings.headless_capture;
        let ((width, height), scale, mobile) = match mode {
            LaunchMode::Interactive => (self.settings.login_window, 1.0, true),
            LaunchMode::Capture => (
                self.settings.capture_window,
                self.settings.capture_scale,
                false,
            ),
        };
        info!(?mode, headless, "launching browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height);
        // with_head means NOT headless
        if !headless {
            builder = builder.with_head();
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-dev-shm-usage");
        if headless {
            builder = builder.arg("--no-sandbox").arg("--disable-gpu");
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(protocol)?;
        page.execute(SetUserAgentOverrideParams::new(
            self.settings.user_agent.clone(),
        ))
        .await
        .map_err(protocol)?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(width),
            i64::from(height),
            scale,
            mobile,
        ))
        .await
        .map_err(protocol)?;
        let navigations = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(protocol)?;

        Ok(Box::new(ChromiumDriver {
            browser: Mutex::new(Some(browser)),
            page,
            navigations: Mutex::new(navigations),
            handler_task: Some(handler_task),
            closed: false,
        }))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self, _mode: LaunchMode) -> Result<Box<dyn AutomationDriver>, DriverError> {
        let _ = &self.settings;
        Err(DriverError::Unsupported)
    }
}

#[cfg(feature = "browser")]
fn find_chrome() -> Result<PathBuf, DriverError> {
    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            debug!(path = %p.display(), "found Chrome");
            return Ok(p.to_path_buf());
        }
    }

    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            for cmd in CHROME_COMMANDS {
                let candidate = dir.join(cmd);
                if candidate.is_file() {
                    debug!(path = %candidate.display(), "found Chrome in PATH");
                    return Ok(candidate);
                }
            }
        }
    }

    Err(DriverError::Launch(
        "Chrome/Chromium not found; install it or set `chrome_executable`".to_string(),
    ))
}

#[cfg(feature = "browser")]
fn protocol(err: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(err.to_string())
}

/// Encodes `value` as a JavaScript string literal.
#[cfg(feature = "browser")]
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// One launched browser with a single page.
#[cfg(feature = "browser")]
struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    navigations: Mutex<EventStream<EventFrameNavigated>>,
    handler_task: Option<JoinHandle<()>>,
    closed: bool,
}

#[cfg(feature = "browser")]
impl ChromiumDriver {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, DriverError> {
        self.ensure_open()?;
        self.page
            .evaluate(script)
            .await
            .map_err(protocol)?
            .into_value::<T>()
            .map_err(protocol)
    }

    async fn matches_selector(
        &self,
        selector: &str,
        visibility: Visibility,
    ) -> Result<bool, DriverError> {
        let visible = matches!(visibility, Visibility::Visible);
        self.eval(format!(
            r"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                if (!{visible}) return true;
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                return rect.width > 0 && rect.height > 0
                    && style.visibility !== 'hidden' && style.display !== 'none';
            }})()",
            sel = js_string(selector),
        ))
        .await
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl AutomationDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        debug!(url, "navigating");
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(DriverError::Protocol)?;
        tokio::time::timeout(NAVIGATION_TIMEOUT, async {
            self.page.execute(params).await.map_err(protocol)?;
            self.page.wait_for_navigation().await.map_err(protocol)?;
            Ok::<(), DriverError>(())
        })
        .await
        .map_err(|_| {
            DriverError::Protocol(format!(
                "navigation to {url} timed out after {}s",
                NAVIGATION_TIMEOUT.as_secs()
            ))
        })??;
        // Events from this navigation must not satisfy a later wait.
        let fresh = self
            .page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(protocol)?;
        *self.navigations.lock().await = fresh;
        Ok(())
    }

    async fn wait_for(
        &self,
        selector: &str,
        visibility: Visibility,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.matches_selector(selector, visibility).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(selector, ?timeout, "selector wait timed out");
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        self.matches_selector(selector, Visibility::Attached).await
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.textContent.trim() : null; }})()",
            js_string(selector)
        ))
        .await
    }

    async fn click(&self, selector: &str) -> Result<bool, DriverError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
            js_string(selector)
        ))
        .await
    }

    async fn click_with_text(&self, selector: &str, text: &str) -> Result<bool, DriverError> {
        self.eval(format!(
            r"(() => {{
                const el = Array.from(document.querySelectorAll({sel}))
                    .find((node) => node.textContent.trim() === {text});
                if (!el) return false;
                el.click();
                return true;
            }})()",
            sel = js_string(selector),
            text = js_string(text),
        ))
        .await
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<bool, DriverError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.scrollIntoView({{ behavior: 'instant', block: 'center' }}); return true; }})()",
            js_string(selector)
        ))
        .await
    }

    async fn image_ready(&self, selector: &str) -> Result<bool, DriverError> {
        self.eval(format!(
            "(() => {{ const img = document.querySelector({}); return !!img && img.complete && img.naturalWidth > 0; }})()",
            js_string(selector)
        ))
        .await
    }

    async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, DriverError> {
        self.ensure_open()?;
        let element = self.page.find_element(selector).await.map_err(|e| {
            debug!(selector, error = %e, "element lookup failed");
            DriverError::ElementNotFound {
                selector: selector.to_string(),
            }
        })?;
        element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(protocol)
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError> {
        self.ensure_open()?;
        let cookies = self.page.get_cookies().await.map_err(protocol)?;
        Ok(cookies
            .into_iter()
            .map(|c| {
                let expires = if c.expires.is_finite() && c.expires > 0.0 {
                    format!("{:.0}", c.expires.floor()).parse().unwrap_or(u64::MAX)
                } else {
                    0
                };
                SessionCookie::new(c.name, c.value, c.domain)
                    .with_path(c.path)
                    .with_flags(c.secure, c.http_only)
                    .with_expires(expires)
            })
            .collect())
    }

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> Result<(), DriverError> {
        self.ensure_open()?;
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            match CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value().to_string())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build()
            {
                Ok(param) => params.push(param),
                Err(e) => warn!(name = %cookie.name, error = %e, "failed to build cookie"),
            }
        }
        self.page.set_cookies(params).await.map_err(protocol)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.ensure_open()?;
        Ok(self
            .page
            .url()
            .await
            .map_err(protocol)?
            .unwrap_or_default())
    }

    async fn next_navigation(&self) -> Result<String, DriverError> {
        self.ensure_open()?;
        let mut navigations = self.navigations.lock().await;
        while let Some(event) = navigations.next().await {
            if event.frame.parent_id.is_none() {
                debug!(url = %event.frame.url, "main frame navigated");
                return Ok(event.frame.url.clone());
            }
        }
        Err(DriverError::Closed)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.page.clone().close().await {
            debug!(error = %e, "page close failed");
        }
        if let Some(mut browser) = self.browser.get_mut().take() {
            if let Err(e) = browser.close().await {
                debug!(error = %e, "browser close failed");
            }
            let _ = browser.wait().await;
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        debug!("browser context closed");
        Ok(())
    }
}
