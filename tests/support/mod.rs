//! Scripted reader, browser and operator for integration tests.
#![allow(dead_code)]

pub mod socket_guard;

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bookcapture_core::driver::{AutomationDriver, DriverError, DriverLauncher, LaunchMode, Visibility};
use bookcapture_core::reader;
use bookcapture_core::{
    ArchiveSettings, CaptureTimings, Endpoints, PromptError, Prompter, SessionCookie,
};
use image::{ImageFormat, Rgba, RgbaImage};

pub const SESSION_COOKIE: &str = "reader_session";
pub const VALID_TOKEN: &str = "fresh-token";
pub const LOGIN_URL: &str = "https://sso.example.edu/login";

/// What the fake reader shows and records.
#[derive(Debug)]
pub struct SiteState {
    /// `None` hides the progress indicator.
    pub total_pages: Option<u32>,
    pub title: Option<String>,
    /// Token accepted for full access.
    pub valid_token: String,
    /// Pages readable without a valid token.
    pub preview_pages: u32,
    pub image_ready: bool,
    pub paid_warning: bool,
    /// Main-frame navigations emitted by an interactive context after it opens.
    pub login_navigations: Vec<String>,
    pub launches: Vec<LaunchMode>,
    pub captured: Vec<u32>,
    pub closed: usize,
}

impl Default for SiteState {
    fn default() -> Self {
        Self {
            total_pages: Some(3),
            title: Some("Linear Algebra".to_string()),
            valid_token: VALID_TOKEN.to_string(),
            preview_pages: 0,
            image_ready: true,
            paid_warning: false,
            login_navigations: Vec::new(),
            launches: Vec::new(),
            captured: Vec::new(),
            closed: 0,
        }
    }
}

/// Shared handle to the fake reader; also the [`DriverLauncher`].
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn with_pages(total: u32) -> Self {
        let site = Self::default();
        site.update(|s| s.total_pages = Some(total));
        site
    }

    pub fn update(&self, f: impl FnOnce(&mut SiteState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&SiteState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    pub fn launches(&self) -> Vec<LaunchMode> {
        self.read(|s| s.launches.clone())
    }

    pub fn captured(&self) -> Vec<u32> {
        self.read(|s| s.captured.clone())
    }

    /// A login that leaves for the SSO page and comes back to `viewer_url`.
    pub fn script_login(&self, viewer_url: &str) {
        let navigations = vec![LOGIN_URL.to_string(), viewer_url.to_string()];
        self.update(|s| s.login_navigations = navigations);
    }
}

#[async_trait]
impl DriverLauncher for FakeSite {
    async fn launch(&self, mode: LaunchMode) -> Result<Box<dyn AutomationDriver>, DriverError> {
        let navigations = self.read(|s| s.login_navigations.clone());
        self.update(|s| s.launches.push(mode));
        let navigations = match mode {
            LaunchMode::Interactive => navigations.into_iter().collect(),
            LaunchMode::Capture => VecDeque::new(),
        };
        Ok(Box::new(FakeDriver {
            site: self.clone(),
            mode,
            url: Mutex::new("about:blank".to_string()),
            cookies: Mutex::new(Vec::new()),
            navigations: Mutex::new(navigations),
            closed: Mutex::new(false),
        }))
    }
}

pub struct FakeDriver {
    site: FakeSite,
    mode: LaunchMode,
    url: Mutex<String>,
    cookies: Mutex<Vec<SessionCookie>>,
    navigations: Mutex<VecDeque<String>>,
    closed: Mutex<bool>,
}

impl FakeDriver {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if *self.closed.lock().unwrap() {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn authorized(&self) -> bool {
        let valid = self.site.read(|s| s.valid_token.clone());
        self.cookies
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.name == SESSION_COOKIE && c.value() == valid)
    }

    fn page_renders(&self, page: u32) -> bool {
        let (total, preview) = self.site.read(|s| (s.total_pages.unwrap_or(0), s.preview_pages));
        page >= 1 && page <= total && (page <= preview || self.authorized())
    }
}

/// Page number of a `#pageImgBox{n}` selector.
fn page_of(selector: &str) -> Option<u32> {
    let rest = selector.strip_prefix("#pageImgBox")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// PNG whose width equals `page`, so assembled page order is observable.
pub fn page_png(page: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(page.max(1), 2, Rgba([20, 40, 60, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[async_trait]
impl AutomationDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn wait_for(
        &self,
        selector: &str,
        _visibility: Visibility,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        self.ensure_open()?;
        if selector == reader::PROGRESS_INDICATOR {
            return Ok(self.site.read(|s| s.total_pages.is_some()));
        }
        Ok(page_of(selector).is_some_and(|page| self.page_renders(page)))
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        self.ensure_open()?;
        Ok(selector == reader::PAID_CONTENT_WARNING && self.site.read(|s| s.paid_warning))
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.ensure_open()?;
        Ok(match selector {
            s if s == reader::PROGRESS_INDICATOR => {
                self.site.read(|s| s.total_pages.map(|total| format!("1/{total}")))
            }
            s if s == reader::TITLE => self.site.read(|s| s.title.clone()),
            _ => None,
        })
    }

    async fn click(&self, _selector: &str) -> Result<bool, DriverError> {
        self.ensure_open()?;
        Ok(true)
    }

    async fn click_with_text(&self, _selector: &str, _text: &str) -> Result<bool, DriverError> {
        self.ensure_open()?;
        Ok(false)
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<bool, DriverError> {
        self.ensure_open()?;
        Ok(page_of(selector).is_some_and(|page| self.page_renders(page)))
    }

    async fn image_ready(&self, _selector: &str) -> Result<bool, DriverError> {
        self.ensure_open()?;
        Ok(self.site.read(|s| s.image_ready))
    }

    async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, DriverError> {
        self.ensure_open()?;
        let page = page_of(selector).ok_or_else(|| DriverError::ElementNotFound {
            selector: selector.to_string(),
        })?;
        self.site.update(|s| s.captured.push(page));
        Ok(page_png(page))
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError> {
        self.ensure_open()?;
        if self.mode == LaunchMode::Interactive {
            let token = self.site.read(|s| s.valid_token.clone());
            return Ok(vec![SessionCookie::new(SESSION_COOKIE, token, "127.0.0.1")]);
        }
        Ok(self.cookies.lock().unwrap().clone())
    }

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.cookies.lock().unwrap().extend_from_slice(cookies);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.ensure_open()?;
        Ok(self.url.lock().unwrap().clone())
    }

    async fn next_navigation(&self) -> Result<String, DriverError> {
        self.ensure_open()?;
        let next = self.navigations.lock().unwrap().pop_front();
        match next {
            Some(url) => {
                *self.url.lock().unwrap() = url.clone();
                Ok(url)
            }
            // The operator never finishes.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        *self.closed.lock().unwrap() = true;
        self.site.update(|s| s.closed += 1);
        Ok(())
    }
}

/// Operator with scripted answers. Records every question asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirms: Mutex<VecDeque<bool>>,
    lines: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn confirming(answers: &[bool]) -> Self {
        let prompter = Self::default();
        prompter.confirms.lock().unwrap().extend(answers.iter().copied());
        prompter
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str) -> Result<bool, PromptError> {
        self.asked.lock().unwrap().push(question.to_string());
        self.confirms.lock().unwrap().pop_front().ok_or(PromptError::Closed)
    }

    fn ask_line(&self, question: &str) -> Result<String, PromptError> {
        self.asked.lock().unwrap().push(question.to_string());
        self.lines.lock().unwrap().pop_front().ok_or(PromptError::Closed)
    }
}

/// Millisecond-scale waits so fallback paths run quickly.
pub fn fast_timings() -> CaptureTimings {
    CaptureTimings {
        overlay_timeout: Duration::ZERO,
        selector_timeout: Duration::from_millis(20),
        settle_poll: Duration::from_millis(1),
        settle_timeout: Duration::from_millis(5),
        settle_fallback: Duration::from_millis(1),
    }
}

/// Catalog endpoint that refuses connections.
pub const UNREACHABLE_CATALOG: &str = "http://127.0.0.1:9/catatree?bid={id}{volume}";

pub fn test_settings(root: &Path, catalog_pattern: &str) -> ArchiveSettings {
    let mut settings = ArchiveSettings::new(root.join("out"), root.join("session.json"));
    settings.endpoints = Endpoints::new(
        "https://{domain}/deep/m/read/pdf?bid={id}",
        catalog_pattern,
    );
    settings.timings = fast_timings();
    settings.login_timeout = Duration::from_millis(200);
    settings
}
