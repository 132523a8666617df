//! Session cookies and the reqwest jar loader.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::cookie::Jar;
use tracing::{debug, warn};

/// One credential token captured from the reader.
///
/// The value field is redacted in Debug output to prevent accidental logging
/// of session secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    /// Domain the cookie belongs to; a leading dot matches subdomains.
    pub domain: String,
    /// URL path scope.
    pub path: String,
    /// Only sent over HTTPS.
    pub secure: bool,
    /// Hidden from page scripts.
    pub http_only: bool,
    /// Unix timestamp for expiry (0 = session cookie).
    pub expires: u64,
    /// Cookie value (sensitive, never logged).
    value: String,
}

impl SessionCookie {
    /// Creates a session-scoped cookie on path `/`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            expires: 0,
            value: value.into(),
        }
    }

    /// Sets the expiry timestamp.
    #[must_use]
    pub fn with_expires(mut self, expires: u64) -> Self {
        self.expires = expires;
        self
    }

    /// Sets the secure and http-only flags.
    #[must_use]
    pub fn with_flags(mut self, secure: bool, http_only: bool) -> Self {
        self.secure = secure;
        self.http_only = http_only;
        self
    }

    /// Sets the path scope.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive; do not log the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether an explicit expiry lies at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires > 0 && self.expires <= now
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("expires", &self.expires)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// The ordered cookie set that authenticates a reader session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    cookies: Vec<SessionCookie>,
}

impl SessionCredentials {
    #[must_use]
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self { cookies }
    }

    #[must_use]
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Drops cookies whose explicit expiry has passed. Returns how many were dropped.
    pub fn prune_expired(&mut self, now: u64) -> usize {
        let before = self.cookies.len();
        self.cookies.retain(|cookie| !cookie.is_expired_at(now));
        before - self.cookies.len()
    }

    /// Loads the cookies into a reqwest jar for HTTP requests.
    #[must_use]
    pub fn to_jar(&self) -> Arc<Jar> {
        let jar = Arc::new(Jar::default());

        for cookie in &self.cookies {
            let set_cookie = build_set_cookie_string(cookie);
            let origin_url = build_origin_url(cookie);

            if let Ok(url) = origin_url.parse::<url::Url>() {
                jar.add_cookie_str(&set_cookie, &url);
                debug!(
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "loaded cookie into jar"
                );
            } else {
                warn!(
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "skipping cookie with unparseable domain"
                );
            }
        }

        jar
    }
}

/// Builds a `Set-Cookie` header string from a [`SessionCookie`].
///
/// Host-only cookies (no leading dot) carry no `Domain` attribute, so the jar
/// scopes them to the exact origin host.
fn build_set_cookie_string(cookie: &SessionCookie) -> String {
    let mut parts = vec![format!("{}={}", cookie.name, cookie.value())];

    if cookie.domain.starts_with('.') {
        parts.push(format!("Domain={}", cookie.domain));
    }
    parts.push(format!("Path={}", cookie.path));

    if cookie.secure {
        parts.push("Secure".to_string());
    }
    if cookie.http_only {
        parts.push("HttpOnly".to_string());
    }

    // 0 = session cookie, omit Expires
    if cookie.expires > 0 {
        if let Some(expires_str) = unix_to_http_date(cookie.expires) {
            parts.push(format!("Expires={expires_str}"));
        } else {
            warn!(
                domain = %cookie.domain,
                name = %cookie.name,
                expires = cookie.expires,
                "cookie expiry timestamp overflows SystemTime; treating as session cookie"
            );
        }
    }

    parts.join("; ")
}

/// Builds the origin URL for `Jar::add_cookie_str`.
///
/// Uses `https://` for secure cookies and `http://` for non-secure.
/// Strips the leading dot from the domain for the URL.
fn build_origin_url(cookie: &SessionCookie) -> String {
    let scheme = if cookie.secure { "https" } else { "http" };
    let domain = cookie.domain.strip_prefix('.').unwrap_or(&cookie.domain);
    format!("{scheme}://{domain}{}", cookie.path)
}

fn unix_to_http_date(timestamp: u64) -> Option<String> {
    let time = UNIX_EPOCH.checked_add(std::time::Duration::from_secs(timestamp))?;
    Some(httpdate::fmt_http_date(time))
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    #[test]
    fn test_debug_redacts_value() {
        let cookie = SessionCookie::new("sid", "super-secret", ".example.com");
        let rendered = format!("{cookie:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_is_expired_at() {
        let session = SessionCookie::new("a", "1", "h");
        assert!(!session.is_expired_at(u64::MAX));
        let expiring = SessionCookie::new("a", "1", "h").with_expires(100);
        assert!(expiring.is_expired_at(100));
        assert!(!expiring.is_expired_at(99));
    }

    #[test]
    fn test_prune_expired_keeps_order() {
        let mut creds = SessionCredentials::new(vec![
            SessionCookie::new("a", "1", "h").with_expires(500),
            SessionCookie::new("b", "2", "h").with_expires(50),
            SessionCookie::new("c", "3", "h"),
        ]);
        assert_eq!(creds.prune_expired(100), 1);
        let names: Vec<_> = creds.cookies().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn test_set_cookie_string_host_only_has_no_domain() {
        let cookie = SessionCookie::new("sid", "v", "reader.example.com").with_flags(true, true);
        let header = build_set_cookie_string(&cookie);
        assert_eq!(header, "sid=v; Path=/; Secure; HttpOnly");
    }

    #[test]
    fn test_set_cookie_string_tailmatch_has_domain_and_expiry() {
        let cookie = SessionCookie::new("sid", "v", ".example.com").with_expires(1_700_000_000);
        let header = build_set_cookie_string(&cookie);
        assert!(header.starts_with("sid=v; Domain=.example.com; Path=/"));
        assert!(header.contains("Expires=Tue, 14 Nov 2023"));
    }

    #[test]
    fn test_origin_url_strips_leading_dot() {
        let cookie = SessionCookie::new("a", "1", ".example.com").with_flags(true, false);
        assert_eq!(build_origin_url(&cookie), "https://example.com/");
    }

    #[test]
    fn test_jar_sends_cookies_to_matching_host() {
        let creds = SessionCredentials::new(vec![
            SessionCookie::new("sid", "abc", "reader.example.com"),
            SessionCookie::new("other", "zzz", "elsewhere.example.org"),
        ]);
        let jar = creds.to_jar();
        let url: url::Url = "http://reader.example.com/deep/book".parse().unwrap();
        let header = jar.cookies(&url).unwrap();
        assert_eq!(header.to_str().unwrap(), "sid=abc");
    }
}
