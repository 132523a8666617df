//! Session persistence.
//!
//! Credentials are written as a JSON array of cookies to
//! `~/.config/bookcapture/session.json` (or
//! `$XDG_CONFIG_HOME/bookcapture/session.json`) unless another path is given.
//! Browser cookie exports (`expirationDate`, `hostOnly`, or a
//! `{"cookies": [...]}` wrapper) are accepted on load.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::credentials::{SessionCookie, SessionCredentials, unix_now};
use crate::layout::write_atomically;

const SESSION_FILE_NAME: &str = "session.json";
const APP_DIR_NAME: &str = "bookcapture";

/// Errors for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No suitable user config directory is available.
    #[error("unable to determine config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigDirUnavailable,
    /// Filesystem I/O failed.
    #[error("session file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The stored payload is not a cookie list.
    #[error("session file '{path}' is not valid session JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Serialization failed.
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reads and writes [`SessionCredentials`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`default_session_path`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigDirUnavailable`] if no usable config dir is found.
    pub fn at_default_location() -> Result<Self, StoreError> {
        Ok(Self::new(default_session_path()?))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a session file is present (its contents are not checked).
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Sibling marker recording that the reader refused the stored session.
    #[must_use]
    pub fn stale_marker_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".stale");
        self.path.with_file_name(name)
    }

    /// Whether the stored session was refused by the reader in an earlier
    /// run. A stale session is not offered again until a new login replaces
    /// it.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale_marker_path().exists()
    }

    /// Records that the reader refused the stored session. Does nothing when
    /// no session file exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the marker cannot be written.
    pub fn mark_stale(&self) -> Result<(), StoreError> {
        if !self.exists() {
            return Ok(());
        }
        let marker = self.stale_marker_path();
        fs::write(&marker, b"").map_err(|e| StoreError::io(&marker, e))?;
        info!(path = %self.path.display(), "stored session marked stale");
        Ok(())
    }

    fn remove_stale_marker(&self) -> Result<(), StoreError> {
        let marker = self.stale_marker_path();
        match fs::remove_file(&marker) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&marker, e)),
        }
    }

    /// Loads stored credentials.
    ///
    /// Returns `Ok(None)` when no file exists or every stored cookie has
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on read failure and [`StoreError::Corrupt`]
    /// when the file is not a cookie list.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Option<SessionCredentials>, StoreError> {
        self.load_at(unix_now())
    }

    fn load_at(&self, now: u64) -> Result<Option<SessionCredentials>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no stored session");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let payload: StoredPayload =
            serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        let entries = match payload {
            StoredPayload::Array(entries) => entries,
            StoredPayload::Wrapped { cookies } => cookies,
        };

        let mut cookies = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match entry.into_cookie() {
                Ok(cookie) => cookies.push(cookie),
                Err(reason) => warn!(entry = index + 1, reason = %reason, "skipping stored cookie"),
            }
        }

        let mut credentials = SessionCredentials::new(cookies);
        let expired = credentials.prune_expired(now);
        if expired > 0 {
            info!(expired, "dropped expired cookies from stored session");
        }
        if credentials.is_empty() {
            debug!("stored session has no usable cookies");
            return Ok(None);
        }

        debug!(cookies = credentials.len(), "loaded stored session");
        Ok(Some(credentials))
    }

    /// Persists `credentials`, replacing any previous session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory cannot be created or the
    /// file cannot be written.
    #[instrument(level = "debug", skip(self, credentials), fields(path = %self.path.display()))]
    pub fn save(&self, credentials: &SessionCredentials) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let stored: Vec<StoredCookie> = credentials
            .cookies()
            .iter()
            .map(StoredCookie::from_session_cookie)
            .collect();
        let json = serde_json::to_vec_pretty(&stored)?;
        write_atomically(&self.path, &json).map_err(|e| StoreError::io(&self.path, e))?;
        self.remove_stale_marker()?;

        info!(cookies = credentials.len(), path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Removes the stored session and its stale marker. Returns `true` when
    /// a session file was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when removal fails.
    pub fn clear(&self) -> Result<bool, StoreError> {
        self.remove_stale_marker()?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}

/// Returns the default session path (`~/.config/bookcapture/session.json`).
///
/// # Errors
///
/// Returns [`StoreError::ConfigDirUnavailable`] if no usable config dir is found.
pub fn default_session_path() -> Result<PathBuf, StoreError> {
    let dir = resolve_config_dir(
        sanitize_env_path(env::var_os("XDG_CONFIG_HOME")),
        sanitize_env_path(env::var_os("HOME")),
        sanitize_env_path(env::var_os("APPDATA")),
    )?;
    Ok(dir.join(SESSION_FILE_NAME))
}

fn sanitize_env_path(value: Option<OsString>) -> Option<PathBuf> {
    let value = value?;
    if value.to_string_lossy().trim().is_empty() {
        return None;
    }

    Some(PathBuf::from(value))
}

fn resolve_config_dir(
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
    app_data: Option<PathBuf>,
) -> Result<PathBuf, StoreError> {
    if let Some(xdg) = xdg_config_home {
        return Ok(xdg.join(APP_DIR_NAME));
    }
    if let Some(home) = home {
        return Ok(home.join(".config").join(APP_DIR_NAME));
    }
    if let Some(app_data) = app_data {
        return Ok(app_data.join(APP_DIR_NAME));
    }

    Err(StoreError::ConfigDirUnavailable)
}

#[derive(Debug, Serialize)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    expires: u64,
    secure: bool,
    #[serde(rename = "httpOnly")]
    http_only: bool,
}

impl StoredCookie {
    fn from_session_cookie(cookie: &SessionCookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value().to_string(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            expires: cookie.expires,
            secure: cookie.secure,
            http_only: cookie.http_only,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredPayload {
    Array(Vec<StoredEntry>),
    Wrapped { cookies: Vec<StoredEntry> },
}

#[derive(Debug, Deserialize)]
struct StoredEntry {
    name: Option<String>,
    value: Option<String>,
    domain: Option<String>,
    #[serde(rename = "hostOnly")]
    host_only: Option<bool>,
    path: Option<String>,
    secure: Option<bool>,
    #[serde(rename = "httpOnly")]
    http_only: Option<bool>,
    #[serde(rename = "expirationDate")]
    expiration_date: Option<f64>,
    expires: Option<f64>,
}

impl StoredEntry {
    fn into_cookie(self) -> Result<SessionCookie, String> {
        let name = self.name.unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err("missing required field: name".to_string());
        }
        let mut domain = self.domain.unwrap_or_default().trim().to_string();
        if domain.is_empty() {
            return Err(format!("cookie '{name}' has no domain"));
        }
        if self.host_only == Some(false) && !domain.starts_with('.') {
            domain = format!(".{domain}");
        }
        let value = self.value.unwrap_or_default();
        if value.is_empty() {
            return Err(format!("cookie '{name}' for domain '{domain}' has empty value"));
        }
        let path = match self.path {
            Some(path) if path.starts_with('/') => path,
            Some(path) if !path.trim().is_empty() => format!("/{path}"),
            _ => "/".to_string(),
        };
        let expires = self
            .expiration_date
            .or(self.expires)
            .map_or(0, normalized_expiry);

        Ok(SessionCookie::new(name, value, domain)
            .with_path(path)
            .with_flags(self.secure.unwrap_or(false), self.http_only.unwrap_or(false))
            .with_expires(expires))
    }
}

/// Browsers report session cookies as `-1`; fractional seconds are floored.
fn normalized_expiry(raw_expiry: f64) -> u64 {
    if !raw_expiry.is_finite() || raw_expiry <= 0.0 {
        return 0;
    }

    let floored = raw_expiry.floor();
    let integer_text = format!("{floored:.0}");
    integer_text.parse::<u64>().unwrap_or(u64::MAX)
}
