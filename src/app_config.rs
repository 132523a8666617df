//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// TOML-backed file configuration for bookcapture defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Default output directory for artifacts and PDFs.
    pub output_dir: Option<PathBuf>,
    /// Session file location.
    pub session_file: Option<PathBuf>,
    /// Default reader domain.
    pub domain: Option<String>,
    /// User agent for browser contexts and catalog requests.
    pub user_agent: Option<String>,
    /// Run capture contexts without a window.
    pub headless: Option<bool>,
    /// Explicit Chrome/Chromium binary.
    pub chrome_executable: Option<PathBuf>,
    /// Interactive login budget in seconds.
    pub login_timeout_secs: Option<u64>,
    /// Budget for required reader elements in seconds.
    pub selector_timeout_secs: Option<u64>,
    /// Budget for a page image to report ready, in milliseconds.
    pub settle_timeout_ms: Option<u64>,
    /// Fixed delay used when the ready check never holds, in milliseconds.
    pub settle_fallback_ms: Option<u64>,
    /// JPEG quality for embedded pages.
    pub jpeg_quality: Option<u8>,
    /// Produce the outlined document.
    pub outline: Option<bool>,
    /// Remove page images after a complete run.
    pub clean_up: Option<bool>,
    /// Reader URL pattern (`{domain}`, `{id}`).
    pub viewer_url_pattern: Option<String>,
    /// Catalog URL pattern (`{domain}`, `{id}`, `{volume}`).
    pub catalog_url_pattern: Option<String>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("login_timeout_secs", self.login_timeout_secs, 10, 3600)?;
        validate_range("selector_timeout_secs", self.selector_timeout_secs, 1, 600)?;
        validate_range("settle_timeout_ms", self.settle_timeout_ms, 0, 60_000)?;
        validate_range("settle_fallback_ms", self.settle_fallback_ms, 0, 60_000)?;
        validate_range(
            "jpeg_quality",
            self.jpeg_quality.map(u64::from),
            1,
            100,
        )?;
        validate_pattern("viewer_url_pattern", self.viewer_url_pattern.as_deref())?;
        validate_pattern("catalog_url_pattern", self.catalog_url_pattern.as_deref())?;
        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

fn validate_pattern(field: &str, value: Option<&str>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !value.contains("{id}") {
        bail!("Invalid config value for `{field}`: '{value}'. Expected a `{{id}}` placeholder");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log filter directive for this mode.
    #[must_use]
    pub fn level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/bookcapture/config.toml`
/// 2. `$HOME/.config/bookcapture/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("bookcapture")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("bookcapture")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(parse_string_literal(value).with_context(context)?));
            }
            "session_file" => {
                cfg.session_file = Some(PathBuf::from(parse_string_literal(value).with_context(context)?));
            }
            "chrome_executable" => {
                cfg.chrome_executable =
                    Some(PathBuf::from(parse_string_literal(value).with_context(context)?));
            }
            "domain" => cfg.domain = Some(parse_string_literal(value).with_context(context)?),
            "user_agent" => cfg.user_agent = Some(parse_string_literal(value).with_context(context)?),
            "viewer_url_pattern" => {
                cfg.viewer_url_pattern = Some(parse_string_literal(value).with_context(context)?);
            }
            "catalog_url_pattern" => {
                cfg.catalog_url_pattern = Some(parse_string_literal(value).with_context(context)?);
            }
            "headless" => cfg.headless = Some(parse_boolean(value).with_context(context)?),
            "outline" => cfg.outline = Some(parse_boolean(value).with_context(context)?),
            "clean_up" => cfg.clean_up = Some(parse_boolean(value).with_context(context)?),
            "login_timeout_secs" => {
                cfg.login_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "selector_timeout_secs" => {
                cfg.selector_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "settle_timeout_ms" => {
                cfg.settle_timeout_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "settle_fallback_ms" => {
                cfg.settle_fallback_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "jpeg_quality" => {
                cfg.jpeg_quality = Some(parse_integer_u8(value).with_context(context)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let value = parse_integer_u64(raw_value)?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
domain = "lib.example.edu"
login_timeout_secs = 600
verbosity = "verbose"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.domain.as_deref(), Some("lib.example.edu"));
        assert_eq!(cfg.login_timeout_secs, Some(600));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
        assert!(cfg.output_dir.is_none());
    }

    #[test]
    fn test_parse_config_paths_and_switches() {
        let cfg = parse_config_str(
            r#"
output_dir = "/srv/books"
session_file = "/srv/session.json"
headless = false
outline = false
clean_up = true
jpeg_quality = 85
"#,
        )
        .unwrap();
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/srv/books")));
        assert_eq!(cfg.session_file, Some(PathBuf::from("/srv/session.json")));
        assert_eq!(cfg.headless, Some(false));
        assert_eq!(cfg.outline, Some(false));
        assert_eq!(cfg.clean_up, Some(true));
        assert_eq!(cfg.jpeg_quality, Some(85));
    }

    #[test]
    fn test_parse_config_rejects_login_timeout_out_of_range() {
        let err = parse_config_str("login_timeout_secs = 5").expect_err("below range");
        assert!(err.to_string().contains("login_timeout_secs"));
        assert!(err.to_string().contains("10..=3600"));
    }

    #[test]
    fn test_parse_config_rejects_jpeg_quality_zero() {
        let err = parse_config_str("jpeg_quality = 0").expect_err("below range");
        assert!(err.to_string().contains("jpeg_quality"));
    }

    #[test]
    fn test_parse_config_rejects_jpeg_quality_too_large_for_u8() {
        let err = parse_config_str("jpeg_quality = 300").expect_err("out of u8 range");
        assert!(err.to_string().contains("jpeg_quality"));
    }

    #[test]
    fn test_parse_config_rejects_settle_fallback_too_large() {
        let err = parse_config_str("settle_fallback_ms = 60001").expect_err("above range");
        assert!(err.to_string().contains("settle_fallback_ms"));
    }

    #[test]
    fn test_parse_config_rejects_pattern_without_id() {
        let err = parse_config_str(r#"viewer_url_pattern = "https://{domain}/read""#)
            .expect_err("pattern without id");
        assert!(err.to_string().contains("viewer_url_pattern"));
    }

    #[test]
    fn test_parse_config_keeps_hash_inside_strings() {
        let cfg = parse_config_str(
            r#"catalog_url_pattern = "https://{domain}/toc?bid={id}#top" # trailing"#,
        )
        .unwrap();
        assert_eq!(
            cfg.catalog_url_pattern.as_deref(),
            Some("https://{domain}/toc?bid={id}#top")
        );
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("selector_timeout_secs = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(err.to_string().contains("selector_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("headless = yes").expect_err("invalid boolean expected");
        assert!(err.to_string().contains("headless"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("headless true").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(VerbositySetting::Default.level(), "info");
        assert_eq!(VerbositySetting::Verbose.level(), "debug");
        assert_eq!(VerbositySetting::Quiet.level(), "error");
        assert_eq!(VerbositySetting::Debug.level(), "trace");
    }
}
