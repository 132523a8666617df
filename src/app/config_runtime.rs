//! Merges CLI flags, the config file and built-in defaults.
//!
//! Precedence: CLI flag > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use bookcapture_core::ArchiveSettings;
use bookcapture_core::auth::default_session_path;
use bookcapture_core::endpoints::{DEFAULT_CATALOG_PATTERN, DEFAULT_VIEWER_PATTERN, Endpoints};
use bookcapture_core::settings::DEFAULT_LOGIN_TIMEOUT_SECS;

use crate::app_config::{FileConfig, VerbositySetting};
use crate::cli::Args;

/// Log filter used when `RUST_LOG` is unset.
///
/// Priority: `--quiet` > `-v/-vv` > config verbosity > `info`.
pub(crate) fn resolve_default_log_level(args: &Args, file: Option<&FileConfig>) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => file
            .and_then(|cfg| cfg.verbosity)
            .map_or("info", VerbositySetting::level),
        1 => "debug",
        _ => "trace",
    }
}

/// Domain override from the command line or config file, if any.
pub(crate) fn configured_domain(args: &Args, file: Option<&FileConfig>) -> Option<String> {
    args.domain
        .clone()
        .or_else(|| file.and_then(|cfg| cfg.domain.clone()))
}

/// Builds the library settings for one run.
pub(crate) fn build_settings(args: &Args, file: Option<&FileConfig>) -> Result<ArchiveSettings> {
    let file = file.cloned().unwrap_or_default();

    let output_dir = args
        .output_dir
        .clone()
        .or(file.output_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let session_file = match args.session_file.clone().or(file.session_file) {
        Some(path) => path,
        None => default_session_path()?,
    };

    let mut settings = ArchiveSettings::new(output_dir, session_file);
    settings.endpoints = Endpoints::new(
        file.viewer_url_pattern
            .unwrap_or_else(|| DEFAULT_VIEWER_PATTERN.to_string()),
        file.catalog_url_pattern
            .unwrap_or_else(|| DEFAULT_CATALOG_PATTERN.to_string()),
    );

    if let Some(user_agent) = file.user_agent {
        settings.browser.user_agent = user_agent;
    }
    settings.browser.headless_capture = !args.headed && file.headless.unwrap_or(true);
    settings.browser.chrome_executable = file.chrome_executable;

    settings.login_timeout = Duration::from_secs(
        args.login_timeout
            .or(file.login_timeout_secs)
            .unwrap_or(DEFAULT_LOGIN_TIMEOUT_SECS),
    );
    if let Some(secs) = file.selector_timeout_secs {
        settings.timings.selector_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = file.settle_timeout_ms {
        settings.timings.settle_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = file.settle_fallback_ms {
        settings.timings.settle_fallback = Duration::from_millis(ms);
    }
    if let Some(quality) = file.jpeg_quality {
        settings.assembly.jpeg_quality = quality;
    }

    settings.fresh_login = args.fresh_login;
    settings.outline = !args.no_outline && file.outline.unwrap_or(true);
    settings.clean_up = args.clean_up || file.clean_up.unwrap_or(false);
    Ok(settings)
}
