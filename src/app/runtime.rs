use std::io::{self, IsTerminal};

use anyhow::Result;
use bookcapture_core::driver::ChromiumLauncher;
use bookcapture_core::{Archiver, SessionStore, TerminalPrompter};
use clap::Parser;
use tracing::{debug, error, info};

use crate::ProcessExit;
use crate::app::progress_manager::CaptureProgress;
use crate::app::{config_runtime, exit_handler, input, report, terminal};
use crate::app_config;
use crate::cli::Args;

pub(crate) async fn run_bookcapture() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded = app_config::load_default_file_config()?;
    let file_config = loaded.config.as_ref();

    let default_level = config_runtime::resolve_default_log_level(&args, file_config);
    terminal::init_tracing(default_level, terminal::is_no_color_requested(&args));
    debug!(?args, config = ?loaded.path, from_file = file_config.is_some(), "CLI arguments parsed");

    let settings = config_runtime::build_settings(&args, file_config)?;

    if args.clear_session {
        let store = SessionStore::new(&settings.session_file);
        if store.clear()? {
            println!("Removed saved session {}", store.path().display());
        } else {
            println!("No saved session at {}", store.path().display());
        }
        return Ok(ProcessExit::Success);
    }

    let prompter = TerminalPrompter::default();
    let domain = config_runtime::configured_domain(&args, file_config);
    let target = input::resolve_target(
        args.document.as_deref(),
        args.volume,
        domain.as_deref(),
        &prompter,
    )?;
    info!(
        target = %target,
        output_dir = %settings.output_dir.display(),
        "Bookcapture starting"
    );

    let progress = CaptureProgress::new(terminal::should_show_progress(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    ));
    let launcher = ChromiumLauncher::new(settings.browser.clone());
    let archiver = Archiver::new(settings, &launcher, &prompter).with_observer(&progress);

    let result = archiver.archive(&target).await;
    progress.finish();

    match &result {
        Ok(summary) => {
            for line in report::render_summary_lines(summary) {
                println!("{line}");
            }
        }
        Err(e) => {
            error!(error = %e, "archive run failed");
            for line in report::render_failure_lines(e) {
                eprintln!("{line}");
            }
        }
    }

    Ok(exit_handler::determine_exit_outcome(&result))
}
