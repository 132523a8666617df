//! Progress UI (bar) for page capture.

use bookcapture_core::{CaptureEvent, CaptureObserver};
use indicatif::{ProgressBar, ProgressStyle};

/// Page progress bar fed by capture events. Hidden when not on a terminal.
pub(crate) struct CaptureProgress {
    bar: ProgressBar,
}

impl CaptureProgress {
    pub(crate) fn new(visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len} pages (eta {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> (u64, Option<u64>) {
        (self.bar.position(), self.bar.length())
    }
}

impl CaptureObserver for CaptureProgress {
    fn on_event(&self, event: &CaptureEvent) {
        match event {
            CaptureEvent::Discovered { title, total } => {
                self.bar.set_length(u64::from(*total));
                self.bar.set_message(title.clone());
            }
            CaptureEvent::PageSkipped { page, .. } => {
                self.bar.set_position(u64::from(*page));
                // Skipped pages would skew the rate estimate.
                self.bar.reset_eta();
            }
            CaptureEvent::PageCaptured { page, .. } => {
                self.bar.set_position(u64::from(*page));
            }
        }
    }
}
