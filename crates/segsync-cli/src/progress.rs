use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use segsync::{ProgressEvent, ProgressSink};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} {bytes} ({bytes_per_sec})";

/// Renders progress events on the terminal.
///
/// Status lines become the bar message, transfers move the bar (a spinner
/// when the size is unknown) and each new batch item is printed above it.
pub struct TerminalProgress {
    bar: ProgressBar,
    determinate: AtomicBool,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
            determinate: AtomicBool::new(false),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn set_determinate(&self, total: Option<u64>) {
        match total {
            Some(total) => {
                if !self.determinate.swap(true, Ordering::Relaxed) {
                    self.bar.set_style(bar_style());
                }
                self.bar.set_length(total);
            }
            None => {
                if self.determinate.swap(false, Ordering::Relaxed) {
                    self.bar.set_style(spinner_style());
                }
            }
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Status(msg) => self.bar.set_message(msg),
            ProgressEvent::Transfer { current, total } => {
                self.set_determinate(total);
                self.bar.set_position(current);
            }
            ProgressEvent::Item { .. } => {
                self.bar.println(event.to_string());
                self.set_determinate(None);
                self.bar.reset();
            }
            ProgressEvent::Percent(record) => {
                tracing::trace!(name = ?record.name, percent = record.as_i32(), "progress");
            }
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_parse() {
        assert!(ProgressStyle::with_template(BAR_TEMPLATE).is_ok());
        assert!(ProgressStyle::with_template(SPINNER_TEMPLATE).is_ok());
    }

    #[test]
    fn transfer_switches_between_bar_and_spinner() {
        let progress = TerminalProgress::new();
        progress.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());

        progress.report(ProgressEvent::transfer(10, Some(100)));
        assert!(progress.determinate.load(Ordering::Relaxed));
        assert_eq!(progress.bar.length(), Some(100));
        assert_eq!(progress.bar.position(), 10);

        progress.report(ProgressEvent::transfer(20, None));
        assert!(!progress.determinate.load(Ordering::Relaxed));
        assert_eq!(progress.bar.position(), 20);
        progress.finish();
    }
}
