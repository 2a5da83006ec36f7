//! Terminal progress for send and receive sessions

use crate::prompt::{LineSource, Prompter};
use ferry_core::{ProgressUpdate, ReceiveObserver, TransferObserver};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::time::Duration;

const SPINNER_TICK: Duration = Duration::from_millis(120);

/// Format a byte count with a binary unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

fn rate_text(update: &ProgressUpdate) -> String {
    update
        .throughput
        .map_or_else(|| "-- KB/s".to_string(), |rate| rate.to_string())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {percent}% ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {elapsed_precise} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Progress bar over the size of the file being sent.
pub struct SendProgress {
    label: String,
    bar: Option<ProgressBar>,
    visible: bool,
}

impl SendProgress {
    /// Bar drawn on the terminal, prefixed with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bar: None,
            visible: true,
        }
    }

    /// Bar that tracks progress without drawing.
    #[cfg(test)]
    pub fn hidden(label: impl Into<String>) -> Self {
        Self {
            visible: false,
            ..Self::new(label)
        }
    }

    /// Bytes the bar has counted
    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.bar.as_ref().map_or(0, ProgressBar::position)
    }
}

impl TransferObserver for SendProgress {
    fn on_start(&mut self, expected_bytes: Option<u64>) {
        let bar = ProgressBar::with_draw_target(
            expected_bytes,
            if self.visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        bar.set_style(bar_style());
        bar.set_prefix(self.label.clone());
        self.bar = Some(bar);
    }

    fn on_progress(&mut self, update: &ProgressUpdate) {
        if let Some(bar) = &self.bar {
            bar.set_position(update.total_bytes);
            bar.set_message(rate_text(update));
        }
    }

    fn on_finish(&mut self, _total_bytes: u64) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }
}

/// Spinner with the running byte count and average rate of a receive.
///
/// Also answers the pending-bytes offer through its prompter, before the
/// spinner starts drawing.
pub struct ReceiveProgress<R, W> {
    prompter: Prompter<R, W>,
    spinner: Option<ProgressBar>,
    visible: bool,
}

impl<R: LineSource, W: Write> ReceiveProgress<R, W> {
    /// Spinner drawn on the terminal.
    pub fn new(prompter: Prompter<R, W>) -> Self {
        Self {
            prompter,
            spinner: None,
            visible: true,
        }
    }

    /// Spinner that tracks progress without drawing.
    #[cfg(test)]
    pub fn hidden(prompter: Prompter<R, W>) -> Self {
        Self {
            visible: false,
            ..Self::new(prompter)
        }
    }

    /// Last message shown next to the spinner
    #[cfg(test)]
    pub fn message(&self) -> String {
        self.spinner
            .as_ref()
            .map(|s| s.message().to_string())
            .unwrap_or_default()
    }

    fn say(&mut self, message: &str) {
        if let Err(e) = self.prompter.say(message) {
            tracing::debug!(error = %e, "Failed to write to the terminal");
        }
    }
}

impl<R: LineSource, W: Write> TransferObserver for ReceiveProgress<R, W> {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!(
                "{} received, average {}",
                format_bytes(update.total_bytes),
                rate_text(update)
            ));
        }
    }
}

impl<R: LineSource, W: Write> ReceiveObserver for ReceiveProgress<R, W> {
    fn offer_pending(&mut self, pending: &[u8]) -> bool {
        let question = format!(
            "{} already waiting on the port. Keep them?",
            format_bytes(pending.len() as u64)
        );
        let keep = match self.prompter.confirm(&question) {
            Ok(keep) => keep,
            Err(e) => {
                tracing::warn!(error = %e, "No answer to the pending-bytes offer, discarding");
                false
            }
        };
        self.say(if keep {
            "Keeping pending bytes."
        } else {
            "Discarding pending bytes."
        });
        keep
    }

    fn on_listening(&mut self) {
        self.say("Press Enter to stop receiving.");
        let spinner = ProgressBar::with_draw_target(
            None,
            if self.visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        spinner.set_style(spinner_style());
        spinner.set_message("waiting for the first byte");
        if self.visible {
            spinner.enable_steady_tick(SPINNER_TICK);
        }
        self.spinner = Some(spinner);
    }

    fn on_first_byte(&mut self) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message("first byte received, receiving");
        }
    }

    fn on_stopped(&mut self, total_bytes: u64) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(format!(
                "stopped with {} received",
                format_bytes(total_bytes)
            ));
        }
    }
}
