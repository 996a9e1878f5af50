//! Startup stages and periodic status output for the binaries.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::pipeline::PipelineStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    /// Spinners, colour and in-place redraws.
    pub fn is_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.is_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

/// Running stage. Finishing reports success; dropping unfinished reports
/// a failure.
pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    finished: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            finished: false,
        }
    }

    /// Mark the stage done with an optional detail (model fingerprint,
    /// label count).
    pub fn finish(mut self, detail: Option<&str>) {
        self.finished = true;
        let elapsed = format_duration(self.start.elapsed());
        let message = match detail {
            Some(detail) => format!("✔ {} ({}, {})", self.name, detail, elapsed),
            None => format!("✔ {} ({})", self.name, elapsed),
        };
        self.report(message);
    }

    fn report(&self, message: String) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let message = format!(
            "✘ {} ({})",
            self.name,
            format_duration(self.start.elapsed())
        );
        self.report(message);
    }
}

/// One-line runtime health summary.
pub fn health_line(stats: &PipelineStats) -> String {
    format!(
        "health: captured={} dropped={} analysed={} skipped={} capture_errors={}",
        stats.frames_captured,
        stats.frames_dropped,
        stats.frames_analysed,
        stats.frames_skipped,
        stats.capture_errors
    )
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_needs_a_tty() {
        assert!(!Ui::from_args(Some("pretty"), false, false).is_pretty());
        assert!(Ui::from_args(Some("pretty"), true, true).is_pretty());
        assert!(!Ui::from_args(None, true, true).is_pretty());
        assert!(!Ui::from_args(Some("plain"), true, false).is_pretty());
    }

    #[test]
    fn health_line_lists_counters() {
        let line = health_line(&PipelineStats {
            frames_captured: 40,
            capture_errors: 0,
            frames_dropped: 12,
            frames_analysed: 27,
            frames_skipped: 1,
        });
        assert_eq!(
            line,
            "health: captured=40 dropped=12 analysed=27 skipped=1 capture_errors=0"
        );
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
