//! Terminal progress for long-running commands.
//!
//! Bars draw to stderr, so stdout stays clean for command output.

use indicatif::{ProgressBar, ProgressStyle};

/// Minimal progress interface used by the ingest loop.
pub trait Progress {
    /// Advance by `n` units and show a short message.
    fn advance(&self, _n: u64, _msg: &str) {}
    /// Finish the UI.
    fn finish(&self, _msg: &str) {}
}

/// No-op reporter for piped / non-interactive runs.
#[derive(Default, Clone, Copy)]
pub struct NoopProgress;
impl Progress for NoopProgress {}

/// Indicatif bar with a known total.
pub struct IndicatifProgress {
    pb: ProgressBar,
}

impl IndicatifProgress {
    pub fn bar(len: u64) -> Self {
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>5}/{len:5} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        Self { pb }
    }
}

impl Progress for IndicatifProgress {
    fn advance(&self, n: u64, msg: &str) {
        self.pb.inc(n);
        self.pb.set_message(msg.to_string());
    }
    fn finish(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}

/// Bar on a terminal, nothing otherwise.
pub fn for_total(len: u64) -> Box<dyn Progress> {
    use std::io::IsTerminal;
    if std::io::stderr().is_terminal() {
        Box::new(IndicatifProgress::bar(len))
    } else {
        Box::new(NoopProgress)
    }
}
