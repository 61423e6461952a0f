//! Progress reporting for workspace searches

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use strum::Display;

/// Phase of a workspace search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProgressStage {
    Scanning,
    Loading,
    Searching,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    pub processed: usize,
    pub total: usize,
    pub message: Option<String>,
}

impl ProgressUpdate {
    pub fn new(stage: ProgressStage, processed: usize, total: usize) -> Self {
        Self {
            stage,
            processed,
            total,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Receives progress updates from worker threads
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards all updates
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Progress bar on stderr
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    /// A visible bar, or a hidden one when `show` is false
    pub fn new(show: bool) -> Self {
        let bar = if show {
            let bar = ProgressBar::new(0);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-");
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }
}

impl ProgressReporter for TerminalProgress {
    fn report(&self, update: ProgressUpdate) {
        match update.stage {
            ProgressStage::Complete => {
                self.bar
                    .finish_with_message(update.message.unwrap_or_else(|| "Search complete".to_string()));
            }
            stage => {
                self.bar.set_length(update.total as u64);
                self.bar.set_position(update.processed as u64);
                self.bar.set_message(match update.message {
                    Some(message) => format!("{}: {}", stage, message),
                    None => stage.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(ProgressStage::Scanning.to_string(), "scanning");
        assert_eq!(ProgressStage::Complete.to_string(), "complete");
    }

    #[test]
    fn test_hidden_bar_accepts_updates() {
        let progress = TerminalProgress::new(false);
        progress.report(ProgressUpdate::new(ProgressStage::Searching, 1, 4));
        progress.report(ProgressUpdate::new(ProgressStage::Complete, 4, 4).with_message("done"));
    }
}
