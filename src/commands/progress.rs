// src/commands/progress.rs
//! Terminal progress rendering for package operations
//!
//! An overall bar counts finished packages and a spinner line below it
//! shows the latest event from whichever adapter reported last. With
//! `--quiet` the bars are hidden and events go to the log instead.

use aeris::progress::{
    LogProgress, ProgressEvent, ProgressObserver, ProgressSender, drain, progress_channel,
};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::future::Future;
use std::time::Duration;

/// Progress tracker for multi-package operations
pub struct CliProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    status: ProgressBar,
    log: Option<LogProgress>,
}

impl CliProgress {
    /// Create a tracker for `total` packages; `total == 0` shows only a spinner
    pub fn new(total: u64, operation: &str, quiet: bool) -> Self {
        let multi = if quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };

        let overall = if total > 0 {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
                    .expect("Invalid progress bar template")
                    .progress_chars("##-"),
            );
            bar
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .expect("Invalid spinner template"),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        };
        overall.set_message(operation.to_string());

        let status = ProgressBar::new_spinner();
        status.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .expect("Invalid spinner template"),
        );
        status.enable_steady_tick(Duration::from_millis(100));

        let overall = multi.add(overall);
        let status = multi.add(status);

        Self {
            multi,
            overall,
            status,
            log: quiet.then(|| LogProgress::new(operation)),
        }
    }

    /// Finish the overall progress with a success message
    pub fn finish_with(&self, message: &str) {
        self.status.finish_and_clear();
        self.overall.finish_with_message(message.to_string());
    }

    /// Finish the overall progress with a failure message
    pub fn finish_with_error(&self, message: &str) {
        self.status.finish_and_clear();
        self.overall.abandon_with_message(message.to_string());
    }
}

impl ProgressObserver for CliProgress {
    fn on_event(&self, event: &ProgressEvent) {
        if let Some(log) = &self.log {
            log.on_event(event);
        }
        let line = format!("[{}] {}", event.adapter_id(), event.describe());
        match event {
            ProgressEvent::Completed { .. } => self.overall.inc(1),
            ProgressEvent::Failed { .. } => {
                self.overall.inc(1);
                if self.log.is_none() {
                    self.multi.suspend(|| eprintln!("[FAILED] {}", line));
                }
            }
            _ => {}
        }
        self.status.set_message(line);
    }

    fn finish(&self) {
        if let Some(log) = &self.log {
            log.finish();
        }
        self.status.finish_and_clear();
    }
}

/// Run `op` with a progress sender while rendering its events
///
/// Rendering stops once `op` completes and drops every sender it was given.
pub async fn with_progress<F, Fut, T>(progress: CliProgress, op: F) -> (T, CliProgress)
where
    F: FnOnce(Option<ProgressSender>) -> Fut,
    Fut: Future<Output = T>,
{
    let (tx, rx) = progress_channel();
    tokio::join!(op(Some(tx)), drain(rx, progress))
}
