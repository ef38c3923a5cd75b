// src/progress.rs

//! Progress events emitted by adapters during long-running operations
//!
//! Adapters push [`ProgressEvent`]s into an unbounded tokio channel. The
//! receiving side hands each event to a [`ProgressObserver`]:
//! - `LogProgress`: logs events to tracing
//! - `SilentProgress`: counts terminal events, prints nothing
//! - the CLI's indicatif renderer in `commands::progress`
//!
//! # Example
//!
//! ```ignore
//! let (tx, rx) = aeris::progress::progress_channel();
//! let drain = tokio::spawn(aeris::progress::drain(rx, LogProgress::new("install")));
//! manager.install(&packages, Some(tx), mode).await;
//! drain.await?;
//! ```

use crate::adapter::AdapterId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

pub type ProgressSender = UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = UnboundedReceiver<ProgressEvent>;

/// A single progress update from an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Download {
        adapter_id: AdapterId,
        package_name: String,
        current_bytes: u64,
        total_bytes: u64,
    },
    Phase {
        adapter_id: AdapterId,
        package_name: String,
        phase: String,
        progress_percent: f32,
    },
    Status {
        adapter_id: AdapterId,
        message: String,
    },
    Completed {
        adapter_id: AdapterId,
        package_name: String,
    },
    Failed {
        adapter_id: AdapterId,
        package_name: String,
        error: String,
    },
    BatchProgress {
        adapter_id: AdapterId,
        completed: u32,
        total: u32,
        failed: u32,
    },
}

impl ProgressEvent {
    pub fn adapter_id(&self) -> &str {
        match self {
            ProgressEvent::Download { adapter_id, .. }
            | ProgressEvent::Phase { adapter_id, .. }
            | ProgressEvent::Status { adapter_id, .. }
            | ProgressEvent::Completed { adapter_id, .. }
            | ProgressEvent::Failed { adapter_id, .. }
            | ProgressEvent::BatchProgress { adapter_id, .. } => adapter_id,
        }
    }

    /// Completed or Failed: the package will not report again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Failed { .. }
        )
    }

    /// One-line human description
    pub fn describe(&self) -> String {
        match self {
            ProgressEvent::Download {
                package_name,
                current_bytes,
                total_bytes,
                ..
            } => {
                if *total_bytes > 0 {
                    let percent = (*current_bytes * 100) / *total_bytes;
                    format!("Downloading {} ({}%)", package_name, percent)
                } else {
                    format!("Downloading {}", package_name)
                }
            }
            ProgressEvent::Phase {
                package_name,
                phase,
                progress_percent,
                ..
            } => format!("{} {} ({:.0}%)", phase, package_name, progress_percent),
            ProgressEvent::Status { message, .. } => message.clone(),
            ProgressEvent::Completed { package_name, .. } => format!("{} [done]", package_name),
            ProgressEvent::Failed {
                package_name,
                error,
                ..
            } => format!("{} [FAILED: {}]", package_name, error),
            ProgressEvent::BatchProgress {
                completed,
                total,
                failed,
                ..
            } => format!("{}/{} done, {} failed", completed, total, failed),
        }
    }
}

/// Create a progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Send an event if a sender is present. A dropped receiver is not an error.
pub fn emit(progress: &Option<ProgressSender>, event: ProgressEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}

/// Consumer of progress events
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);

    /// Called once the channel is closed
    fn finish(&self) {}
}

/// Read events until every sender is dropped, then call `finish`
pub async fn drain<O: ProgressObserver>(mut rx: ProgressReceiver, observer: O) -> O {
    while let Some(event) = rx.recv().await {
        observer.on_event(&event);
    }
    observer.finish();
    observer
}

/// Observer that only counts completed and failed packages
#[derive(Debug, Default)]
pub struct SilentProgress {
    completed: AtomicU64,
    failed: AtomicU64,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl ProgressObserver for SilentProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Completed { .. } => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            ProgressEvent::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

/// Observer that logs each event through tracing
///
/// Download events are only logged when they cross a 10% boundary to
/// avoid flooding the log.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    last_decile: AtomicU64,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_decile: AtomicU64::new(u64::MAX),
        }
    }
}

impl ProgressObserver for LogProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Download {
                current_bytes,
                total_bytes,
                ..
            } => {
                if *total_bytes == 0 {
                    return;
                }
                let decile = (*current_bytes * 10) / *total_bytes;
                if self.last_decile.swap(decile, Ordering::Relaxed) != decile {
                    info!("{}: [{}] {}", self.name, event.adapter_id(), event.describe());
                }
            }
            ProgressEvent::Failed { .. } => {
                warn!("{}: [{}] {}", self.name, event.adapter_id(), event.describe());
            }
            _ => info!("{}: [{}] {}", self.name, event.adapter_id(), event.describe()),
        }
    }

    fn finish(&self) {
        info!("{}: finished", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(name: &str) -> ProgressEvent {
        ProgressEvent::Completed {
            adapter_id: "mock".to_string(),
            package_name: name.to_string(),
        }
    }

    #[test]
    fn test_adapter_id_and_terminal() {
        let ev = completed("foo");
        assert_eq!(ev.adapter_id(), "mock");
        assert!(ev.is_terminal());

        let status = ProgressEvent::Status {
            adapter_id: "apt".to_string(),
            message: "Reading package lists".to_string(),
        };
        assert!(!status.is_terminal());
        assert_eq!(status.describe(), "Reading package lists");
    }

    #[test]
    fn test_describe_download() {
        let ev = ProgressEvent::Download {
            adapter_id: "mock".to_string(),
            package_name: "foo".to_string(),
            current_bytes: 50,
            total_bytes: 200,
        };
        assert_eq!(ev.describe(), "Downloading foo (25%)");
    }

    #[test]
    fn test_emit_without_sender_is_noop() {
        emit(&None, completed("foo"));
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(completed("foo")).unwrap();
        assert_eq!(json["kind"], "completed");
        let back: ProgressEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, completed("foo"));
    }

    #[tokio::test]
    async fn test_drain_counts_terminal_events() {
        let (tx, rx) = progress_channel();
        let sender = Some(tx);
        emit(&sender, completed("a"));
        emit(
            &sender,
            ProgressEvent::Failed {
                adapter_id: "mock".to_string(),
                package_name: "b".to_string(),
                error: "boom".to_string(),
            },
        );
        emit(&sender, completed("c"));
        drop(sender);

        let observer = drain(rx, SilentProgress::new()).await;
        assert_eq!(observer.completed(), 2);
        assert_eq!(observer.failed(), 1);
    }
}
