//! Coordinator mailbox monitoring.
//!
//! Every command from every connection goes through one mailbox, so its depth
//! is the first signal that the coordinator is falling behind:
//!
//! | Level    | Depth     |
//! |----------|-----------|
//! | Normal   | <= 100    |
//! | Warning  | 101-500   |
//! | Critical | > 500     |
//!
//! The monitor is shared between the handle (which counts enqueues) and the
//! actor (which counts dequeues).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Mailbox depth thresholds for the coordinator.
pub const COORDINATOR_MAILBOX_NORMAL: usize = 100;
pub const COORDINATOR_MAILBOX_WARNING: usize = 500;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MailboxLevel {
    /// At or below the normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Tracks the coordinator mailbox depth.
#[derive(Debug)]
pub struct MailboxMonitor {
    instance_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message about to be sent to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);

        match level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "signaling.coordinator.mailbox",
                    instance_id = %self.instance_id,
                    depth = new_depth,
                    threshold = COORDINATOR_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            MailboxLevel::Warning if new_depth == COORDINATOR_MAILBOX_NORMAL + 1 => {
                debug!(
                    target: "signaling.coordinator.mailbox",
                    instance_id = %self.instance_id,
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Undo an enqueue whose send failed.
    pub fn record_rejected(&self) {
        self.decrement();
    }

    /// Record a message taken off the mailbox by the actor.
    pub fn record_dequeue(&self) {
        self.decrement();
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    // The actor can observe a message before the sender has counted it.
    fn decrement(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            });
    }
}

fn level_for_depth(depth: usize) -> MailboxLevel {
    if depth > COORDINATOR_MAILBOX_WARNING {
        MailboxLevel::Critical
    } else if depth > COORDINATOR_MAILBOX_NORMAL {
        MailboxLevel::Warning
    } else {
        MailboxLevel::Normal
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_dequeue_tracks_depth_and_peak() {
        let monitor = MailboxMonitor::new("signaling-test");
        assert_eq!(monitor.current_depth(), 0);

        monitor.record_enqueue();
        monitor.record_enqueue();
        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 3);
        assert_eq!(monitor.peak_depth(), 3);

        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 2);
        assert_eq!(monitor.peak_depth(), 3);
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_levels() {
        assert_eq!(level_for_depth(0), MailboxLevel::Normal);
        assert_eq!(level_for_depth(COORDINATOR_MAILBOX_NORMAL), MailboxLevel::Normal);
        assert_eq!(level_for_depth(150), MailboxLevel::Warning);
        assert_eq!(level_for_depth(COORDINATOR_MAILBOX_WARNING), MailboxLevel::Warning);
        assert_eq!(level_for_depth(550), MailboxLevel::Critical);
    }

    #[test]
    fn test_depth_never_underflows() {
        let monitor = MailboxMonitor::new("signaling-test");

        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 0);

        monitor.record_enqueue();
        monitor.record_rejected();
        monitor.record_rejected();
        assert_eq!(monitor.current_depth(), 0);
        assert_eq!(monitor.messages_processed(), 1);
    }
}
