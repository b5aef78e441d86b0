//! Prometheus metrics for the signaling service.
//!
//! All metrics use the `signaling_` prefix, `_total` for counters and
//! `_seconds` for duration histograms.
//!
//! # Cardinality
//!
//! Labels are bounded by code, never by peer input:
//! - `command`: 6 values (join, part, update_user_data, relay_candidate,
//!   relay_session_description, disconnect)
//! - `reason`: 2 values for dropped events (outbox_full, outbox_closed),
//!   1 value for rejected connections (origin_not_allowed)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Commands are in-memory state transitions, expect sub-millisecond
        .set_buckets_for_metric(
            Matcher::Prefix("signaling_command".to_string()),
            &[
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.010, 0.050, 0.100,
            ],
        )
        .map_err(|e| format!("Failed to set command latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Set the number of registered connections.
///
/// Metric: `signaling_connections_active`
pub fn set_connections_active(count: u64) {
    // u64 to f64 conversion is safe for realistic connection counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("signaling_connections_active").set(count as f64);
}

/// Set the number of non-empty channels.
///
/// Metric: `signaling_channels_active`
pub fn set_channels_active(count: u64) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("signaling_channels_active").set(count as f64);
}

/// Set the coordinator mailbox depth.
///
/// Metric: `signaling_coordinator_mailbox_depth`
pub fn set_mailbox_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("signaling_coordinator_mailbox_depth").set(depth as f64);
}

/// Record one applied command and how long the state transition took.
///
/// Metrics: `signaling_commands_total`, `signaling_command_latency_seconds`
/// Labels: `command`
pub fn record_command(command: &'static str, duration: Duration) {
    counter!("signaling_commands_total", "command" => command).increment(1);
    histogram!("signaling_command_latency_seconds", "command" => command)
        .record(duration.as_secs_f64());
}

/// Record a relay whose target was not registered.
///
/// Metric: `signaling_relay_dropped_total`
pub fn record_relay_dropped() {
    counter!("signaling_relay_dropped_total").increment(1);
}

/// Record an outbound event that could not be queued.
///
/// Metric: `signaling_events_dropped_total`
/// Labels: `reason`
///
/// Sustained `outbox_full` means a client is not reading its socket.
pub fn record_event_dropped(reason: &'static str) {
    counter!("signaling_events_dropped_total", "reason" => reason).increment(1);
}

/// Record an inbound frame that did not decode into a command.
///
/// Metric: `signaling_malformed_messages_total`
pub fn record_malformed_message() {
    counter!("signaling_malformed_messages_total").increment(1);
}

/// Record a WebSocket upgrade refused before registration.
///
/// Metric: `signaling_connections_rejected_total`
/// Labels: `reason`
pub fn record_connection_rejected(reason: &'static str) {
    counter!("signaling_connections_rejected_total", "reason" => reason).increment(1);
}
