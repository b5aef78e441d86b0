//! Observability for the signaling service.
//!
//! Instrumentation uses `#[instrument(skip_all)]` with explicit fields. Peer
//! payloads (session descriptions, candidates, userData) are never logged.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `signaling_connections_active` | Gauge | none | Registered connections |
//! | `signaling_channels_active` | Gauge | none | Non-empty channels |
//! | `signaling_coordinator_mailbox_depth` | Gauge | none | Coordinator backlog |
//! | `signaling_commands_total` | Counter | `command` | Applied commands |
//! | `signaling_command_latency_seconds` | Histogram | `command` | State transition time |
//! | `signaling_relay_dropped_total` | Counter | none | Relays to unknown peers |
//! | `signaling_events_dropped_total` | Counter | `reason` | Undeliverable events |
//! | `signaling_malformed_messages_total` | Counter | none | Undecodable frames |
//! | `signaling_connections_rejected_total` | Counter | `reason` | Refused upgrades |

pub mod health;
pub mod metrics;

pub use health::{health_router, metrics_router, HealthState};
pub use metrics::init_metrics_recorder;
