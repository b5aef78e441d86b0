//! `CoordinatorActor` - the single owner of signaling state.
//!
//! All registry and directory mutation happens on this task, one mailbox
//! message at a time. Handlers are synchronous: a command is applied, the
//! resulting deliveries are computed against committed state, and only then
//! are events pushed into recipient outboxes with a non-blocking send. A slow
//! or dead recipient can never stall the loop.
//!
//! # Shutdown
//!
//! `shutdown` disconnects every remaining connection (so remaining peers see
//! `removePeer` for each) and stops the actor. `cancel` does the same without
//! waiting for a reply.

use crate::errors::SignalingError;
use crate::observability::metrics;
use crate::types::{ChannelKey, ChannelSnapshot, ConnectionContext, ConnectionId};

use super::messages::{Command, CoordinatorMessage, CoordinatorStatus};
use super::metrics::MailboxMonitor;
use super::registry::{DeliveryOutcome, Outbox};
use super::scope::ChannelScope;
use super::state::{CoordinatorState, Delivery};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the coordinator mailbox.
const COORDINATOR_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `CoordinatorActor`.
///
/// Cheap to clone; every connection task holds one.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl CoordinatorHandle {
    /// Spawn a `CoordinatorActor` and return a handle to it.
    #[must_use]
    pub fn new(instance_id: String, scope: Arc<dyn ChannelScope>) -> Self {
        let (sender, receiver) = mpsc::channel(COORDINATOR_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();
        let mailbox = Arc::new(MailboxMonitor::new(instance_id.clone()));

        let actor = CoordinatorActor {
            instance_id,
            receiver,
            cancel_token: cancel_token.clone(),
            mailbox: Arc::clone(&mailbox),
            state: CoordinatorState::new(scope),
        };
        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            mailbox,
        }
    }

    /// Register a connection whose events go to `outbox`.
    pub async fn register(
        &self,
        context: ConnectionContext,
        outbox: Outbox,
    ) -> Result<ConnectionId, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::Register {
            context,
            outbox,
            respond_to: tx,
        })
        .await?;

        rx.await.map_err(|e| {
            SignalingError::CoordinatorUnavailable(format!("response receive failed: {e}"))
        })
    }

    /// Submit a command on behalf of `connection_id`.
    ///
    /// Returns once the command is queued; its events arrive in outboxes.
    pub async fn submit(
        &self,
        connection_id: ConnectionId,
        command: Command,
    ) -> Result<(), SignalingError> {
        self.send(CoordinatorMessage::Command {
            connection_id,
            command,
        })
        .await
    }

    /// Report the connection gone.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), SignalingError> {
        self.submit(connection_id, Command::Disconnect).await
    }

    /// Current member set of a channel, `None` if it has no members.
    pub async fn channel_snapshot(
        &self,
        channel: ChannelKey,
    ) -> Result<Option<ChannelSnapshot>, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::GetChannel {
            channel,
            respond_to: tx,
        })
        .await?;

        rx.await.map_err(|e| {
            SignalingError::CoordinatorUnavailable(format!("response receive failed: {e}"))
        })
    }

    /// Get the current coordinator status.
    pub async fn status(&self) -> Result<CoordinatorStatus, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::GetStatus { respond_to: tx })
            .await?;

        rx.await.map_err(|e| {
            SignalingError::CoordinatorUnavailable(format!("response receive failed: {e}"))
        })
    }

    /// Disconnect every connection and stop the actor, waiting up to `deadline`.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::Shutdown { respond_to: tx })
            .await?;

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SignalingError::CoordinatorUnavailable(format!(
                "response receive failed: {e}"
            ))),
            Err(_) => Err(SignalingError::Internal(format!(
                "coordinator shutdown exceeded {}ms",
                deadline.as_millis()
            ))),
        }
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Token cancelled when the coordinator is cancelled, for connection tasks.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    async fn send(&self, message: CoordinatorMessage) -> Result<(), SignalingError> {
        self.mailbox.record_enqueue();
        if let Err(e) = self.sender.send(message).await {
            self.mailbox.record_rejected();
            return Err(SignalingError::CoordinatorUnavailable(format!(
                "channel send failed: {e}"
            )));
        }
        Ok(())
    }
}

/// The `CoordinatorActor` implementation.
struct CoordinatorActor {
    instance_id: String,
    receiver: mpsc::Receiver<CoordinatorMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    state: CoordinatorState,
}

impl CoordinatorActor {
    #[instrument(skip_all, name = "signaling.coordinator", fields(instance_id = %self.instance_id))]
    async fn run(mut self) {
        info!(
            target: "signaling.coordinator",
            instance_id = %self.instance_id,
            "CoordinatorActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "signaling.coordinator",
                        instance_id = %self.instance_id,
                        "CoordinatorActor received cancellation signal"
                    );
                    self.disconnect_all();
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_dequeue();
                            metrics::set_mailbox_depth(self.mailbox.current_depth());
                            if self.handle_message(message) {
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "signaling.coordinator",
                                instance_id = %self.instance_id,
                                "CoordinatorActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "signaling.coordinator",
            instance_id = %self.instance_id,
            messages_processed = self.mailbox.messages_processed(),
            peak_mailbox_depth = self.mailbox.peak_depth(),
            "CoordinatorActor stopped"
        );
    }

    /// Handle a single message. Returns `true` when the actor should stop.
    fn handle_message(&mut self, message: CoordinatorMessage) -> bool {
        match message {
            CoordinatorMessage::Register {
                context,
                outbox,
                respond_to,
            } => {
                let connection_id = self.state.register(context, outbox);
                debug!(
                    target: "signaling.coordinator",
                    connection_id = %connection_id,
                    "Connection registered"
                );
                if respond_to.send(connection_id).is_err() {
                    // Caller went away before learning its id
                    self.apply(connection_id, Command::Disconnect);
                }
                self.publish_gauges();
            }

            CoordinatorMessage::Command {
                connection_id,
                command,
            } => {
                self.apply(connection_id, command);
            }

            CoordinatorMessage::GetChannel {
                channel,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.channel_snapshot(&channel));
            }

            CoordinatorMessage::GetStatus { respond_to } => {
                let mut status = self.state.status();
                status.mailbox_depth = self.mailbox.current_depth();
                let _ = respond_to.send(status);
            }

            CoordinatorMessage::Shutdown { respond_to } => {
                info!(
                    target: "signaling.coordinator",
                    instance_id = %self.instance_id,
                    connections = self.state.status().connection_count,
                    "Shutting down coordinator"
                );
                self.disconnect_all();
                let _ = respond_to.send(());
                return true;
            }
        }
        false
    }

    /// Apply a command, then dispatch what it produced.
    fn apply(&mut self, connection_id: ConnectionId, command: Command) {
        let name = command.name();
        let start = Instant::now();
        let deliveries = self.state.apply(connection_id, command);
        metrics::record_command(name, start.elapsed());

        if matches!(name, "join" | "part" | "disconnect") {
            self.publish_gauges();
        }
        dispatch(deliveries);
    }

    fn disconnect_all(&mut self) {
        for connection_id in self.state.connection_ids() {
            self.apply(connection_id, Command::Disconnect);
        }
    }

    fn publish_gauges(&self) {
        let status = self.state.status();
        metrics::set_connections_active(status.connection_count as u64);
        metrics::set_channels_active(status.channel_count as u64);
    }
}

/// Push each event into its recipient's outbox without waiting.
fn dispatch(deliveries: Vec<Delivery>) {
    for delivery in deliveries {
        let recipient = delivery.recipient;
        let event = delivery.event.name();
        match delivery.dispatch() {
            DeliveryOutcome::Delivered => {}
            DeliveryOutcome::Full => {
                warn!(
                    target: "signaling.coordinator",
                    connection_id = %recipient,
                    event,
                    "Outbox full, event dropped"
                );
                metrics::record_event_dropped("outbox_full");
            }
            DeliveryOutcome::Closed => {
                debug!(
                    target: "signaling.coordinator",
                    connection_id = %recipient,
                    event,
                    "Outbox closed, event dropped"
                );
                metrics::record_event_dropped("outbox_closed");
            }
        }
    }
}
