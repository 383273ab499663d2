//! Coordinator: chat stream to classifier to router.
//!
//! Chat events are routed one at a time so transitions for the same message
//! follow delivery order. Completion timers run concurrently inside the
//! router. The loop is steered through [`CoordinatorHandle`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::application::router::{Outcome, Router};
use crate::application::status::RuntimeStatus;
use crate::domain::id::ChannelId;
use crate::domain::message::ChatMessage;
use crate::domain::position::TrackedPosition;
use crate::error::Result;
use crate::port::inbound::operator::control::Operator;
use crate::port::inbound::operator::status::{FailureReport, RunState, StatusSnapshot};
use crate::port::outbound::chat::{ChannelSubscription, ChatEvent, ChatStream};
use crate::port::outbound::classifier::{Classification, SignalClassifier};
use crate::port::outbound::execution::ExecutionGateway;

/// Component name reported while the terminal is unreachable.
pub const EXECUTION_COMPONENT: &str = "execution";

/// Commands for the coordinator loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Run,
    Pause,
    Shutdown,
}

/// Owns the chat stream and drives the router.
pub struct Coordinator<S> {
    stream: S,
    classifier: Arc<dyn SignalClassifier>,
    router: Router,
    gateway: Arc<dyn ExecutionGateway>,
    status: Arc<RuntimeStatus>,
    channels: Vec<ChannelId>,
    health_interval: Option<Duration>,
    control_tx: Arc<watch::Sender<Control>>,
    control_rx: watch::Receiver<Control>,
}

impl<S: ChatStream> Coordinator<S> {
    #[must_use]
    pub fn new(
        stream: S,
        classifier: Arc<dyn SignalClassifier>,
        router: Router,
        gateway: Arc<dyn ExecutionGateway>,
        status: Arc<RuntimeStatus>,
        channels: Vec<ChannelId>,
    ) -> Self {
        let (control_tx, control_rx) = watch::channel(Control::Run);
        Self {
            stream,
            classifier,
            router,
            gateway,
            status,
            channels,
            health_interval: None,
            control_tx: Arc::new(control_tx),
            control_rx,
        }
    }

    /// Ping the terminal every `interval`. Zero disables the check.
    #[must_use]
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Control surface for this coordinator.
    #[must_use]
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            control: Arc::clone(&self.control_tx),
            router: self.router.clone(),
            status: Arc::clone(&self.status),
        }
    }

    /// Run until shutdown is requested or the chat stream ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connect or subscribe fails.
    pub async fn run(mut self) -> Result<()> {
        self.status.set_run_state(RunState::Starting);

        let resumed = self.router.resume_pending();
        if resumed > 0 {
            info!(resumed, "Pending signals resumed from state");
        }

        let subscriptions = self.subscriptions();
        self.stream.connect().await?;
        self.stream.subscribe(&subscriptions).await?;
        info!(
            source = self.stream.source_name(),
            classifier = self.classifier.name(),
            channels = subscriptions.len(),
            "Listening for signals"
        );

        let mut paused = *self.control_rx.borrow() == Control::Pause;
        self.status.set_run_state(if paused {
            RunState::Paused
        } else {
            RunState::Running
        });

        let probing = self.health_interval.is_some();
        let mut health = tokio::time::interval(
            self.health_interval.unwrap_or(Duration::from_secs(3600)),
        );
        health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = self.control_rx.changed() => {
                    if changed.is_err() {
                        info!("Control channel closed");
                        break;
                    }
                    let control = *self.control_rx.borrow_and_update();
                    match control {
                        Control::Shutdown => {
                            info!("Shutdown requested");
                            break;
                        }
                        Control::Pause => {
                            paused = true;
                            self.status.set_run_state(RunState::Paused);
                        }
                        Control::Run => {
                            paused = false;
                            self.status.set_run_state(RunState::Running);
                        }
                    }
                }
                _ = health.tick(), if probing => {
                    self.check_terminal().await;
                }
                event = self.stream.next_event(), if !paused => {
                    match event {
                        Some(ChatEvent::Message(message)) => {
                            self.process(message).await;
                        }
                        Some(ChatEvent::Disconnected { reason }) => {
                            warn!(reason = %reason, "Chat stream disconnected");
                        }
                        None => {
                            warn!("Chat stream ended");
                            break;
                        }
                    }
                }
            }
        }

        self.router.shutdown();
        self.status.set_run_state(RunState::Stopped);
        info!("Coordinator stopped");
        Ok(())
    }

    /// Classify and route one message, then move the channel cursor.
    ///
    /// Returns `None` when the message was skipped or is not a signal.
    pub async fn process(&self, message: ChatMessage) -> Option<Outcome> {
        let store = self.router.store();
        self.status.message_seen();

        if !message.edited
            && store
                .cursor(&message.channel)
                .is_some_and(|cursor| message.id <= cursor)
        {
            debug!(channel = %message.channel, id = %message.id, "Already processed, skipping");
            return None;
        }

        let classification = match self.classifier.classify(&message).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(
                    channel = %message.channel,
                    id = %message.id,
                    error = %e,
                    "Classification failed, treating as not a signal"
                );
                Classification::NotASignal
            }
        };

        let outcome = match classification {
            Classification::NotASignal => {
                debug!(channel = %message.channel, id = %message.id, "Not a signal");
                None
            }
            Classification::Signal(signal) => {
                let mut signal = *signal;
                signal.message_id = message.id;
                signal.channel_id = message.channel.clone();
                signal.reply_to = signal.reply_to.or(message.reply_to);
                let message_type = signal.message_type;

                match self.router.handle(signal).await {
                    Ok(outcome) => {
                        self.status.record_outcome(message_type, &outcome);
                        Some(outcome)
                    }
                    Err(e) => {
                        self.status.record_error(message.id, &e);
                        None
                    }
                }
            }
        };

        if let Err(e) = store.advance_cursor(&message.channel, message.id) {
            error!(channel = %message.channel, id = %message.id, error = %e, "Failed to save cursor");
        }
        outcome
    }

    async fn check_terminal(&self) {
        match self.gateway.ping().await {
            Ok(()) => {
                if self.status.is_degraded(EXECUTION_COMPONENT) {
                    self.status.mark_recovered(EXECUTION_COMPONENT);
                }
            }
            Err(e) => {
                warn!(transport = self.gateway.transport_name(), error = %e, "Terminal health check failed");
                self.status.mark_degraded(EXECUTION_COMPONENT);
                if let Err(e) = self.gateway.reconnect().await {
                    warn!(error = %e, "Terminal reconnect failed");
                }
            }
        }
    }

    fn subscriptions(&self) -> Vec<ChannelSubscription> {
        let store = self.router.store();
        self.channels
            .iter()
            .map(|channel| ChannelSubscription {
                channel: channel.clone(),
                after: store.cursor(channel),
            })
            .collect()
    }
}

/// Cloneable operator handle onto a running [`Coordinator`].
#[derive(Clone)]
pub struct CoordinatorHandle {
    control: Arc<watch::Sender<Control>>,
    router: Router,
    status: Arc<RuntimeStatus>,
}

#[async_trait]
impl Operator for CoordinatorHandle {
    fn status(&self) -> StatusSnapshot {
        let state = self.router.store().snapshot();
        StatusSnapshot {
            run_state: self.status.run_state(),
            degraded: self.status.degraded(),
            transport: self.status.transport().to_string(),
            started_at: self.status.started_at(),
            open_positions: state.open_count(),
            pending_positions: state.pending_count(),
            pending_timers: self.router.pending_timers(),
            counters: self.status.counters(),
            recent_activity: self.status.recent_activity(),
        }
    }

    fn positions(&self) -> Vec<TrackedPosition> {
        self.router.store().all()
    }

    fn failures(&self) -> Vec<FailureReport> {
        self.status.failures()
    }

    fn start(&self) {
        self.control.send_replace(Control::Run);
    }

    fn stop(&self) {
        self.control.send_replace(Control::Pause);
    }

    async fn clear(&self) -> Result<()> {
        self.router.clear()?;
        warn!("State cleared by operator");
        Ok(())
    }

    fn shutdown(&self) {
        self.control.send_replace(Control::Shutdown);
    }
}
