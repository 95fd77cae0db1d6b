//! Coordinator stream client.
//!
//! Owns the one outbound session: connect, handshake, inbound dispatch,
//! acks, liveness and reconnection. The supervisor drives it by calling
//! [`StreamClient::service`] once per scheduling quantum; every call
//! does a bounded amount of work and returns.
//!
//! Transport and framing errors are logged here and turned into phase
//! transitions. None of them is returned to the supervisor.

pub mod dispatch;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::codec::{DEFAULT_NAMESPACE, EventFrameCodec, Frame, Handshake, IdPolicy, Packet};
use crate::error::BoxError;
use crate::network::{Connector, Endpoint, Link};
use crate::output::OutputState;
use crate::state::{ConnectionPhase, ReconnectPolicy, Session};

pub use dispatch::{Action, Dispatcher, EventRoute, timestamp_ack};

// ── ClientConfig ─────────────────────────────────────────────────

/// Static parameters of the stream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    /// Namespace joined after the handshake.
    pub namespace: String,
    pub reconnect: ReconnectPolicy,
    pub id_policy: IdPolicy,
    /// Upper bound on establishing the transport.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for the OPEN packet once connected.
    pub handshake_timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            namespace: DEFAULT_NAMESPACE.to_string(),
            reconnect: ReconnectPolicy::default(),
            id_policy: IdPolicy::default(),
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

// ── StreamClient ─────────────────────────────────────────────────

pub struct StreamClient {
    config: ClientConfig,
    codec: EventFrameCodec,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    output: OutputState,
    clock: Arc<dyn Clock>,

    phase: ConnectionPhase,
    link: Option<Link>,
    session: Option<Session>,

    /// Consecutive failed attempts since the last handshake.
    attempt: u32,
    /// Earliest time the next connect may start.
    next_attempt: Instant,
    /// Last time anything arrived on the link.
    last_seen: Instant,
}

impl StreamClient {
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        output: OutputState,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = Instant::now();
        Self {
            codec: EventFrameCodec::new(config.id_policy),
            config,
            connector,
            dispatcher: Dispatcher::with_output_commands(),
            output,
            clock,
            phase: ConnectionPhase::default(),
            link: None,
            session: None,
            attempt: 0,
            next_attempt: now,
            last_seen: now,
        }
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase.is_connected()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// When the next reconnect attempt is due, if disconnected.
    pub fn next_attempt(&self) -> Option<Instant> {
        self.phase.is_disconnected().then_some(self.next_attempt)
    }

    // ── Driving ──────────────────────────────────────────────────

    /// Do one quantum's worth of work.
    ///
    /// Disconnected: connect if the retry timer has elapsed, otherwise
    /// sleep towards it. Connecting/Connected: wait up to `quantum` for
    /// one inbound message and handle it.
    pub async fn service(&mut self, quantum: Duration) {
        let now = Instant::now();
        match self.phase {
            ConnectionPhase::Disconnected => {
                if now >= self.next_attempt {
                    if let Err(e) = self.connect().await {
                        warn!(endpoint = %self.config.endpoint, error = %e, "connect failed");
                    }
                } else {
                    tokio::time::sleep_until(self.next_attempt.min(now + quantum)).await;
                }
            }
            ConnectionPhase::Connecting { since } => {
                let deadline = since + self.config.handshake_timeout;
                if now >= deadline {
                    let timeout = self.config.handshake_timeout;
                    self.on_transport_lost(BoxError::Timeout(timeout));
                } else {
                    self.pump(quantum.min(deadline - now)).await;
                }
            }
            ConnectionPhase::Connected { .. } => {
                let window = self
                    .session
                    .as_ref()
                    .map(Session::liveness_window)
                    .unwrap_or(Duration::MAX);
                let deadline = self.last_seen.checked_add(window);
                match deadline {
                    Some(deadline) if now >= deadline => {
                        self.on_transport_lost(BoxError::Timeout(window));
                    }
                    Some(deadline) => self.pump(quantum.min(deadline - now)).await,
                    None => self.pump(quantum).await,
                }
            }
        }
    }

    /// `Disconnected → Connecting`: open the transport.
    ///
    /// On failure the client is back in `Disconnected` with the retry
    /// timer armed, and the error is returned for logging.
    pub async fn connect(&mut self) -> Result<(), BoxError> {
        self.phase.begin_connect()?;
        info!(url = %self.config.endpoint.url(), attempt = self.attempt, "connecting to coordinator");

        let attempt = tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.connect(&self.config.endpoint),
        )
        .await;

        let result = match attempt {
            Ok(result) => result,
            Err(_) => Err(BoxError::Timeout(self.config.connect_timeout)),
        };

        match result {
            Ok(link) => {
                self.link = Some(link);
                self.last_seen = Instant::now();
                Ok(())
            }
            Err(e) => {
                self.schedule_retry();
                Err(e)
            }
        }
    }

    async fn pump(&mut self, wait: Duration) {
        if self.link.is_none() {
            self.on_transport_lost(BoxError::ChannelClosed);
            return;
        }
        let Some(link) = self.link.as_mut() else {
            return;
        };
        let received = tokio::time::timeout(wait, link.recv()).await;
        match received {
            Err(_) => {}
            Ok(None) => self.on_transport_lost(BoxError::ChannelClosed),
            Ok(Some(text)) => {
                self.last_seen = Instant::now();
                self.handle_message(&text);
            }
        }
    }

    // ── Inbound ──────────────────────────────────────────────────

    /// Handle one transport message as received from the link.
    pub fn handle_message(&mut self, text: &str) {
        let packet = match self.codec.decode(text) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, raw = text, "dropping malformed packet");
                return;
            }
        };

        match packet {
            Packet::Open(handshake) => self.on_open(handshake),
            Packet::Ping(data) => {
                self.send_packet(&Packet::Pong(data));
            }
            Packet::Close => {
                info!("coordinator closed the session");
                self.on_transport_lost(BoxError::ChannelClosed);
            }
            Packet::Message(frame) => self.on_frame(frame),
            Packet::Pong(_) | Packet::Upgrade | Packet::Noop => {
                debug!(raw = text, "transport packet ignored");
            }
        }
    }

    fn on_open(&mut self, handshake: Handshake) {
        if let Err(e) = self.phase.complete_handshake() {
            warn!(error = %e, sid = %handshake.sid, "unexpected handshake");
            return;
        }
        let session = Session::from_handshake(&handshake, self.config.namespace.clone());
        info!(
            sid = %session.sid,
            namespace = %session.namespace,
            ping_interval = ?session.ping_interval,
            id_policy = ?self.codec.id_policy(),
            "connected to coordinator"
        );
        let join = Frame::connect(session.namespace.clone());
        self.session = Some(session);
        self.attempt = 0;
        self.send_packet(&Packet::Message(join));
    }

    fn on_frame(&mut self, frame: Frame) {
        if !self.phase.is_connected() {
            let e = BoxError::ProtocolViolation("frame received before handshake");
            warn!(error = %e, kind = %frame.kind(), "ignoring frame");
            return;
        }
        if frame.namespace() != self.namespace() {
            debug!(namespace = frame.namespace(), "frame for another namespace ignored");
            return;
        }

        for action in self.dispatcher.dispatch(&frame, self.clock.now_ms()) {
            match action {
                Action::SetOutput(on) => {
                    info!(on, "output set by coordinator");
                    self.output.set(on);
                }
                Action::SendAck { id, args } => self.send_ack(id, args),
            }
        }
    }

    fn on_transport_lost(&mut self, reason: BoxError) {
        if let Some(up) = self.phase.connected_duration() {
            warn!(error = %reason, ?up, "coordinator link lost");
        } else {
            warn!(error = %reason, phase = %self.phase, "coordinator link failed");
        }
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        self.phase.force_disconnect();
        self.link = None;
        self.session = None;
        let delay = self.config.reconnect.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.next_attempt = Instant::now() + delay;
        debug!(?delay, attempt = self.attempt, "reconnect scheduled");
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Emit an event. Dropped unless connected; nothing is queued.
    pub fn publish(&self, event: &str, args: Vec<Value>) -> bool {
        if !self.phase.is_connected() {
            debug!(event, "not connected; publish dropped");
            return false;
        }
        let frame = Frame::event(event, args).in_namespace(self.namespace());
        self.send_packet(&Packet::Message(frame))
    }

    fn send_ack(&self, id: u64, args: Vec<Value>) {
        let frame = Frame::ack(id, args).in_namespace(self.namespace());
        if self.send_packet(&Packet::Message(frame)) {
            debug!(id, "ack sent");
        }
    }

    fn send_packet(&self, packet: &Packet) -> bool {
        let Some(link) = self.link.as_ref() else {
            return false;
        };
        let text = match self.codec.encode(packet) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to encode packet");
                return false;
            }
        };
        match link.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "outbound message dropped");
                false
            }
        }
    }

    fn namespace(&self) -> &str {
        self.session
            .as_ref()
            .map(|s| s.namespace.as_str())
            .unwrap_or(&self.config.namespace)
    }
}

// ── Tests ────────────────────────────────────────────────────────
