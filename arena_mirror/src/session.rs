//! Connection lifecycle controller.
//!
//! `Session` owns the channel and the projections for the current
//! connection. It walks `Disconnected -> Connecting -> Connected` and back,
//! dropping every projection when the connection ends so a reconnect always
//! re-seeds from a fresh snapshot.

use std::fmt;
use std::time::Instant;

use arena_proto::{decode_message, InboundMessage, RawEnvelope};
use tracing::{debug, info, trace, warn};

use crate::mirror::{ApplyOutcome, CoreMirror};
use crate::transport::{ChannelEvent, TransportEvent};

/// Opaque access token passed through to the channel.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Transport side of a session.
///
/// `open` receives the session's connection epoch; every event the channel
/// produces for that connection must carry it back in a [`ChannelEvent`].
pub trait Channel {
    fn open(&mut self, epoch: u64, credential: &Credential);
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub connections: u64,
    pub messages: u64,
    pub dropped_items: u64,
    pub since: Instant,
}

pub struct Session<C: Channel> {
    channel: C,
    credential: Option<Credential>,
    state: ConnectionState,
    mirror: Option<CoreMirror>,
    event_log_capacity: usize,
    epoch: u64,
    connections: u64,
    messages: u64,
    dropped_items: u64,
    since: Instant,
}

impl<C: Channel> Session<C> {
    pub fn new(channel: C, event_log_capacity: usize) -> Self {
        Self {
            channel,
            credential: None,
            state: ConnectionState::Disconnected,
            mirror: None,
            event_log_capacity,
            epoch: 0,
            connections: 0,
            messages: 0,
            dropped_items: 0,
            since: Instant::now(),
        }
    }

    /// Opens the channel. Ignored unless the session is disconnected.
    pub fn open(&mut self, credential: Credential) -> bool {
        if self.state != ConnectionState::Disconnected {
            warn!(
                target: "arena_mirror::session",
                state = self.state.label(),
                "session.open_ignored"
            );
            return false;
        }
        self.epoch += 1;
        self.channel.open(self.epoch, &credential);
        self.credential = Some(credential);
        self.transition(ConnectionState::Connecting);
        true
    }

    /// Closes the channel and discards the projections.
    pub fn teardown(&mut self) {
        if self.credential.take().is_some() {
            self.channel.close();
        }
        self.discard("teardown");
    }

    /// Routes a channel event, dropping anything left over from an earlier
    /// `open`.
    pub fn receive(&mut self, event: ChannelEvent) {
        if event.epoch != self.epoch {
            trace!(
                target: "arena_mirror::session",
                epoch = event.epoch,
                current = self.epoch,
                "transport.stale_event"
            );
            return;
        }
        self.handle(event.event);
    }

    /// Routes an event belonging to the current connection.
    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Dialing { attempt } => {
                if self.credential.is_some() && self.state == ConnectionState::Disconnected {
                    debug!(target: "arena_mirror::session", attempt, "session.redialing");
                    self.transition(ConnectionState::Connecting);
                }
            }
            TransportEvent::Envelope(envelope) => self.on_envelope(envelope),
            TransportEvent::Closed { reason } => {
                if self.state != ConnectionState::Disconnected {
                    info!(target: "arena_mirror::session", %reason, "session.closed");
                }
                self.discard("transport closed");
            }
        }
    }

    pub fn on_envelope(&mut self, envelope: RawEnvelope) {
        match decode_message(envelope) {
            Ok(message) => {
                self.on_message(message);
            }
            Err(err) => {
                self.dropped_items += 1;
                warn!(target: "arena_mirror::session", error = %err, "message.dropped");
            }
        }
    }

    pub fn on_message(&mut self, message: InboundMessage) -> ApplyOutcome {
        match message {
            InboundMessage::Connect => {
                self.on_connect();
                ApplyOutcome::default()
            }
            InboundMessage::Disconnect => {
                self.discard("server disconnect");
                ApplyOutcome::default()
            }
            message => {
                let Some(mirror) = self.mirror.as_mut() else {
                    let dropped = message.rejected() + 1;
                    self.dropped_items += dropped as u64;
                    debug!(
                        target: "arena_mirror::session",
                        kind = message.kind(),
                        state = self.state.label(),
                        "message.dropped=not_connected"
                    );
                    return ApplyOutcome {
                        applied: 0,
                        dropped,
                    };
                };
                self.messages += 1;
                let outcome = mirror.apply(message);
                self.dropped_items += outcome.dropped as u64;
                outcome
            }
        }
    }

    fn on_connect(&mut self) {
        match self.state {
            ConnectionState::Connecting => {
                self.connections += 1;
                self.mirror = Some(CoreMirror::new(self.event_log_capacity));
                self.transition(ConnectionState::Connected);
            }
            ConnectionState::Connected => {
                debug!(target: "arena_mirror::session", "session.duplicate_connect");
            }
            ConnectionState::Disconnected => {
                warn!(target: "arena_mirror::session", "session.connect_without_open");
            }
        }
    }

    fn discard(&mut self, reason: &'static str) {
        if self.mirror.take().is_some() {
            debug!(target: "arena_mirror::session", reason, "projections.discarded");
        }
        if self.state != ConnectionState::Disconnected {
            self.transition(ConnectionState::Disconnected);
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        info!(
            target: "arena_mirror::session",
            from = self.state.label(),
            to = next.label(),
            "session.transition"
        );
        self.state = next;
        self.since = Instant::now();
    }

    /// Epoch handed to the channel by the latest `open`; zero before any.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            connections: self.connections,
            messages: self.messages,
            dropped_items: self.dropped_items,
            since: self.since,
        }
    }

    /// Projections for the live connection, if any.
    pub fn mirror(&self) -> Option<&CoreMirror> {
        self.mirror.as_ref()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}
