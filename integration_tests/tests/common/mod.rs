#![allow(dead_code)]

use arena_mirror::{Channel, Credential, RawEnvelope, Session, TransportEvent};

pub const TEST_TOKEN: &str = "integration-token";

/// Channel that only records what the session asked of it.
#[derive(Default)]
pub struct RecordingChannel {
    pub opened: Vec<String>,
    pub epochs: Vec<u64>,
    pub closed: usize,
}

impl Channel for RecordingChannel {
    fn open(&mut self, epoch: u64, credential: &Credential) {
        self.opened.push(credential.as_str().to_string());
        self.epochs.push(epoch);
    }

    fn close(&mut self) {
        self.closed += 1;
    }
}

/// Session that has been opened and acknowledged, but not yet seeded.
pub fn connected_session(event_log_capacity: usize) -> Session<RecordingChannel> {
    let mut session = Session::new(RecordingChannel::default(), event_log_capacity);
    assert!(session.open(Credential::new(TEST_TOKEN)));
    session.handle(TransportEvent::Envelope(RawEnvelope::connect()));
    session
}

pub fn feed<C: Channel>(session: &mut Session<C>, envelopes: impl IntoIterator<Item = RawEnvelope>) {
    for envelope in envelopes {
        session.handle(TransportEvent::Envelope(envelope));
    }
}
