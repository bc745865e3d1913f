mod common;

use arena_mirror::{
    CellUpdate, ChannelEvent, Color, ConnectionState, Credential, RawEnvelope, ThreadId,
    ThreadMove, TransportEvent,
};
use common::{connected_session, feed, TEST_TOKEN};
use serde_json::json;

fn demo_stream() -> Vec<RawEnvelope> {
    vec![
        RawEnvelope::snapshot(&[0; 16]),
        RawEnvelope::thread_moves(&[ThreadMove {
            id: ThreadId::from("p0"),
            location: 3,
            color: Color::from("#f00"),
        }]),
        RawEnvelope::cell_diffs(&[CellUpdate(3, 200), CellUpdate(4, 10)]),
        RawEnvelope::events(vec![json!("p0 executes DAT"), json!({"cycle": 12})]),
    ]
}

#[test]
fn closed_transport_discards_projections_until_reseeded() {
    let mut session = connected_session(20);
    feed(&mut session, demo_stream());
    let before = session.mirror().expect("connected").digest();

    session.handle(TransportEvent::Closed {
        reason: "reset by peer".to_string(),
    });
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.mirror().is_none());

    // stale traffic between connections is ignored
    feed(&mut session, [RawEnvelope::cell_diffs(&[CellUpdate(0, 1)])]);
    assert!(session.mirror().is_none());

    session.handle(TransportEvent::Dialing { attempt: 2 });
    assert_eq!(session.state(), ConnectionState::Connecting);
    feed(&mut session, [RawEnvelope::connect()]);
    let mirror = session.mirror().expect("reconnected");
    assert!(!mirror.is_seeded());
    assert!(mirror.threads().is_empty());
    assert!(mirror.events().is_empty());

    feed(&mut session, demo_stream());
    assert_eq!(session.mirror().expect("reconnected").digest(), before);
    assert_eq!(session.status().connections, 2);
}

#[test]
fn server_disconnect_then_manual_reopen() {
    let mut session = connected_session(20);
    feed(&mut session, demo_stream());
    feed(&mut session, [RawEnvelope::disconnect()]);
    assert_eq!(session.state(), ConnectionState::Disconnected);

    session.teardown();
    assert!(session.open(Credential::new(TEST_TOKEN)));
    assert_eq!(session.channel().opened.len(), 2);
    assert_eq!(session.channel().closed, 1);
}

#[test]
fn identical_streams_produce_identical_mirrors() {
    let mut first = connected_session(20);
    let mut second = connected_session(20);
    feed(&mut first, demo_stream());
    feed(&mut second, demo_stream());

    let a = first.mirror().expect("connected");
    let b = second.mirror().expect("connected");
    assert_eq!(a.digest(), b.digest());
    assert_eq!(a.memory(), b.memory());

    feed(&mut second, [RawEnvelope::cell_diffs(&[CellUpdate(0, 1)])]);
    assert_ne!(a.digest(), second.mirror().expect("connected").digest());
}

#[test]
fn teardown_and_reopen_skip_frames_queued_before_it() {
    let mut session = connected_session(20);
    let old_epoch = session.epoch();
    // frames the old connection delivered but nobody drained yet
    let queued: Vec<ChannelEvent> = std::iter::once(RawEnvelope::connect())
        .chain(demo_stream())
        .map(|envelope| ChannelEvent {
            epoch: old_epoch,
            event: TransportEvent::Envelope(envelope),
        })
        .collect();

    session.teardown();
    assert!(session.open(Credential::new(TEST_TOKEN)));
    let epoch = session.epoch();
    assert_ne!(epoch, old_epoch);
    for event in queued {
        session.receive(event);
    }
    assert_eq!(session.state(), ConnectionState::Connecting);
    assert!(session.mirror().is_none());

    for envelope in [RawEnvelope::connect(), RawEnvelope::snapshot(&[0; 16])] {
        session.receive(ChannelEvent {
            epoch,
            event: TransportEvent::Envelope(envelope),
        });
    }
    let mirror = session.mirror().expect("reconnected");
    assert!(mirror.threads().is_empty());
    assert!(mirror.events().is_empty());
    assert_eq!(mirror.occupant(3), None);
    assert_eq!(session.status().connections, 2);
}
