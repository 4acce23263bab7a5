// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Close-handshake tests: the event flags ride in the cursor words, the
// peer tears down on its next poll, and the initiator finalises once its
// own flag comes back cleared.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use memlink::{Channel, ChannelConfig, HeapRegion, LinkError, RingSpec};

const SPEC: RingSpec = RingSpec::new(8, 16);

fn config() -> ChannelConfig {
    ChannelConfig {
        entry_type: 1,
        pid: 3,
        never_full: false,
    }
}

fn duplex() -> (HeapRegion, HeapRegion, Channel, Channel) {
    let up = HeapRegion::new(SPEC.region_bytes());
    let down = HeapRegion::new(SPEC.region_bytes());
    let creator = Channel::create_upstream(
        Some(up.ring_mem()),
        SPEC,
        Some(down.ring_mem()),
        SPEC,
        config(),
    )
    .expect("create upstream");
    let joiner = Channel::attach_downstream(
        Some(up.ring_mem()),
        SPEC,
        Some(down.ring_mem()),
        SPEC,
        config(),
    )
    .expect("attach downstream");
    (up, down, creator, joiner)
}

fn count_closes(ch: &mut Channel) -> Arc<AtomicU32> {
    let count = Arc::new(AtomicU32::new(0));
    let tap = count.clone();
    ch.on_close(move || {
        tap.fetch_add(1, Ordering::Relaxed);
    });
    count
}

#[test]
fn upstream_initiated_handshake() {
    let (_up, _down, mut creator, mut joiner) = duplex();
    let creator_closes = count_closes(&mut creator);
    let joiner_closes = count_closes(&mut joiner);

    creator.close();
    assert!(!creator.is_closed());
    assert!(joiner.event_pending());
    assert!(joiner.pending_downstream().event);

    // The peer's next poll runs the handler and detaches its rings.
    joiner.poll_downstream().expect("joiner poll");
    assert!(joiner.is_closed());
    assert_eq!(joiner_closes.load(Ordering::Relaxed), 1);

    // The initiator sees its flag cleared and finalises without invoking
    // its own close handler.
    assert!(creator.event_pending());
    creator.poll_upstream().expect("creator poll");
    assert!(creator.is_closed());
    assert_eq!(creator_closes.load(Ordering::Relaxed), 0);

    // Handled exactly once: further polls never re-run the handler.
    let _ = joiner.poll_downstream();
    let _ = creator.poll_upstream();
    assert_eq!(joiner_closes.load(Ordering::Relaxed), 1);
    assert_eq!(creator_closes.load(Ordering::Relaxed), 0);
}

#[test]
fn downstream_initiated_handshake() {
    let (_up, _down, mut creator, mut joiner) = duplex();
    let creator_closes = count_closes(&mut creator);
    let joiner_closes = count_closes(&mut joiner);

    joiner.close();
    assert!(creator.event_pending());
    assert!(creator.pending_upstream().event);

    creator.poll_upstream().expect("creator poll");
    assert!(creator.is_closed());
    assert_eq!(creator_closes.load(Ordering::Relaxed), 1);

    joiner.poll_downstream().expect("joiner poll");
    assert!(joiner.is_closed());
    assert_eq!(joiner_closes.load(Ordering::Relaxed), 0);
}

#[test]
fn initiator_keeps_polling_until_peer_reacts() {
    let (_up, _down, mut creator, mut joiner) = duplex();
    count_closes(&mut creator);

    creator.send(&[7u8; 16]).expect("send");
    creator.close();

    // Nothing pending for the initiator until the peer acknowledges, so
    // polling stays ordinary work.
    assert!(!creator.event_pending());
    creator.poll_upstream().expect("poll");
    creator.poll_downstream().expect("poll");
    assert!(!creator.is_closed());

    // The in-flight entry is still counted on the peer's side, but its
    // next poll prioritises the close event over delivery.
    assert_eq!(joiner.pending_downstream().messages, 1);
    joiner.poll_downstream().expect("joiner poll");
    assert!(joiner.is_closed());
}

#[test]
fn simultaneous_close_is_idempotent() {
    let (_up, _down, mut creator, mut joiner) = duplex();
    let creator_closes = count_closes(&mut creator);
    let joiner_closes = count_closes(&mut joiner);

    creator.close();
    joiner.close();

    creator.poll_upstream().expect("creator poll");
    joiner.poll_downstream().expect("joiner poll");
    assert!(creator.is_closed());
    assert!(joiner.is_closed());

    // Both ends initiated, so neither handler fires, and nothing re-fires.
    assert_eq!(creator_closes.load(Ordering::Relaxed), 0);
    assert_eq!(joiner_closes.load(Ordering::Relaxed), 0);

    let _ = creator.poll_upstream();
    let _ = joiner.poll_downstream();
    assert_eq!(creator_closes.load(Ordering::Relaxed), 0);
    assert_eq!(joiner_closes.load(Ordering::Relaxed), 0);
}

#[test]
fn close_is_idempotent_locally() {
    let (_up, _down, mut creator, mut joiner) = duplex();
    let joiner_closes = count_closes(&mut joiner);

    creator.close();
    creator.close();

    joiner.poll_downstream().expect("joiner poll");
    assert_eq!(joiner_closes.load(Ordering::Relaxed), 1);

    creator.poll_upstream().expect("creator poll");
    assert!(creator.is_closed());
    // Closing a closed channel is a quiet no-op.
    creator.close();
}

#[test]
fn half_duplex_handshake() {
    let down = HeapRegion::new(SPEC.region_bytes());
    let mut creator =
        Channel::create_upstream(None, SPEC, Some(down.ring_mem()), SPEC, config())
            .expect("create");
    let mut joiner =
        Channel::attach_downstream(None, SPEC, Some(down.ring_mem()), SPEC, config())
            .expect("attach");
    let joiner_closes = count_closes(&mut joiner);

    // With only one ring, the creator signals through its transmit ring's
    // write flag and the joiner still observes it as its receive ring.
    creator.close();
    assert!(joiner.event_pending());
    joiner.poll_downstream().expect("joiner poll");
    assert!(joiner.is_closed());
    assert_eq!(joiner_closes.load(Ordering::Relaxed), 1);

    creator.poll_downstream().expect("creator poll");
    assert!(creator.is_closed());
}

#[test]
fn half_duplex_receive_only_initiator() {
    let down = HeapRegion::new(SPEC.region_bytes());
    let mut creator =
        Channel::create_upstream(None, SPEC, Some(down.ring_mem()), SPEC, config())
            .expect("create");
    let mut joiner =
        Channel::attach_downstream(None, SPEC, Some(down.ring_mem()), SPEC, config())
            .expect("attach");
    let creator_closes = count_closes(&mut creator);

    // The joiner has no transmit ring here, so it signals through the
    // read-event flag of the ring it consumes.
    joiner.close();
    assert!(creator.event_pending());
    creator.poll_downstream().expect("creator poll");
    assert!(creator.is_closed());
    assert_eq!(creator_closes.load(Ordering::Relaxed), 1);

    joiner.poll_downstream().expect("joiner poll");
    assert!(joiner.is_closed());
}

#[test]
fn event_flags_end_cleared() {
    let (up, down, mut creator, mut joiner) = duplex();

    creator.close();
    joiner.poll_downstream().expect("joiner poll");
    creator.poll_upstream().expect("creator poll");

    // Every event flag in both rings' cursor words is retired.
    for region in [&up, &down] {
        let words =
            unsafe { std::slice::from_raw_parts(region.ring_mem().as_ptr() as *const u32, 2) };
        assert_eq!(words[0] & 0x8000_0000, 0);
        assert_eq!(words[1] & 0x8000_0000, 0);
    }
}

#[test]
fn operations_fail_after_teardown() {
    let (_up, _down, mut creator, mut joiner) = duplex();

    creator.close();
    joiner.poll_downstream().expect("joiner poll");
    creator.poll_upstream().expect("creator poll");

    let err = creator.send(&[0u8; 16]).unwrap_err();
    assert!(matches!(err, LinkError::NoTransmitRing));
    let err = creator.poll_upstream().unwrap_err();
    assert!(matches!(err, LinkError::NoReceiveRing));
    let err = joiner.poll_downstream().unwrap_err();
    assert!(matches!(err, LinkError::NoReceiveRing));

    // The dispatcher entry point stays quiet on a dead channel.
    creator.poll().expect("poll on closed channel");
    assert_eq!(creator.entry_type(), None);
    assert_eq!(creator.pid(), None);
}
