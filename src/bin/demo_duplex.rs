// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Same-process duplex demo: an upstream and a downstream endpoint run in
// two threads over heap-backed regions. The upstream side sends a burst of
// envelope-framed messages, the downstream side echoes each payload back,
// completions are reported on both rings, then the upstream side closes
// the link and both endpoints observe the handshake.
//
// Usage:
//   demo_duplex [message_count]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use memlink::{build_slot, Channel, ChannelConfig, HeapRegion, MsgHeader, RingSpec};

fn main() {
    let count: u32 = std::env::args()
        .nth(1)
        .and_then(|a| a.parse().ok())
        .unwrap_or(8);

    let spec = RingSpec::new(16, 32);
    let cfg = ChannelConfig {
        entry_type: 1,
        pid: 7,
        never_full: false,
    };

    let up_region = Arc::new(HeapRegion::new(spec.region_bytes()));
    let down_region = Arc::new(HeapRegion::new(spec.region_bytes()));

    // The creator authors the ring metadata before the peer thread starts.
    let mut up_end = Channel::create_upstream(
        Some(up_region.ring_mem()),
        spec,
        Some(down_region.ring_mem()),
        spec,
        cfg,
    )
    .expect("create upstream endpoint");

    let echoes = Arc::new(AtomicU32::new(0));
    let seen = echoes.clone();
    up_end.on_receive(move |entry| {
        let (hdr, payload) = MsgHeader::split(entry).expect("split echo");
        println!("upstream: echo subtype={} seq={}", hdr.subtype, payload[0]);
        seen.fetch_add(1, Ordering::Relaxed);
    });
    up_end.on_send_complete(|entry| {
        let (_, payload) = MsgHeader::split(entry).expect("split completion");
        println!("upstream: send of seq={} complete", payload[0]);
    });

    let up_mem = up_region.clone();
    let down_mem = down_region.clone();
    let downstream = thread::spawn(move || {
        let mut end = Channel::attach_downstream(
            Some(up_mem.ring_mem()),
            spec,
            Some(down_mem.ring_mem()),
            spec,
            cfg,
        )
        .expect("attach downstream endpoint");

        let inbox: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = inbox.clone();
        end.on_receive(move |entry| {
            sink.lock().expect("inbox").push(entry.to_vec());
        });
        end.on_close(|| println!("downstream: close observed"));

        while !end.is_closed() {
            end.poll().expect("downstream poll");
            let queued: Vec<Vec<u8>> = inbox.lock().expect("inbox").drain(..).collect();
            for entry in queued {
                let (hdr, payload) = MsgHeader::split(&entry).expect("split inbound");
                println!("downstream: got seq={}", payload[0]);
                let echo = build_slot(&MsgHeader::new(hdr.subtype), &payload[..8], spec.entry_size)
                    .expect("build echo");
                loop {
                    match end.send(&echo) {
                        Ok(()) => break,
                        Err(e) if e.is_retryable() => thread::sleep(Duration::from_millis(1)),
                        Err(_) => return, // link is going down
                    }
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
        println!("downstream: link closed");
    });

    for seq in 0..count {
        let payload = [seq as u8, 0, 0, 0, 0, 0, 0, 0];
        let slot = build_slot(&MsgHeader::new(1), &payload, spec.entry_size).expect("build slot");
        loop {
            match up_end.send(&slot) {
                Ok(()) => break,
                Err(e) if e.is_retryable() => {
                    up_end.poll().expect("upstream poll");
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => panic!("send failed: {e}"),
            }
        }
    }

    while echoes.load(Ordering::Relaxed) < count {
        up_end.poll().expect("upstream poll");
        thread::sleep(Duration::from_millis(1));
    }

    println!("upstream: all {count} echoes received, closing");
    up_end.close();
    while !up_end.is_closed() {
        up_end.poll().expect("upstream poll");
        thread::sleep(Duration::from_millis(1));
    }

    downstream.join().expect("join downstream");
    println!("upstream: link closed");
}
