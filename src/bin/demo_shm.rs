// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Cross-process demo over named shared memory. Run the two halves in
// separate terminals:
//
//   demo_shm up [count]   — create the link, send, report echoes, close
//   demo_shm down         — attach, echo every message until the link closes
//
// The downstream half retries attachment until the upstream half has
// created the regions and authored the ring metadata.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use memlink::{build_slot, Channel, ChannelConfig, MsgHeader, RingSpec, ShmRegion};

const UP_NAME: &str = "memlink_demo_up";
const DOWN_NAME: &str = "memlink_demo_down";

fn spec() -> RingSpec {
    RingSpec::new(64, 32)
}

fn config() -> ChannelConfig {
    ChannelConfig {
        entry_type: 1,
        pid: 1,
        never_full: false,
    }
}

fn run_up(count: u32) {
    let spec = spec();
    let up_region = ShmRegion::create(UP_NAME, spec.region_bytes()).expect("create upstream shm");
    let down_region =
        ShmRegion::create(DOWN_NAME, spec.region_bytes()).expect("create downstream shm");

    let mut ch = Channel::create_upstream(
        Some(up_region.ring_mem()),
        spec,
        Some(down_region.ring_mem()),
        spec,
        config(),
    )
    .expect("create channel");

    let echoes = Arc::new(AtomicU32::new(0));
    let seen = echoes.clone();
    ch.on_receive(move |entry| {
        let (_, payload) = MsgHeader::split(entry).expect("split echo");
        println!("up: echo seq={}", payload[0]);
        seen.fetch_add(1, Ordering::Relaxed);
    });

    println!("up: link ready, sending {count} messages");
    for seq in 0..count {
        let payload = [seq as u8, 0, 0, 0, 0, 0, 0, 0];
        let slot = build_slot(&MsgHeader::new(1), &payload, spec.entry_size).expect("build slot");
        loop {
            match ch.send(&slot) {
                Ok(()) => break,
                Err(e) if e.is_retryable() => {
                    ch.poll().expect("poll");
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => panic!("send failed: {e}"),
            }
        }
    }

    while echoes.load(Ordering::Relaxed) < count {
        ch.poll().expect("poll");
        thread::sleep(Duration::from_millis(1));
    }

    println!("up: all echoes in, closing link");
    ch.close();
    while !ch.is_closed() {
        ch.poll().expect("poll");
        thread::sleep(Duration::from_millis(1));
    }

    up_region.unlink();
    down_region.unlink();
    println!("up: done");
}

fn run_down() {
    let spec = spec();

    // Wait for the upstream half to create the regions and author the
    // metadata; until then open or attach fails.
    let (mut ch, _up_region, _down_region) = loop {
        let regions = ShmRegion::open(UP_NAME, spec.region_bytes())
            .and_then(|up| ShmRegion::open(DOWN_NAME, spec.region_bytes()).map(|down| (up, down)));
        if let Ok((up_region, down_region)) = regions {
            // Keep the regions mapped for as long as the channel lives.
            if let Ok(ch) = Channel::attach_downstream(
                Some(up_region.ring_mem()),
                spec,
                Some(down_region.ring_mem()),
                spec,
                config(),
            ) {
                break (ch, up_region, down_region);
            }
        }
        thread::sleep(Duration::from_millis(100));
    };

    println!("down: attached");

    let inbox: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = inbox.clone();
    ch.on_receive(move |entry| {
        sink.lock().expect("inbox").push(entry.to_vec());
    });
    ch.on_close(|| println!("down: close observed"));

    while !ch.is_closed() {
        ch.poll().expect("poll");
        let queued: Vec<Vec<u8>> = inbox.lock().expect("inbox").drain(..).collect();
        for entry in queued {
            let (hdr, payload) = MsgHeader::split(&entry).expect("split inbound");
            println!("down: got seq={}", payload[0]);
            let echo = build_slot(&MsgHeader::new(hdr.subtype), &payload[..8], spec.entry_size)
                .expect("build echo");
            loop {
                match ch.send(&echo) {
                    Ok(()) => break,
                    Err(e) if e.is_retryable() => thread::sleep(Duration::from_millis(1)),
                    Err(_) => return,
                }
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
    println!("down: link closed");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("up") => {
            let count = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(16);
            run_up(count);
        }
        Some("down") => run_down(),
        _ => {
            eprintln!("usage: demo_shm up [count]");
            eprintln!("       demo_shm down");
            std::process::exit(1);
        }
    }
}
