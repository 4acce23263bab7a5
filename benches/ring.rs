// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ring throughput benchmarks.
//
// Run with:
//   cargo bench --bench ring
//
// Groups:
//   send_recv  — one message through a duplex link and back out of the
//                consumer, per slot size
//   completion — send plus peer consumption plus completion report
//   pending    — the read-only count queries
//
// Each group exercises slot sizes 16, 64, and 256 bytes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use memlink::{Channel, ChannelConfig, HeapRegion, RingSpec};

const SLOT_SIZES: &[u16] = &[16, 64, 256];
const RING_SIZE: u32 = 64;

fn config() -> ChannelConfig {
    ChannelConfig {
        entry_type: 1,
        pid: 1,
        never_full: false,
    }
}

fn duplex(spec: RingSpec) -> (HeapRegion, HeapRegion, Channel, Channel) {
    let up = HeapRegion::new(spec.region_bytes());
    let down = HeapRegion::new(spec.region_bytes());
    let creator = Channel::create_upstream(
        Some(up.ring_mem()),
        spec,
        Some(down.ring_mem()),
        spec,
        config(),
    )
    .expect("create upstream");
    let joiner = Channel::attach_downstream(
        Some(up.ring_mem()),
        spec,
        Some(down.ring_mem()),
        spec,
        config(),
    )
    .expect("attach downstream");
    (up, down, creator, joiner)
}

fn bench_send_recv(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_recv");

    for &entry_size in SLOT_SIZES {
        let spec = RingSpec::new(RING_SIZE, entry_size);
        group.throughput(Throughput::Bytes(entry_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(entry_size),
            &entry_size,
            |b, &sz| {
                let (_up, _down, mut creator, mut joiner) = duplex(spec);
                joiner.on_receive(|entry| {
                    black_box(entry);
                });
                let msg = vec![0xA5u8; sz as usize];
                b.iter(|| {
                    creator.send(&msg).expect("send");
                    joiner.poll_downstream().expect("poll");
                });
            },
        );
    }

    group.finish();
}

fn bench_completion(c: &mut Criterion) {
    let mut group = c.benchmark_group("completion");

    for &entry_size in SLOT_SIZES {
        let spec = RingSpec::new(RING_SIZE, entry_size);
        group.throughput(Throughput::Bytes(entry_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(entry_size),
            &entry_size,
            |b, &sz| {
                let (_up, _down, mut creator, mut joiner) = duplex(spec);
                joiner.on_receive(|entry| {
                    black_box(entry);
                });
                creator.on_send_complete(|entry| {
                    black_box(entry);
                });
                let msg = vec![0x5Au8; sz as usize];
                b.iter(|| {
                    creator.send(&msg).expect("send");
                    joiner.poll_downstream().expect("consume");
                    creator.poll_downstream().expect("complete");
                });
            },
        );
    }

    group.finish();
}

fn bench_pending(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending");

    let spec = RingSpec::new(RING_SIZE, 64);
    let (_up, _down, mut creator, joiner) = duplex(spec);
    let msg = vec![1u8; 64];
    for _ in 0..8 {
        creator.send(&msg).expect("send");
    }

    group.bench_function("unread", |b| {
        b.iter(|| black_box(joiner.pending_downstream()));
    });
    group.bench_function("unacked", |b| {
        b.iter(|| black_box(creator.pending_downstream()));
    });

    group.finish();
}

criterion_group!(benches, bench_send_recv, bench_completion, bench_pending);
criterion_main!(benches);
