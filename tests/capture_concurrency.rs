//! Producer/consumer stress tests for the capture ring
//!
//! The producer appends a strictly increasing counter (sample at cursor
//! position p holds p + 1) in randomly sized chunks while the consumer takes
//! randomly sized snapshots. Every accepted snapshot must be a contiguous,
//! ordered run ending at the published cursor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use pitch_lane::audio::CaptureRing;
use pitch_lane::error::AudioError;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Keeps every counter value exactly representable as f32
const TOTAL_SAMPLES: u64 = 1 << 21;

fn run_interleaving(seed: u64, capacity: usize, max_chunk: usize, max_window: usize) {
    let ring = CaptureRing::new(capacity);
    let mut writer = ring.writer().expect("fresh ring has no writer");
    let done = Arc::new(AtomicBool::new(false));

    let producer_done = Arc::clone(&done);
    let producer = thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut next: u64 = 1;
        let mut chunk = Vec::with_capacity(max_chunk);
        while next <= TOTAL_SAMPLES {
            let len = rng.gen_range(1..=max_chunk) as u64;
            chunk.clear();
            chunk.extend((next..(next + len).min(TOTAL_SAMPLES + 1)).map(|v| v as f32));
            writer.append(&chunk);
            next += chunk.len() as u64;
            if rng.gen_bool(0.1) {
                thread::yield_now();
            }
        }
        producer_done.store(true, Ordering::Release);
    });

    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    let mut buffer = vec![0.0_f32; max_window];
    let mut last_end = 0u64;
    let mut accepted = 0usize;
    let mut contended = 0usize;

    loop {
        let finished = done.load(Ordering::Acquire);
        let n = rng.gen_range(1..=max_window);
        let out = &mut buffer[..n];
        match ring.snapshot(out) {
            Ok(info) => {
                accepted += 1;
                assert!(info.end_cursor >= last_end, "cursor went backwards");
                last_end = info.end_cursor;

                let pad = n - info.filled;
                assert!(out[..pad].iter().all(|&s| s == 0.0), "padding must be zero");
                if info.filled > 0 {
                    assert_eq!(out[n - 1], info.end_cursor as f32, "window must end at cursor");
                    for pair in out[pad..].windows(2) {
                        assert_eq!(pair[1], pair[0] + 1.0, "gap or duplicate in {:?}", pair);
                    }
                }
            }
            Err(AudioError::SnapshotContended { .. }) => contended += 1,
            Err(other) => panic!("unexpected snapshot error: {other}"),
        }
        if finished {
            break;
        }
    }

    producer.join().expect("producer panicked");
    assert!(accepted > 0, "consumer never got a snapshot ({contended} contended)");

    let mut tail = vec![0.0_f32; max_window];
    let info = ring.snapshot(&mut tail).unwrap();
    assert_eq!(info.end_cursor, TOTAL_SAMPLES);
    assert_eq!(tail[max_window - 1], TOTAL_SAMPLES as f32);
}

#[test]
fn fuzzed_small_chunks_large_windows() {
    run_interleaving(1, 4096, 64, 2048);
}

#[test]
fn fuzzed_large_chunks_small_ring() {
    run_interleaving(2, 1024, 900, 1024);
}

#[test]
fn fuzzed_callback_sized_chunks() {
    for seed in 3..6 {
        run_interleaving(seed, 4410 * 3, 512, 4410);
    }
}

#[test]
fn writer_can_be_reclaimed_across_threads() {
    let ring = CaptureRing::new(8);
    let writer = ring.writer().unwrap();
    let handle = thread::spawn(move || {
        let mut writer = writer;
        writer.append(&[1.0, 2.0, 3.0]);
    });
    handle.join().unwrap();

    let mut writer = ring.writer().expect("writer released after drop");
    writer.append(&[4.0]);

    let mut out = [0.0; 4];
    let info = ring.snapshot(&mut out).unwrap();
    assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    assert!(info.is_complete(4));
}
