// CaptureRing - lock-free single-producer ring of the most recent samples
//
// The audio callback appends into a fixed, pre-allocated store; the polling
// thread copies out the newest N samples once per tick. Neither side blocks
// or allocates.
//
// Protocol (seqlock over cursors):
// - Producer: claim `write_begin = end + len`, fence, store samples, publish
//   `write_end = end + len` with Release.
// - Consumer: load `write_end` (Acquire), copy the region ending there,
//   fence, load `write_begin`. If the producer has claimed positions that
//   wrap onto the copied region the copy is discarded and retried.
//
// Samples live in `AtomicU32` slots holding `f32` bit patterns, so a single
// sample can never tear, and the consumer only reads up to a published end
// cursor, so it never observes half of an append.

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::AudioError;

/// Snapshot attempts before reporting contention
pub const MAX_SNAPSHOT_ATTEMPTS: u32 = 4;

struct RingShared {
    slots: Box<[AtomicU32]>,
    capacity: usize,
    /// Total samples claimed by the producer (published or in flight)
    write_begin: AtomicU64,
    /// Total samples fully published
    write_end: AtomicU64,
    /// Samples before this cursor are treated as never written
    floor: AtomicU64,
    writer_claimed: AtomicBool,
}

/// Result metadata for [`CaptureRing::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Number of real samples copied; the remaining leading positions were zero-filled
    pub filled: usize,
    /// Producer cursor the snapshot ends at
    pub end_cursor: u64,
    /// Attempts needed to obtain a consistent copy
    pub attempts: u32,
}

impl SnapshotInfo {
    /// Whether every position of the snapshot came from captured audio
    pub fn is_complete(&self, requested: usize) -> bool {
        self.filled == requested
    }
}

/// Fixed-capacity capture ring shared between the audio callback and the
/// polling consumer
///
/// Cloning yields another consumer handle onto the same store. The single
/// producer handle is obtained with [`CaptureRing::writer`].
///
/// # Underfill policy
/// When fewer samples than requested have been written since creation or the
/// last [`reset`](CaptureRing::reset), the oldest positions of the snapshot
/// are zero-filled and [`SnapshotInfo::filled`] reports the real count.
#[derive(Clone)]
pub struct CaptureRing {
    shared: Arc<RingShared>,
}

/// Producer handle; at most one exists per ring at any time
///
/// Dropping the writer releases the claim so the next capture session can
/// take it.
pub struct CaptureWriter {
    shared: Arc<RingShared>,
    cursor: u64,
}

impl CaptureRing {
    /// Create a ring holding `capacity` samples
    ///
    /// # Panics
    /// Panics if capacity is 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");

        let slots = (0..capacity)
            .map(|_| AtomicU32::new(0.0_f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shared: Arc::new(RingShared {
                slots,
                capacity,
                write_begin: AtomicU64::new(0),
                write_end: AtomicU64::new(0),
                floor: AtomicU64::new(0),
                writer_claimed: AtomicBool::new(false),
            }),
        }
    }

    /// Claim the producer handle, `None` if another writer is alive
    pub fn writer(&self) -> Option<CaptureWriter> {
        if self.shared.writer_claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(CaptureWriter {
            shared: Arc::clone(&self.shared),
            cursor: self.shared.write_end.load(Ordering::Acquire),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Total samples appended over the ring's lifetime
    pub fn total_written(&self) -> u64 {
        self.shared.write_end.load(Ordering::Acquire)
    }

    /// Samples available since creation or the last reset, capped at capacity
    pub fn available(&self) -> usize {
        let end = self.shared.write_end.load(Ordering::Acquire);
        let floor = self.shared.floor.load(Ordering::Acquire).min(end);
        ((end - floor) as usize).min(self.shared.capacity)
    }

    /// Forget everything captured so far
    ///
    /// Never touches the slots, so it is safe even while a producer is
    /// still running; later snapshots zero-fill what came before the reset.
    pub fn reset(&self) {
        let end = self.shared.write_end.load(Ordering::Acquire);
        self.shared.floor.store(end, Ordering::Release);
    }

    /// Copy the most recent `out.len()` samples, oldest to newest
    pub fn snapshot(&self, out: &mut [f32]) -> Result<SnapshotInfo, AudioError> {
        let shared = &*self.shared;
        let n = out.len();
        if n > shared.capacity {
            return Err(AudioError::SnapshotTooLarge {
                requested: n,
                capacity: shared.capacity,
            });
        }

        let capacity = shared.capacity as u64;
        for attempt in 1..=MAX_SNAPSHOT_ATTEMPTS {
            let end = shared.write_end.load(Ordering::Acquire);
            let floor = shared.floor.load(Ordering::Acquire).min(end);
            let filled = ((end - floor) as usize).min(n);
            let start = end - filled as u64;
            let pad = n - filled;

            out[..pad].fill(0.0);
            for (offset, slot) in out[pad..].iter_mut().enumerate() {
                let index = ((start + offset as u64) % capacity) as usize;
                *slot = f32::from_bits(shared.slots[index].load(Ordering::Relaxed));
            }

            fence(Ordering::Acquire);
            let begin = shared.write_begin.load(Ordering::Relaxed);
            if begin <= start + capacity {
                return Ok(SnapshotInfo {
                    filled,
                    end_cursor: end,
                    attempts: attempt,
                });
            }
        }

        Err(AudioError::SnapshotContended {
            attempts: MAX_SNAPSHOT_ATTEMPTS,
        })
    }
}

impl CaptureWriter {
    /// Append samples, overwriting the oldest data when full
    ///
    /// Real-time safe: no locks, no allocation, O(samples.len()). When one
    /// call carries more than `capacity` samples only the trailing
    /// `capacity` are stored, but the cursor still advances by the full count.
    pub fn append(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let shared = &*self.shared;
        let capacity = shared.capacity;
        let skipped = samples.len().saturating_sub(capacity);
        let kept = &samples[skipped..];

        let start = self.cursor + skipped as u64;
        let end = start + kept.len() as u64;

        shared.write_begin.store(end, Ordering::Relaxed);
        fence(Ordering::Release);

        let mut index = (start % capacity as u64) as usize;
        for &sample in kept {
            shared.slots[index].store(sample.to_bits(), Ordering::Relaxed);
            index += 1;
            if index == capacity {
                index = 0;
            }
        }

        shared.write_end.store(end, Ordering::Release);
        self.cursor = end;
    }

    /// Total samples appended through this ring
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

impl Drop for CaptureWriter {
    fn drop(&mut self) {
        self.shared.writer_claimed.store(false, Ordering::Release);
    }
}
