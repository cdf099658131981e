//! Published band state shared between the capture worker and renderers.
//!
//! Writers build a new immutable `BandSnapshot` outside the lock and swap the
//! `Arc` in under it. Readers clone the `Arc` under the lock and leave. The
//! lock is never held across anything else, so a reader on a render thread can
//! never stall the tick, and never sees a half-written vector.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;

/// One published band vector.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSnapshot {
    /// Increases by one on every publish (including resets).
    pub seq: u64,
    pub bands: Vec<f32>,
}

impl BandSnapshot {
    pub fn zeroed(band_count: usize) -> Self {
        Self {
            seq: 0,
            bands: vec![0.0; band_count],
        }
    }
}

/// Lock-guarded cell holding the latest `BandSnapshot`.
#[derive(Debug)]
pub struct SpectrumCell {
    current: Mutex<Arc<BandSnapshot>>,
    next_seq: AtomicU64,
    band_count: usize,
}

impl SpectrumCell {
    pub fn new(band_count: usize) -> Self {
        Self {
            current: Mutex::new(Arc::new(BandSnapshot::zeroed(band_count))),
            next_seq: AtomicU64::new(1),
            band_count,
        }
    }

    /// Publish a copy of `bands`, returning the snapshot that was stored.
    ///
    /// # Panics
    /// Debug builds assert that `bands.len()` matches the fixed band count.
    pub fn publish(&self, bands: &[f32]) -> Arc<BandSnapshot> {
        debug_assert_eq!(bands.len(), self.band_count);
        let snapshot = Arc::new(BandSnapshot {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            bands: bands.to_vec(),
        });
        *self.current.lock() = Arc::clone(&snapshot);
        snapshot
    }

    /// Publish an all-zero vector.
    pub fn reset(&self) -> Arc<BandSnapshot> {
        self.publish(&vec![0.0; self.band_count])
    }

    /// Latest snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<BandSnapshot> {
        Arc::clone(&self.current.lock())
    }

    /// Copy of the latest band vector.
    pub fn band_vector(&self) -> Vec<f32> {
        self.snapshot().bands.clone()
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }
}
