//! Sample hand-off between the capture callback and the capture worker.
//!
//! The callback side only ever calls `push_slice` on a `ringbuf` SPSC
//! producer, which is wait-free. The worker side drains in scratch-sized
//! blocks with `drain_blocks`.

pub mod pcm;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Callback half of the ring.
pub type SampleProducer = ringbuf::HeapProd<f32>;

/// Worker half of the ring.
pub type SampleConsumer = ringbuf::HeapCons<f32>;

/// 2^17 mono f32 samples, about 2.7 s at 48 kHz. Only fills if the worker
/// stops ticking.
pub const RING_CAPACITY: usize = 1 << 17;

pub fn sample_ring() -> (SampleProducer, SampleConsumer) {
    HeapRb::<f32>::new(RING_CAPACITY).split()
}

/// Pop everything currently queued, `scratch.len()` samples at a time,
/// handing each block to `sink`. Returns the number of samples drained.
pub fn drain_blocks(
    consumer: &mut SampleConsumer,
    scratch: &mut [f32],
    mut sink: impl FnMut(&[f32]),
) -> usize {
    if scratch.is_empty() {
        return 0;
    }
    let mut total = 0;
    loop {
        let n = consumer.pop_slice(scratch);
        if n == 0 {
            return total;
        }
        sink(&scratch[..n]);
        total += n;
    }
}
