//! Capture worker loop.
//!
//! ## Per tick
//!
//! ```text
//! 1. Ask the stream how many bytes are buffered
//! 2. < min_bytes_per_tick → skip (next tick retries)
//! 3. Read min(available, max_bytes_per_tick) bytes
//! 4. FrameProcessor → smoothed bands
//! 5. Publish into SpectrumCell, then broadcast AnalyzerEvent::Spectrum
//! ```
//!
//! The loop `select!`s between the command channel and a crossbeam ticker, so
//! commands (volume, stop) are handled between ticks and a started cycle
//! always runs to completion. The capture stream is owned by this thread for
//! its whole life.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::{select, tick, Receiver};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use super::{processor::FrameProcessor, state::SpectrumCell, AnalyzerConfig};
use crate::audio::CaptureStream;
use crate::ipc::events::{AnalyzerEvent, SpectrumEvent};

/// Messages from `SpectrumAnalyzer` to the worker thread.
#[derive(Debug)]
pub enum WorkerCommand {
    /// Forward an effective volume to the stream.
    SetVolume(f32),
    /// Close the stream and exit the loop.
    Stop,
}

#[derive(Debug, Default)]
pub struct WorkerDiagnostics {
    pub ticks: AtomicUsize,
    pub cycles_processed: AtomicUsize,
    pub cycles_skipped: AtomicUsize,
    pub bytes_read: AtomicUsize,
}

impl WorkerDiagnostics {
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.cycles_processed.store(0, Ordering::Relaxed);
        self.cycles_skipped.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            cycles_processed: self.cycles_processed.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub ticks: usize,
    pub cycles_processed: usize,
    pub cycles_skipped: usize,
    pub bytes_read: usize,
}

/// Everything the worker needs, passed as one struct so the spawn closure stays tidy.
pub struct WorkerContext {
    pub config: AnalyzerConfig,
    pub processor: Arc<Mutex<FrameProcessor>>,
    pub cell: Arc<SpectrumCell>,
    pub events_tx: broadcast::Sender<AnalyzerEvent>,
    pub commands: Receiver<WorkerCommand>,
    pub diagnostics: Arc<WorkerDiagnostics>,
}

/// Run until `WorkerCommand::Stop` arrives or the command sender is dropped.
/// Closes and drops `stream` on exit.
pub fn run(ctx: WorkerContext, mut stream: Box<dyn CaptureStream>) {
    info!(interval_ms = ctx.config.tick_interval.as_millis() as u64, "capture worker started");
    let ticker = tick(ctx.config.tick_interval);

    loop {
        select! {
            recv(ctx.commands) -> cmd => match cmd {
                Ok(WorkerCommand::SetVolume(level)) => {
                    debug!(level, "forwarding volume to stream");
                    stream.set_volume(level);
                }
                Ok(WorkerCommand::Stop) | Err(_) => break,
            },
            recv(ticker) -> _ => run_tick(&ctx, stream.as_mut()),
        }
    }

    stream.close();
    drop(stream);
    info!("capture worker stopped");
}

/// One capture-and-process cycle.
pub fn run_tick(ctx: &WorkerContext, stream: &mut dyn CaptureStream) {
    ctx.diagnostics.ticks.fetch_add(1, Ordering::Relaxed);

    let available = stream.bytes_available();
    if available < ctx.config.min_bytes_per_tick {
        ctx.diagnostics.cycles_skipped.fetch_add(1, Ordering::Relaxed);
        trace!(available, "not enough buffered audio this tick");
        return;
    }

    let mut buf = vec![0u8; available.min(ctx.config.max_bytes_per_tick)];
    let read = stream.read(&mut buf);
    if read == 0 {
        ctx.diagnostics.cycles_skipped.fetch_add(1, Ordering::Relaxed);
        return;
    }
    buf.truncate(read);
    ctx.diagnostics.bytes_read.fetch_add(read, Ordering::Relaxed);

    let snapshot = {
        let mut processor = ctx.processor.lock();
        match processor.process_bytes(&buf) {
            Some(bands) => ctx.cell.publish(bands),
            None => {
                ctx.diagnostics.cycles_skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    };
    ctx.diagnostics
        .cycles_processed
        .fetch_add(1, Ordering::Relaxed);

    trace!(seq = snapshot.seq, bytes = read, "published band vector");
    let _ = ctx.events_tx.send(AnalyzerEvent::Spectrum(SpectrumEvent {
        seq: snapshot.seq,
        bands: snapshot.bands.clone(),
    }));
}
