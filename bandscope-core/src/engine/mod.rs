//! `SpectrumAnalyzer`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! SpectrumAnalyzer::new()
//!     └─► set_source(Some(..))  → available = true
//!         └─► start()           → stream open on worker thread, status = Capturing
//!             └─► stop()        → worker joined, stream dropped, bands reset, status = Stopped
//! ```
//!
//! `start()` while capturing restarts capture; `stop()` is always safe and
//! always publishes (and announces) an all-zero band vector.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS. The stream is therefore opened
//! *inside* the worker thread and never leaves it. A one-shot channel carries
//! the open result back so `start()` can report it synchronously.

pub mod processor;
pub mod state;
pub mod worker;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    audio::{CaptureSource, StreamFormat},
    dsp::TransformKind,
    error::{BandscopeError, Result},
    ipc::events::{
        AnalyzerEvent, AvailabilityEvent, CaptureStatus, CaptureStatusEvent, MuteEvent,
        SpectrumEvent, VolumeEvent,
    },
};

use self::{
    processor::FrameProcessor,
    state::{BandSnapshot, SpectrumCell},
    worker::{DiagnosticsSnapshot, WorkerCommand, WorkerContext, WorkerDiagnostics},
};

/// Broadcast channel capacity: events buffered for slow subscribers.
const BROADCAST_CAP: usize = 256;

/// Volume requests closer than this to the current volume are ignored.
pub const VOLUME_EPSILON: f32 = 0.01;

/// Configuration for `SpectrumAnalyzer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerConfig {
    /// Format requested from the capture source. Default: 44.1 kHz mono i16.
    #[serde(skip)]
    pub format: StreamFormat,
    /// Capture-and-process cadence. Default: 50 ms.
    #[serde(with = "millis")]
    pub tick_interval: Duration,
    /// Ticks with fewer buffered bytes are skipped. Default: 4096.
    pub min_bytes_per_tick: usize,
    /// Upper bound on one read. Default: 16384.
    pub max_bytes_per_tick: usize,
    /// Number of output bands. Default: 8.
    pub band_count: usize,
    /// Smallest transform length; also the minimum sample count. Default: 256.
    pub min_fft_len: usize,
    /// Largest transform length. Default: 1024.
    pub max_fft_len: usize,
    /// EMA weight of the previous value. Default: 0.6.
    pub smoothing: f32,
    /// dB mapped to 0.0. Default: -60.
    pub floor_db: f32,
    /// Transform backend. Default: radix2.
    pub transform: TransformKind,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            format: StreamFormat::CD_MONO_I16,
            tick_interval: Duration::from_millis(50),
            min_bytes_per_tick: 4_096,
            max_bytes_per_tick: 16_384,
            band_count: 8,
            min_fft_len: 256,
            max_fft_len: 1_024,
            smoothing: 0.6,
            floor_db: -60.0,
            transform: TransformKind::Radix2,
        }
    }
}

impl AnalyzerConfig {
    /// Check the invariants the processor relies on.
    ///
    /// # Errors
    /// `BandscopeError::InvalidConfig` naming the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(BandscopeError::InvalidConfig(msg));

        if !self.min_fft_len.is_power_of_two() || !self.max_fft_len.is_power_of_two() {
            return fail(format!(
                "fft bounds must be powers of two (got {}..={})",
                self.min_fft_len, self.max_fft_len
            ));
        }
        if self.min_fft_len < 2 || self.min_fft_len > self.max_fft_len {
            return fail(format!(
                "min_fft_len {} must be in 2..={}",
                self.min_fft_len, self.max_fft_len
            ));
        }
        if self.band_count == 0 || self.band_count > self.min_fft_len / 2 {
            return fail(format!(
                "band_count {} must be in 1..={}",
                self.band_count,
                self.min_fft_len / 2
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return fail(format!("smoothing {} must be in [0, 1)", self.smoothing));
        }
        if self.floor_db.is_nan() || self.floor_db >= 0.0 {
            return fail(format!("floor_db {} must be negative", self.floor_db));
        }
        if self.max_bytes_per_tick < self.min_bytes_per_tick {
            return fail(format!(
                "max_bytes_per_tick {} is below min_bytes_per_tick {}",
                self.max_bytes_per_tick, self.min_bytes_per_tick
            ));
        }
        if self.tick_interval.is_zero() {
            return fail("tick_interval must be non-zero".into());
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Nominal volume plus mute flag. The stream sees `effective()`.
#[derive(Debug, Clone, Copy)]
struct Controls {
    volume: f32,
    muted: bool,
}

impl Controls {
    fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

struct WorkerHandle {
    commands: Sender<WorkerCommand>,
    thread: JoinHandle<()>,
}

/// The top-level analyzer handle.
///
/// `SpectrumAnalyzer` is `Send + Sync`; wrap it in `Arc` to share between a
/// control thread and render tasks.
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    source: Mutex<Option<Arc<dyn CaptureSource>>>,
    available: AtomicBool,
    controls: Mutex<Controls>,
    processor: Arc<Mutex<FrameProcessor>>,
    cell: Arc<SpectrumCell>,
    status: Mutex<CaptureStatus>,
    events_tx: broadcast::Sender<AnalyzerEvent>,
    /// `Some` while a capture worker is alive.
    worker: Mutex<Option<WorkerHandle>>,
    diagnostics: Arc<WorkerDiagnostics>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer with no capture source. Call `set_source()` then `start()`.
    ///
    /// # Errors
    /// `BandscopeError::InvalidConfig` if `config.validate()` fails.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let (events_tx, _) = broadcast::channel(BROADCAST_CAP);
        let processor = FrameProcessor::new(&config);
        info!(
            bands = config.band_count,
            transform = processor.transform_name(),
            "spectrum analyzer created"
        );

        Ok(Self {
            cell: Arc::new(SpectrumCell::new(config.band_count)),
            processor: Arc::new(Mutex::new(processor)),
            config,
            source: Mutex::new(None),
            available: AtomicBool::new(false),
            controls: Mutex::new(Controls {
                volume: 1.0,
                muted: false,
            }),
            status: Mutex::new(CaptureStatus::Idle),
            events_tx,
            worker: Mutex::new(None),
            diagnostics: Arc::new(WorkerDiagnostics::default()),
        })
    }

    /// Select (or clear) the capture source.
    ///
    /// Any running capture is stopped first. Availability follows whether a
    /// source is present and is always announced.
    pub fn set_source(&self, source: Option<Arc<dyn CaptureSource>>) {
        if self.is_capturing() {
            self.stop();
        }

        let available = source.is_some();
        match &source {
            Some(s) => info!(source = s.name(), "capture source selected"),
            None => info!("capture source cleared"),
        }
        *self.source.lock() = source;
        self.available.store(available, Ordering::SeqCst);
        self.emit(AnalyzerEvent::Availability(AvailabilityEvent { available }));
    }

    /// Open the capture stream and start the tick.
    ///
    /// Blocks until the worker reports the stream open (or failed). On failure
    /// capture stays inactive, the failure is logged and returned, and the
    /// caller may simply call `start()` again.
    ///
    /// # Errors
    /// - `BandscopeError::DeviceUnavailable` when no source is selected or the
    ///   source reports its device gone; availability drops to false.
    /// - `BandscopeError::StreamOpen` / `AudioDevice` from the source.
    pub fn start(&self) -> Result<()> {
        let Some(source) = self.source.lock().clone() else {
            warn!("no audio device available");
            self.mark_unavailable();
            return Err(BandscopeError::DeviceUnavailable);
        };

        if self.is_capturing() {
            info!("capture already running, restarting");
            self.stop();
        }

        let mut worker_slot = self.worker.lock();
        self.diagnostics.reset();

        let (open_tx, open_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let initial_volume = self.controls.lock().effective();

        let ctx = WorkerContext {
            config: self.config.clone(),
            processor: Arc::clone(&self.processor),
            cell: Arc::clone(&self.cell),
            events_tx: self.events_tx.clone(),
            commands: cmd_rx,
            diagnostics: Arc::clone(&self.diagnostics),
        };
        let format = self.config.format;

        let thread = std::thread::Builder::new()
            .name("bandscope-capture".into())
            .spawn(move || {
                // ── Open stream (must happen on THIS thread: cpal::Stream is !Send) ──
                let mut stream = match source.open_stream(format) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };
                stream.set_volume(initial_volume);
                let _ = open_tx.send(Ok(()));
                worker::run(ctx, stream);
            })?;

        match open_rx.recv() {
            Ok(Ok(())) => {
                *worker_slot = Some(WorkerHandle {
                    commands: cmd_tx,
                    thread,
                });
                drop(worker_slot);
                if !self.available.swap(true, Ordering::SeqCst) {
                    self.emit(AnalyzerEvent::Availability(AvailabilityEvent { available: true }));
                }
                self.set_status(CaptureStatus::Capturing, None);
                info!(volume = initial_volume, "audio capture started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                drop(worker_slot);
                error!("audio capture failed to start: {e}");
                if matches!(e, BandscopeError::DeviceUnavailable) {
                    self.mark_unavailable();
                }
                self.set_status(CaptureStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                // Sender dropped without a message: the worker panicked.
                let _ = thread.join();
                drop(worker_slot);
                error!("capture worker died before opening the stream");
                self.set_status(CaptureStatus::Error, Some("capture worker died".into()));
                Err(BandscopeError::WorkerDied)
            }
        }
    }

    /// Stop capture, release the stream and publish an all-zero band vector.
    ///
    /// Waits for the worker to finish its current tick. Safe to call when not
    /// capturing; the reset is published and announced either way.
    pub fn stop(&self) {
        let handle = self.worker.lock().take();
        let was_capturing = handle.is_some();

        if let Some(WorkerHandle { commands, thread }) = handle {
            let _ = commands.send(WorkerCommand::Stop);
            if thread.join().is_err() {
                error!("capture worker panicked");
            }
        }

        self.processor.lock().reset();
        let snapshot = self.cell.reset();
        self.emit(AnalyzerEvent::Spectrum(SpectrumEvent {
            seq: snapshot.seq,
            bands: snapshot.bands.clone(),
        }));

        if was_capturing {
            self.set_status(CaptureStatus::Stopped, None);
        }
        info!("audio capture stopped");
    }

    /// Set the nominal volume, clamped to [0, 1].
    ///
    /// Requests within `VOLUME_EPSILON` of the current volume (and non-finite
    /// values) are ignored. While muted the stream keeps seeing 0.
    pub fn set_volume(&self, volume: f32) {
        if !volume.is_finite() {
            warn!(volume, "ignoring non-finite volume");
            return;
        }

        let (stored, forward) = {
            let mut controls = self.controls.lock();
            if (controls.volume - volume).abs() <= VOLUME_EPSILON {
                return;
            }
            controls.volume = volume.clamp(0.0, 1.0);
            (controls.volume, (!controls.muted).then_some(controls.volume))
        };

        if let Some(level) = forward {
            self.forward_volume(level);
        }
        self.emit(AnalyzerEvent::Volume(VolumeEvent { volume: stored }));
    }

    /// Mute or un-mute without touching the nominal volume.
    pub fn set_muted(&self, muted: bool) {
        let effective = {
            let mut controls = self.controls.lock();
            if controls.muted == muted {
                return;
            }
            controls.muted = muted;
            controls.effective()
        };

        self.forward_volume(effective);
        self.emit(AnalyzerEvent::Muted(MuteEvent { muted }));
    }

    pub fn volume(&self) -> f32 {
        self.controls.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.controls.lock().muted
    }

    /// Whether a capture source is selected and its device was last seen.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn is_capturing(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Current lifecycle status (snapshot).
    pub fn status(&self) -> CaptureStatus {
        *self.status.lock()
    }

    /// Copy of the latest band vector.
    pub fn band_vector(&self) -> Vec<f32> {
        self.cell.band_vector()
    }

    /// Latest published snapshot, including its sequence number.
    pub fn snapshot(&self) -> Arc<BandSnapshot> {
        self.cell.snapshot()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
        self.events_tx.subscribe()
    }

    /// Snapshot of worker counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn forward_volume(&self, level: f32) {
        if let Some(worker) = self.worker.lock().as_ref() {
            if worker.commands.send(WorkerCommand::SetVolume(level)).is_err() {
                warn!("capture worker gone; volume not forwarded");
            }
        }
    }

    /// Clear the availability flag, announcing it only on a true -> false edge.
    fn mark_unavailable(&self) {
        if self.available.swap(false, Ordering::SeqCst) {
            self.emit(AnalyzerEvent::Availability(AvailabilityEvent { available: false }));
        }
    }

    fn set_status(&self, new_status: CaptureStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        self.emit(AnalyzerEvent::Status(CaptureStatusEvent {
            status: new_status,
            detail,
        }));
    }

    fn emit(&self, event: AnalyzerEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl Drop for SpectrumAnalyzer {
    fn drop(&mut self) {
        if self.worker.get_mut().is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("status", &self.status())
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}
