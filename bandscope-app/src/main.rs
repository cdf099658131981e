//! Bandscope headless host.
//!
//! Wires logging and settings, starts capture on the preferred input device
//! (or replays a WAV file through an in-memory source) and logs the band
//! vector as a text meter until Ctrl-C or the configured run time elapses.
//!
//! ## Runtime note
//!
//! `SpectrumAnalyzer::start` and `stop` block on the capture worker thread, so
//! they are called through `spawn_blocking`, never directly on the runtime.

mod meter;
mod replay;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bandscope_core::{
    AnalyzerConfig, AnalyzerEvent, CaptureSource, CpalSource, MemorySource, SpectrumAnalyzer,
};
use meter::Meter;
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Debug, Default)]
struct Args {
    settings: Option<PathBuf>,
    device: Option<String>,
    wav: Option<PathBuf>,
    seconds: Option<u64>,
    /// Write the merged settings back to the settings file.
    save_settings: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .with_context(|| format!("missing value for {flag}"))
        };
        match arg.as_str() {
            "--settings" => args.settings = Some(PathBuf::from(value("--settings")?)),
            "--device" => args.device = Some(value("--device")?),
            "--wav" => args.wav = Some(PathBuf::from(value("--wav")?)),
            "--seconds" => {
                let raw = value("--seconds")?;
                args.seconds = Some(
                    raw.parse::<u64>()
                        .with_context(|| format!("invalid value for --seconds: {raw}"))?,
                );
            }
            "--save-settings" => args.save_settings = true,
            "--help" | "-h" => {
                println!(
                    "Usage: bandscope [--settings <file.json>] [--device <name>] \\
  [--wav <file.wav>] [--seconds <n>] [--save-settings]

Logs an 8-band spectrum meter of the selected input. RUST_LOG overrides the
default `bandscope=info` filter. --save-settings writes the device and run
time given on the command line back to the settings file."
                );
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bandscope=info")),
        )
        .init();

    let args = parse_args()?;
    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    apply_overrides(&mut settings, &args);
    info!(path = %settings_path.display(), ?settings, "Bandscope starting");
    if args.save_settings {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("saving {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings saved");
    }

    let config = AnalyzerConfig {
        transform: settings.transform,
        ..AnalyzerConfig::default()
    };
    let tick = config.tick_interval;
    let sample_rate = config.format.sample_rate;
    let analyzer = Arc::new(SpectrumAnalyzer::new(config)?);

    let render = tokio::spawn(render_loop(
        Arc::clone(&analyzer),
        Duration::from_millis(settings.meter_interval_ms),
    ));

    // ── Select the capture source ───────────────────────────────────────────
    let mut replay_task = None;
    let source: Arc<dyn CaptureSource> = match &args.wav {
        Some(path) => {
            let samples = replay::load_pcm(path, sample_rate)?;
            let memory = MemorySource::new(format!("replay:{}", path.display()));
            replay_task = Some((memory.feed(), samples));
            Arc::new(memory)
        }
        None => Arc::new(CpalSource::new(settings.preferred_input_device.clone())),
    };
    analyzer.set_source(Some(source));
    apply_controls(&analyzer, &settings);

    let starter = Arc::clone(&analyzer);
    if let Err(e) = tokio::task::spawn_blocking(move || starter.start()).await? {
        error!("capture could not start: {e}");
        render.abort();
        return Err(e).context("starting capture");
    }

    let replay = replay_task
        .map(|(feed, samples)| tokio::spawn(replay::play(feed, samples, sample_rate, tick)));

    let run_for = settings.run_for_secs.map(Duration::from_secs);
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("ctrl-c handler failed: {e}");
            }
            info!("interrupted");
        }
        _ = async {
            match run_for {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        } => info!("run time elapsed"),
    }

    if let Some(task) = replay {
        task.abort();
    }
    let stopper = Arc::clone(&analyzer);
    tokio::task::spawn_blocking(move || stopper.stop()).await?;
    render.abort();

    let diag = analyzer.diagnostics_snapshot();
    info!(
        ticks = diag.ticks,
        processed = diag.cycles_processed,
        skipped = diag.cycles_skipped,
        bytes = diag.bytes_read,
        "Bandscope stopped"
    );
    Ok(())
}

/// Command-line values win over the settings file.
fn apply_overrides(settings: &mut AppSettings, args: &Args) {
    if let Some(device) = args.device.clone() {
        settings.preferred_input_device = Some(device);
    }
    if let Some(secs) = args.seconds {
        settings.run_for_secs = Some(secs);
    }
    settings.normalize();
}

fn apply_controls(analyzer: &SpectrumAnalyzer, settings: &AppSettings) {
    analyzer.set_volume(settings.volume);
    analyzer.set_muted(settings.muted);
}

/// Follow analyzer events and log the meter every `interval`.
async fn render_loop(analyzer: Arc<SpectrumAnalyzer>, interval: Duration) {
    let mut rx = analyzer.subscribe();
    let mut meter = Meter::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(AnalyzerEvent::Spectrum(ev)) => meter.update(ev.seq, &ev.bands),
                Ok(AnalyzerEvent::Status(ev)) => match ev.detail {
                    Some(detail) => info!(status = ?ev.status, %detail, "capture status"),
                    None => info!(status = ?ev.status, "capture status"),
                },
                Ok(AnalyzerEvent::Availability(ev)) => info!(available = ev.available, "device availability"),
                Ok(AnalyzerEvent::Volume(ev)) => info!(volume = ev.volume, "volume changed"),
                Ok(AnalyzerEvent::Muted(ev)) => info!(muted = ev.muted, "mute changed"),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "meter fell behind"),
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                if meter.has_signal() {
                    info!(target: "bandscope::meter", "{}", meter.render());
                }
            }
        }
    }
}
