fn main() {
    if let Err(e) = run() {
        eprintln!("benchmark failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    use bandscope_core::{
        dsp::{Complex32, PlannedFft, Radix2, Transform},
        engine::processor::FrameProcessor,
        AnalyzerConfig, TransformKind,
    };
    use serde::Serialize;
    use std::path::PathBuf;
    use std::time::Instant;

    #[derive(Debug)]
    struct Args {
        iterations: usize,
        len: usize,
        output: Option<PathBuf>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct TimingSummary {
        name: String,
        runs: usize,
        p50_us: f64,
        p95_us: f64,
        avg_us: f64,
    }

    #[derive(Debug, Clone, Serialize)]
    struct Summary {
        len: usize,
        iterations: usize,
        /// Worst-case processing time as a share of the 50 ms tick.
        worst_tick_budget_pct: f64,
        results: Vec<TimingSummary>,
    }

    fn parse_args() -> Result<Args, String> {
        let mut iterations: usize = 2_000;
        let mut len: usize = 1_024;
        let mut output: Option<PathBuf> = None;

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--iterations" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --iterations".into());
                    };
                    iterations = v
                        .parse::<usize>()
                        .map_err(|_| "invalid value for --iterations".to_string())?
                        .clamp(1, 1_000_000);
                }
                "--len" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --len".into());
                    };
                    len = v
                        .parse::<usize>()
                        .map_err(|_| "invalid value for --len".to_string())?;
                    if !len.is_power_of_two() || len < 2 {
                        return Err(format!("--len must be a power of two >= 2 (got {len})"));
                    }
                }
                "--output" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --output".into());
                    };
                    output = Some(PathBuf::from(v));
                }
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p bandscope-core --release --bin benchmark -- \\
  [--iterations <n>] [--len <power of two>] [--output <file.json>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
        }

        Ok(Args {
            iterations,
            len,
            output,
        })
    }

    fn percentile(values: &[f64], p: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        if sorted.len() == 1 {
            return sorted[0];
        }
        let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    fn summarize(name: &str, timings: &[f64]) -> TimingSummary {
        let avg_us = if timings.is_empty() {
            0.0
        } else {
            timings.iter().sum::<f64>() / timings.len() as f64
        };
        TimingSummary {
            name: name.to_string(),
            runs: timings.len(),
            p50_us: percentile(timings, 0.50),
            p95_us: percentile(timings, 0.95),
            avg_us,
        }
    }

    /// Two tones plus a slow sweep, so every band sees some energy.
    fn test_signal(len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 44_100.0;
                let sweep = 200.0 + 8_000.0 * (i as f32 / len as f32);
                let v = 0.4 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
                    + 0.3 * (2.0 * std::f32::consts::PI * 6_000.0 * t).sin()
                    + 0.2 * (2.0 * std::f32::consts::PI * sweep * t).sin();
                (v * 32_767.0) as i16
            })
            .collect()
    }

    fn time_transform(
        transform: &mut dyn Transform,
        input: &[Complex32],
        iterations: usize,
    ) -> Vec<f64> {
        let mut buffer = input.to_vec();
        (0..iterations)
            .map(|_| {
                buffer.copy_from_slice(input);
                let t0 = Instant::now();
                transform.process(&mut buffer);
                t0.elapsed().as_secs_f64() * 1e6
            })
            .collect()
    }

    let args = parse_args()?;
    println!(
        "Benchmarking len={} iterations={}",
        args.len, args.iterations
    );

    let samples = test_signal(args.len.max(1_024));
    let complex: Vec<Complex32> = samples[..args.len]
        .iter()
        .map(|&s| Complex32::new(f32::from(s) / 32_768.0, 0.0))
        .collect();

    let mut results = Vec::new();

    let mut radix = Radix2::new();
    let radix_times = time_transform(&mut radix, &complex, args.iterations);
    results.push(summarize("radix2 transform", &radix_times));

    let mut planned = PlannedFft::new();
    let planned_times = time_transform(&mut planned, &complex, args.iterations);
    results.push(summarize("rustfft transform", &planned_times));

    let mut worst_cycle_us: f64 = 0.0;
    for kind in [TransformKind::Radix2, TransformKind::Planned] {
        let config = AnalyzerConfig {
            transform: kind,
            ..AnalyzerConfig::default()
        };
        let mut processor = FrameProcessor::new(&config);
        let cycle_times: Vec<f64> = (0..args.iterations)
            .map(|_| {
                let t0 = Instant::now();
                let _ = processor.process_samples(&samples);
                t0.elapsed().as_secs_f64() * 1e6
            })
            .collect();
        worst_cycle_us = cycle_times.iter().copied().fold(worst_cycle_us, f64::max);
        results.push(summarize(
            &format!("full cycle ({})", processor.transform_name()),
            &cycle_times,
        ));
    }

    let tick_us = AnalyzerConfig::default().tick_interval.as_secs_f64() * 1e6;
    let summary = Summary {
        len: args.len,
        iterations: args.iterations,
        worst_tick_budget_pct: worst_cycle_us / tick_us * 100.0,
        results,
    };

    for r in &summary.results {
        println!(
            "{:<24} p50={:.1}us p95={:.1}us avg={:.1}us",
            r.name, r.p50_us, r.p95_us, r.avg_us
        );
    }
    println!(
        "Done. worst cycle used {:.2}% of the tick",
        summary.worst_tick_budget_pct
    );

    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote benchmark report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
