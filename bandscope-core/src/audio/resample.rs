//! Fixed-ratio sample-rate conversion onto the analyzer rate.
//!
//! Devices rarely run at 44.1 kHz natively (48 kHz is the common default).
//! `RateConverter` feeds rubato's `FastFixedIn` in fixed-size blocks and
//! carries the remainder to the next call. Equal rates skip rubato entirely.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{error, info};

use crate::error::{BandscopeError, Result};

/// Mono f32 rate converter.
pub struct RateConverter {
    /// `None` in passthrough mode.
    stage: Option<Stage>,
}

struct Stage {
    resampler: FastFixedIn<f32>,
    /// Input not yet handed to rubato (always < `block` after a call).
    carry: Vec<f32>,
    block: usize,
    /// `[1][output_frames_max]`
    scratch: Vec<Vec<f32>>,
}

impl Stage {
    fn emit(&mut self, produced: usize, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.scratch[0][..produced]);
    }
}

impl RateConverter {
    /// # Errors
    /// `BandscopeError::AudioDevice` if rubato rejects the parameters.
    pub fn new(from_rate: u32, to_rate: u32, block: usize) -> Result<Self> {
        if from_rate == to_rate {
            return Ok(Self { stage: None });
        }
        if from_rate == 0 || to_rate == 0 || block == 0 {
            return Err(BandscopeError::AudioDevice(format!(
                "cannot resample {from_rate} Hz → {to_rate} Hz in blocks of {block}"
            )));
        }

        let ratio = f64::from(to_rate) / f64::from(from_rate);
        let resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, block, 1)
            .map_err(|e| BandscopeError::AudioDevice(format!("resampler init: {e}")))?;
        let scratch = vec![vec![0f32; resampler.output_frames_max()]];

        info!(from_rate, to_rate, block, "resampling capture audio");
        Ok(Self {
            stage: Some(Stage {
                resampler,
                carry: Vec::with_capacity(block * 2),
                block,
                scratch,
            }),
        })
    }

    /// Convert `samples`, appending output to `out`. A trailing partial block
    /// is kept for the next call (or `flush`).
    pub fn process_into(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        let Some(stage) = self.stage.as_mut() else {
            out.extend_from_slice(samples);
            return;
        };

        stage.carry.extend_from_slice(samples);
        let mut consumed = 0;
        while stage.carry.len() - consumed >= stage.block {
            let input = [&stage.carry[consumed..consumed + stage.block]];
            match stage
                .resampler
                .process_into_buffer(&input, &mut stage.scratch, None)
            {
                Ok((_, produced)) => stage.emit(produced, out),
                Err(e) => error!("resampler block failed: {e}"),
            }
            consumed += stage.block;
        }
        stage.carry.drain(..consumed);
    }

    /// Convert whatever partial block is still carried. Used at end of input.
    pub fn flush(&mut self, out: &mut Vec<f32>) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        if stage.carry.is_empty() {
            return;
        }
        let input = [stage.carry.as_slice()];
        match stage
            .resampler
            .process_partial_into_buffer(Some(&input[..]), &mut stage.scratch, None)
        {
            Ok((_, produced)) => stage.emit(produced, out),
            Err(e) => error!("resampler flush failed: {e}"),
        }
        stage.carry.clear();
    }

    pub fn is_passthrough(&self) -> bool {
        self.stage.is_none()
    }

    /// Input samples waiting for a full block.
    pub fn carried(&self) -> usize {
        self.stage.as_ref().map_or(0, |s| s.carry.len())
    }
}
