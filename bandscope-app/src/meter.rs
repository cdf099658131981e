//! Text meter: renders a band vector as a row of block glyphs.

/// Width of the display-side vector shown before the first spectrum arrives.
pub const DISPLAY_PLACEHOLDER_BANDS: usize = 16;

const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Latest bands as seen by the renderer.
#[derive(Debug, Clone)]
pub struct Meter {
    bands: Vec<f32>,
    seq: Option<u64>,
}

impl Default for Meter {
    fn default() -> Self {
        Self {
            bands: vec![0.0; DISPLAY_PLACEHOLDER_BANDS],
            seq: None,
        }
    }
}

impl Meter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the displayed bands. Older sequence numbers are ignored.
    pub fn update(&mut self, seq: u64, bands: &[f32]) {
        if self.seq.is_some_and(|last| seq <= last) {
            return;
        }
        self.seq = Some(seq);
        self.bands = bands.to_vec();
    }

    pub fn has_signal(&self) -> bool {
        self.seq.is_some()
    }

    pub fn render(&self) -> String {
        render_bands(&self.bands)
    }
}

pub fn render_bands(bands: &[f32]) -> String {
    bands
        .iter()
        .map(|&b| {
            let level = if b.is_finite() { b.clamp(0.0, 1.0) } else { 0.0 };
            let idx = (level * (GLYPHS.len() - 1) as f32).round() as usize;
            GLYPHS[idx.min(GLYPHS.len() - 1)]
        })
        .collect()
}
