// src/viz/waveform.rs
// Min/max envelope rendering of a decoded sample buffer

use super::{Color, Raster};

/// Appearance and dimensions of a waveform render.
#[derive(Debug, Clone)]
pub struct WaveformConfig {
    pub width: u32,
    pub height: u32,
    pub color: Color,
    pub background: Color,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 100,
            color: [0.94, 0.94, 0.94, 1.0],
            background: [0.02, 0.02, 0.03, 1.0],
        }
    }
}

/// Render a sample buffer as a min/max envelope.
///
/// Each output column covers a window of `ceil(len / width)` consecutive
/// samples and draws one vertical segment from the window minimum to the
/// window maximum, so isolated transients survive decimation instead of
/// averaging away.
pub fn render_waveform(samples: &[f32], config: &WaveformConfig) -> Raster {
    let mut raster = Raster::new(config.width, config.height);
    raster.fill(config.background);

    if samples.is_empty() || config.width == 0 || config.height == 0 {
        return raster;
    }

    let width = config.width as usize;
    let step = samples.len().div_ceil(width).max(1);
    let amp = config.height as f32 / 2.0;

    for x in 0..width {
        let start = x * step;
        if start >= samples.len() {
            break;
        }
        let end = (start + step).min(samples.len());

        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for &sample in &samples[start..end] {
            min = min.min(sample);
            max = max.max(sample);
        }

        // +1 maps to the top row, -1 to the bottom.
        let y0 = ((1.0 - max.clamp(-1.0, 1.0)) * amp) as u32;
        let y1 = ((1.0 - min.clamp(-1.0, 1.0)) * amp) as u32;
        raster.vline(x as u32, y0, y1, config.color);
    }

    raster
}
