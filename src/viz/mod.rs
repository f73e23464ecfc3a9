//! Decimation renderers: pure functions from decoded artifact data to 2-D
//! rasters. No state, no I/O; every redraw recomputes from scratch, so
//! resizing is just rendering again at the new dimensions.

pub mod piano_roll;
pub mod waveform;

pub use piano_roll::{render_piano_roll, PianoRollConfig};
pub use waveform::{render_waveform, WaveformConfig};

/// RGBA color with components in [0, 1], matching the f32 color convention
/// of the rest of the rendering stack.
pub type Color = [f32; 4];

/// CPU raster surface, RGBA8 row-major.
#[derive(Debug, Clone)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixel data, row-major, ready to blit.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    pub fn fill(&mut self, color: Color) {
        let rgba = to_rgba8(color);
        for pixel in self.pixels.chunks_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    /// Vertical segment, inclusive of both endpoints. Out-of-range rows are
    /// clipped.
    pub fn vline(&mut self, x: u32, y0: u32, y1: u32, color: Color) {
        if x >= self.width {
            return;
        }
        let rgba = to_rgba8(color);
        let (top, bottom) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        let bottom = bottom.min(self.height.saturating_sub(1));
        for y in top..=bottom {
            self.put(x, y, rgba);
        }
    }

    /// Filled rectangle with the corner pixels knocked off once it is large
    /// enough to show them.
    pub fn fill_rounded_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Color) {
        let rgba = to_rgba8(color);
        let round = w >= 3 && h >= 3;
        let x1 = (x + w).min(self.width);
        let y1 = (y + h).min(self.height);

        for row in y..y1 {
            for col in x..x1 {
                if round
                    && (row == y || row == y1 - 1)
                    && (col == x || col == x1 - 1)
                {
                    continue;
                }
                self.put(col, row, rgba);
            }
        }
    }

    fn put(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[idx..idx + 4].copy_from_slice(&rgba);
    }
}

fn to_rgba8(color: Color) -> [u8; 4] {
    [
        (color[0].clamp(0.0, 1.0) * 255.0) as u8,
        (color[1].clamp(0.0, 1.0) * 255.0) as u8,
        (color[2].clamp(0.0, 1.0) * 255.0) as u8,
        (color[3].clamp(0.0, 1.0) * 255.0) as u8,
    ]
}
