// src/viz/piano_roll.rs
// Piano-roll rendering of a parsed note sequence

use crate::artifact::NoteSequence;

use super::{Color, Raster};

/// Rows of headroom above the highest and below the lowest pitch, so notes
/// at the extremes do not hug the raster edges.
const PITCH_PAD: i32 = 2;

/// Notes narrower than this stay visible regardless of zoom.
const MIN_NOTE_WIDTH_PX: u32 = 2;

/// Appearance and dimensions of a piano-roll render.
#[derive(Debug, Clone)]
pub struct PianoRollConfig {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    /// Cycled per source track.
    pub track_colors: Vec<Color>,
}

impl Default for PianoRollConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 200,
            background: [0.02, 0.02, 0.03, 1.0],
            track_colors: vec![
                [0.18, 0.80, 0.44, 1.0], // green
                [0.20, 0.60, 0.86, 1.0], // blue
                [0.95, 0.61, 0.07, 1.0], // orange
                [0.91, 0.30, 0.24, 1.0], // red
            ],
        }
    }
}

/// Render a note sequence as a pitch/time grid. Time maps to the x axis
/// normalized to the sequence's total duration, pitch to the y axis with
/// higher pitches toward the top. Each track cycles through the configured
/// palette.
pub fn render_piano_roll(sequence: &NoteSequence, config: &PianoRollConfig) -> Raster {
    let mut raster = Raster::new(config.width, config.height);
    raster.fill(config.background);

    if config.width == 0 || config.height == 0 || config.track_colors.is_empty() {
        return raster;
    }
    let Some((lo, hi)) = sequence.pitch_bounds() else {
        return raster;
    };
    let total = sequence.total_duration();
    if total <= 0.0 {
        return raster;
    }

    let min_pitch = i32::from(lo) - PITCH_PAD;
    let range = (i32::from(hi) + PITCH_PAD - min_pitch) as f64;
    let width = f64::from(config.width);
    let height = f64::from(config.height);
    let row_height = height / range;

    for (index, track) in sequence.tracks.iter().enumerate() {
        let color = config.track_colors[index % config.track_colors.len()];

        for note in &track.notes {
            let x = note.start / total * width;
            let w = (note.duration / total * width).max(f64::from(MIN_NOTE_WIDTH_PX));
            let y_bottom = height - (f64::from(i32::from(note.pitch) - min_pitch)) / range * height;

            let w_px = (w.round() as u32).max(MIN_NOTE_WIDTH_PX).min(config.width);
            let mut x_px = x.floor() as u32;
            // Keep the minimum width at the right edge by shifting left.
            if x_px + w_px > config.width {
                x_px = config.width - w_px;
            }

            let h_px = ((row_height - 1.0).max(1.0).round() as u32).min(config.height);
            let y_px = ((y_bottom - row_height).round().max(0.0) as u32)
                .min(config.height.saturating_sub(h_px));

            raster.fill_rounded_rect(x_px, y_px, w_px, h_px, color);
        }
    }

    raster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{NoteEvent, NoteTrack};

    fn note(pitch: u8, start: f64, duration: f64) -> NoteEvent {
        NoteEvent {
            pitch,
            start,
            duration,
            velocity: 100,
        }
    }

    fn sequence(tracks: Vec<Vec<NoteEvent>>) -> NoteSequence {
        NoteSequence {
            tracks: tracks
                .into_iter()
                .map(|notes| NoteTrack { notes })
                .collect(),
        }
    }

    fn config() -> PianoRollConfig {
        PianoRollConfig {
            width: 120,
            height: 80,
            background: [0.0, 0.0, 0.0, 0.0],
            ..PianoRollConfig::default()
        }
    }

    fn drawn_pixels(raster: &Raster) -> Vec<(u32, u32, [u8; 4])> {
        let mut out = Vec::new();
        for y in 0..raster.height() {
            for x in 0..raster.width() {
                let px = raster.pixel(x, y);
                if px[3] != 0 {
                    out.push((x, y, px));
                }
            }
        }
        out
    }

    #[test]
    fn empty_sequence_renders_background_only() {
        let raster = render_piano_roll(&NoteSequence::default(), &config());
        assert!(drawn_pixels(&raster).is_empty());
    }

    #[test]
    fn zero_duration_sequence_renders_nothing() {
        let seq = sequence(vec![vec![note(60, 0.0, 0.0)]]);
        let raster = render_piano_roll(&seq, &config());
        assert!(drawn_pixels(&raster).is_empty());
    }

    #[test]
    fn single_note_spans_the_full_width() {
        let seq = sequence(vec![vec![note(60, 0.0, 4.0)]]);
        let cfg = config();
        let raster = render_piano_roll(&seq, &cfg);

        let drawn = drawn_pixels(&raster);
        assert!(!drawn.is_empty());
        let min_x = drawn.iter().map(|&(x, _, _)| x).min().unwrap();
        let max_x = drawn.iter().map(|&(x, _, _)| x).max().unwrap();
        assert_eq!(min_x, 0);
        assert_eq!(max_x, cfg.width - 1);
    }

    #[test]
    fn higher_pitches_draw_closer_to_the_top() {
        let seq = sequence(vec![vec![note(40, 0.0, 1.0), note(80, 1.0, 1.0)]]);
        let raster = render_piano_roll(&seq, &config());

        let drawn = drawn_pixels(&raster);
        // Low pitch occupies the left half, high pitch the right half.
        let low_rows: Vec<u32> = drawn
            .iter()
            .filter(|&&(x, _, _)| x < 60)
            .map(|&(_, y, _)| y)
            .collect();
        let high_rows: Vec<u32> = drawn
            .iter()
            .filter(|&&(x, _, _)| x >= 60)
            .map(|&(_, y, _)| y)
            .collect();
        assert!(!low_rows.is_empty() && !high_rows.is_empty());
        assert!(high_rows.iter().max() < low_rows.iter().min());
    }

    #[test]
    fn short_notes_keep_a_visible_minimum_width() {
        // 1 ms note inside a 10 s sequence rounds to zero columns naively.
        let seq = sequence(vec![vec![note(60, 0.0, 0.001), note(60, 9.0, 1.0)]]);
        let raster = render_piano_roll(&seq, &config());

        let drawn = drawn_pixels(&raster);
        let columns: std::collections::BTreeSet<u32> = drawn
            .iter()
            .filter(|&&(x, _, _)| x < 10)
            .map(|&(x, _, _)| x)
            .collect();
        assert!(columns.len() >= MIN_NOTE_WIDTH_PX as usize);
    }

    #[test]
    fn tracks_cycle_through_the_palette() {
        let seq = sequence(vec![
            vec![note(50, 0.0, 1.0)],
            vec![note(70, 1.0, 1.0)],
        ]);
        let raster = render_piano_roll(&seq, &config());

        let colors: std::collections::BTreeSet<[u8; 4]> = drawn_pixels(&raster)
            .into_iter()
            .map(|(_, _, px)| px)
            .collect();
        assert_eq!(colors.len(), 2);
    }

    #[test]
    fn all_notes_stay_inside_the_raster() {
        // Extreme pitches and a note ending exactly at the total duration.
        let seq = sequence(vec![vec![
            note(0, 0.0, 0.5),
            note(127, 0.25, 0.5),
            note(64, 0.7, 0.3),
        ]]);
        let cfg = config();
        let raster = render_piano_roll(&seq, &cfg);

        // Pitch padding keeps the extremes off the exact edges.
        let drawn = drawn_pixels(&raster);
        assert!(!drawn.is_empty());
        let min_y = drawn.iter().map(|&(_, y, _)| y).min().unwrap();
        let max_y = drawn.iter().map(|&(_, y, _)| y).max().unwrap();
        assert!(min_y > 0);
        assert!(max_y < cfg.height - 1);
    }
}
