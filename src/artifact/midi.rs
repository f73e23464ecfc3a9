// src/artifact/midi.rs
// Parse fetched MIDI bytes to a structured note list

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;

use super::ArtifactError;

/// Flushed duration for notes whose off event never arrives.
const DANGLING_NOTE_SECS: f64 = 0.1;

/// One reconstructed note, in real seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub start: f64,
    pub duration: f64,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoteTrack {
    pub notes: Vec<NoteEvent>,
}

/// Note events grouped per source track. All tracks share one time/pitch
/// coordinate space.
#[derive(Debug, Clone, Default)]
pub struct NoteSequence {
    pub tracks: Vec<NoteTrack>,
}

impl NoteSequence {
    pub fn is_empty(&self) -> bool {
        self.tracks.iter().all(|t| t.notes.is_empty())
    }

    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }

    pub fn all_notes(&self) -> impl Iterator<Item = &NoteEvent> {
        self.tracks.iter().flat_map(|t| t.notes.iter())
    }

    /// Lowest and highest pitch over all tracks.
    pub fn pitch_bounds(&self) -> Option<(u8, u8)> {
        let mut bounds: Option<(u8, u8)> = None;
        for note in self.all_notes() {
            bounds = Some(match bounds {
                None => (note.pitch, note.pitch),
                Some((lo, hi)) => (lo.min(note.pitch), hi.max(note.pitch)),
            });
        }
        bounds
    }

    /// End time of the latest note, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.all_notes().map(|n| n.end()).fold(0.0, f64::max)
    }
}

/// Parse a standard MIDI file into seconds-domain note events.
///
/// Tempo meta events from every track form one global tempo map, so delta
/// ticks convert to wall-clock seconds the same way regardless of which
/// track carries the tempo.
pub fn parse_notes(bytes: &[u8]) -> Result<NoteSequence, ArtifactError> {
    let smf = Smf::parse(bytes).map_err(|e| ArtifactError::MidiParse(e.to_string()))?;
    let tick_to_secs = build_clock(&smf);

    let mut tracks = Vec::with_capacity(smf.tracks.len());

    for track in &smf.tracks {
        let mut notes = Vec::new();
        // Stack per (channel, pitch): overlapping re-strikes pair LIFO.
        let mut active: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();
        let mut tick = 0u64;

        for event in track {
            tick = tick.saturating_add(u64::from(event.delta.as_int()));

            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();

            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    active
                        .entry((channel, key.as_int()))
                        .or_default()
                        .push((tick, vel.as_int()));
                }
                // A NoteOn with zero velocity is a NoteOff.
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    if let Some(starts) = active.get_mut(&(channel, key.as_int())) {
                        if let Some((start_tick, velocity)) = starts.pop() {
                            let start = tick_to_secs(start_tick);
                            let end = tick_to_secs(tick);
                            notes.push(NoteEvent {
                                pitch: key.as_int(),
                                start,
                                duration: (end - start).max(f64::EPSILON),
                                velocity,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        // Dangling notes get a nominal duration rather than vanishing.
        for ((_, pitch), starts) in active {
            for (start_tick, velocity) in starts {
                tracing::debug!("note {} has no off event; flushing", pitch);
                notes.push(NoteEvent {
                    pitch,
                    start: tick_to_secs(start_tick),
                    duration: DANGLING_NOTE_SECS,
                    velocity,
                });
            }
        }

        notes.sort_by(|a, b| {
            a.start
                .partial_cmp(&b.start)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.pitch.cmp(&b.pitch))
        });
        tracks.push(NoteTrack { notes });
    }

    let sequence = NoteSequence { tracks };
    tracing::info!(
        "parsed {} notes across {} tracks",
        sequence.note_count(),
        sequence.tracks.len()
    );
    Ok(sequence)
}

/// Build the tick -> seconds conversion for this file.
fn build_clock(smf: &Smf) -> Box<dyn Fn(u64) -> f64> {
    match smf.header.timing {
        Timing::Timecode(fps, subframe) => {
            let ticks_per_sec = f64::from(fps.as_f32()) * f64::from(subframe);
            Box::new(move |tick| tick as f64 / ticks_per_sec.max(1.0))
        }
        Timing::Metrical(ppq) => {
            let ppq = u64::from(ppq.as_int()).max(1);

            // Global tempo map: (absolute tick, microseconds per beat).
            let mut tempos: Vec<(u64, u32)> = Vec::new();
            for track in &smf.tracks {
                let mut tick = 0u64;
                for event in track {
                    tick = tick.saturating_add(u64::from(event.delta.as_int()));
                    if let TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) = event.kind {
                        tempos.push((tick, us_per_beat.as_int()));
                    }
                }
            }
            tempos.sort_by_key(|(tick, _)| *tick);

            Box::new(move |tick| {
                let mut total_us = 0u128;
                let mut prev_tick = 0u64;
                let mut current_tempo = 500_000u32; // 120 BPM default

                for (change_tick, tempo) in &tempos {
                    if *change_tick > tick {
                        break;
                    }
                    let span = change_tick.saturating_sub(prev_tick);
                    total_us += u128::from(span) * u128::from(current_tempo) / u128::from(ppq);
                    prev_tick = *change_tick;
                    current_tempo = *tempo;
                }

                let rem = tick.saturating_sub(prev_tick);
                total_us += u128::from(rem) * u128::from(current_tempo) / u128::from(ppq);
                total_us as f64 / 1_000_000.0
            })
        }
    }
}
