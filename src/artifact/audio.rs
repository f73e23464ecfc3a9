// src/artifact/audio.rs
// Decode fetched audio bytes to floating-point samples

use std::io::Cursor;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::ArtifactError;

/// Decoded audio snapshot: the first channel of the artifact, in [-1, 1].
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode a fetched artifact to its first channel. The container format is
/// probed from the bytes, with the URL extension as a hint.
pub fn decode_samples(
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<SampleBuffer, ArtifactError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ArtifactError::Decode(e.to_string()))?;

    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(ArtifactError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ArtifactError::Decode(e.to_string()))?;

    let mut samples = Vec::new();

    loop {
        match format_reader.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }

                match decoder.decode(&packet) {
                    Ok(decoded) => extend_first_channel(&decoded, &mut samples),
                    Err(symphonia::core::errors::Error::DecodeError(e)) => {
                        // Corrupt packets are skipped, not fatal.
                        tracing::warn!("skipping undecodable packet: {}", e);
                        continue;
                    }
                    Err(e) => return Err(ArtifactError::Decode(e.to_string())),
                }
            }
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(ArtifactError::Decode(e.to_string())),
        }
    }

    tracing::info!(
        "decoded {} samples at {} Hz",
        samples.len(),
        sample_rate
    );

    Ok(SampleBuffer {
        samples,
        sample_rate,
    })
}

fn extend_first_channel(buffer: &AudioBufferRef, out: &mut Vec<f32>) {
    macro_rules! take_chan0 {
        ($buf:expr, $convert:expr) => {{
            let buf = $buf;
            if buf.spec().channels.count() > 0 {
                out.extend(buf.chan(0).iter().map($convert));
            }
        }};
    }

    match buffer {
        AudioBufferRef::F32(buf) => take_chan0!(buf, |&s| s),
        AudioBufferRef::F64(buf) => take_chan0!(buf, |&s| s as f32),
        AudioBufferRef::S8(buf) => take_chan0!(buf, |&s| s as f32 / 128.0),
        AudioBufferRef::S16(buf) => take_chan0!(buf, |&s| s as f32 / 32768.0),
        AudioBufferRef::S24(buf) => take_chan0!(buf, |s| s.0 as f32 / 8388608.0),
        AudioBufferRef::S32(buf) => take_chan0!(buf, |&s| s as f32 / 2147483648.0),
        AudioBufferRef::U8(buf) => take_chan0!(buf, |&s| (s as f32 - 128.0) / 128.0),
        AudioBufferRef::U16(buf) => take_chan0!(buf, |&s| (s as f32 - 32768.0) / 32768.0),
        AudioBufferRef::U24(buf) => take_chan0!(buf, |s| (s.0 as f32 - 8388608.0) / 8388608.0),
        AudioBufferRef::U32(buf) => {
            take_chan0!(buf, |&s| (s as f64 - 2147483648.0) as f32 / 2147483648.0)
        }
    }
}
