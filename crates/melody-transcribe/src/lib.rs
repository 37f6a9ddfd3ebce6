//! Monophonic melody transcription.
//!
//! Consumes frame-level features from an upstream DSP layer and produces a
//! [`Melody`]: voiced/silent decoding, segment borders, per-segment pitch
//! naming, and optional key fitting.
//!
//! ```text
//! FeatureSet → decode_voicing → segment_borders → quantize_segments → Melody → fit_key
//! ```

pub mod duration;
pub mod frames;
pub mod key_fit;
pub mod melody;
pub mod pitch;
pub mod quantize;
pub mod segment;
pub mod voicing;

pub use frames::{FeatureSet, FrameFeatures};
pub use key_fit::{fit_key, CandidateRoots, KeyFit, Scale, ScaleMode};
pub use melody::{Melody, Transcription};
pub use pitch::{Note, NoteName, PitchClass};
pub use quantize::NoteSegment;
pub use voicing::VoicingParams;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Errors from transcription.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("degenerate segmentation: no analysed frames")]
    DegenerateSegmentation,

    #[error("invalid tempo: {bpm} bpm")]
    InvalidTempo { bpm: f64 },

    #[error("frame arrays differ in length: expected {expected}, got {actual}")]
    FrameCount { expected: usize, actual: usize },

    #[error("melody sequences differ in length: {notes} notes, {lengths} lengths, {midi} midi")]
    MelodyShape {
        notes: usize,
        lengths: usize,
        midi: usize,
    },

    #[error("unknown note name: {0:?}")]
    UnknownNoteName(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Tunables for one transcription run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranscribeOptions {
    pub voicing: VoicingParams,
    /// Length the melody is stretched to when rendered.
    pub target_duration_secs: f64,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            voicing: VoicingParams::default(),
            target_duration_secs: 10.0,
        }
    }
}

/// Transcribe a recording's feature set.
pub fn transcribe(features: &FeatureSet, options: &TranscribeOptions) -> Result<Transcription> {
    debug!(
        source = %features.source_audio,
        frames = features.frame_count(),
        recording_secs = ?features.frame_seconds().map(|s| s * features.frame_count() as f64),
        "transcribing feature set"
    );
    transcribe_frames(
        &features.onset_frames(),
        &features.rms(),
        &features.pitch_hz(),
        features.bpm,
        &features.source_audio,
        options,
    )
}

/// Transcribe from raw frame-synchronous arrays.
///
/// `rms` and `pitch_hz` must have one entry per frame; `onsets` are frame
/// indices in ascending order.
pub fn transcribe_frames(
    onsets: &[usize],
    rms: &[f64],
    pitch_hz: &[f64],
    bpm: f64,
    source_audio: &str,
    options: &TranscribeOptions,
) -> Result<Transcription> {
    if pitch_hz.len() != rms.len() {
        return Err(Error::FrameCount {
            expected: rms.len(),
            actual: pitch_hz.len(),
        });
    }
    // Fails on zero frames or a meaningless tempo before any work is done.
    duration::beat_scale(options.target_duration_secs, bpm, rms.len())?;

    let states = voicing::decode_voicing(rms, &options.voicing);
    let borders = segment::segment_borders(onsets, &states);
    let segments = quantize::quantize_segments(&borders, &states, pitch_hz);

    let pitched = segments.iter().filter(|s| !s.note.is_pause()).count();
    if pitched == 0 {
        info!(source = source_audio, segments = segments.len(), "no pitched content");
        return Ok(Transcription::Empty {
            segments: segments.len(),
        });
    }

    let melody = Melody::from_segments(segments, bpm, options.target_duration_secs, source_audio);
    debug_assert_eq!(melody.total_frames(), rms.len());
    debug!(notes = melody.len(), pitched, "segments quantized");
    info!(
        source = source_audio,
        notes = melody.len(),
        pitched,
        bpm,
        "transcribed melody"
    );
    Ok(Transcription::Melody(melody))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> TranscribeOptions {
        TranscribeOptions {
            voicing: VoicingParams {
                silence_bias: 0.15,
                ..VoicingParams::default()
            },
            target_duration_secs: 10.0,
        }
    }

    fn frame(onset: bool, rms: f64, pitch_hz: f64) -> FrameFeatures {
        FrameFeatures {
            onset,
            rms,
            pitch_hz,
            magnitude: 1.0,
        }
    }

    fn two_notes_and_rest() -> FeatureSet {
        let mut frames = Vec::new();
        frames.push(frame(true, 0.3, 261.6));
        frames.extend((0..9).map(|_| frame(false, 0.3, 261.6)));
        frames.push(frame(true, 0.3, 392.0));
        frames.extend((0..9).map(|_| frame(false, 0.3, 392.0)));
        frames.extend((0..10).map(|_| frame(false, 0.0, 0.0)));
        FeatureSet {
            source_audio: "melody_7.wav".into(),
            bpm: 120.0,
            sample_rate: None,
            hop_length: None,
            frames,
        }
    }

    #[test]
    fn transcribes_notes_and_pause() {
        let melody = transcribe(&two_notes_and_rest(), &options())
            .unwrap()
            .into_melody()
            .unwrap();

        let notes: Vec<String> = melody.notes.iter().map(|n| n.to_string()).collect();
        assert_eq!(notes, vec!["C4", "G4", "P"]);
        assert_eq!(melody.lengths, vec![10, 10, 10]);
        assert_eq!(melody.total_frames(), 30);
        assert_eq!(melody.midi[2], None);
        assert_eq!(melody.source_audio, "melody_7.wav");
    }

    #[test]
    fn all_silent_is_empty() {
        let features = FeatureSet {
            source_audio: "quiet.wav".into(),
            bpm: 100.0,
            sample_rate: None,
            hop_length: None,
            frames: vec![frame(false, 0.3, 0.0); 12],
        };
        let result = transcribe(&features, &options()).unwrap();
        assert_eq!(result, Transcription::Empty { segments: 1 });
    }

    #[test]
    fn zero_frames_is_degenerate() {
        let features = FeatureSet {
            source_audio: "none.wav".into(),
            bpm: 100.0,
            sample_rate: None,
            hop_length: None,
            frames: Vec::new(),
        };
        assert!(matches!(
            transcribe(&features, &options()),
            Err(Error::DegenerateSegmentation)
        ));
    }

    #[test]
    fn mismatched_arrays_rejected() {
        let err = transcribe_frames(&[], &[0.1, 0.2], &[440.0], 120.0, "x.wav", &options());
        assert!(matches!(err, Err(Error::FrameCount { expected: 2, actual: 1 })));
    }
}
