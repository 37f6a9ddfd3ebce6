use serde::{Deserialize, Serialize};

use crate::duration;
use crate::pitch::Note;
use crate::quantize::NoteSegment;
use crate::{Error, Result};

/// A transcribed melody as three parallel sequences plus timing scalars.
///
/// `notes`, `lengths` and `midi` always have the same length; `lengths`
/// sums to the number of analysed frames. Pause entries have `None` MIDI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub notes: Vec<Note>,
    pub lengths: Vec<usize>,
    pub midi: Vec<Option<f64>>,
    pub bpm: f64,
    pub target_duration_secs: f64,
    /// File name of the recording this melody was transcribed from.
    pub source_audio: String,
}

impl Melody {
    pub fn from_segments(
        segments: Vec<NoteSegment>,
        bpm: f64,
        target_duration_secs: f64,
        source_audio: impl Into<String>,
    ) -> Self {
        let mut notes = Vec::with_capacity(segments.len());
        let mut lengths = Vec::with_capacity(segments.len());
        let mut midi = Vec::with_capacity(segments.len());
        for seg in segments {
            notes.push(seg.note);
            lengths.push(seg.length_frames);
            midi.push(seg.midi);
        }
        Self {
            id: None,
            notes,
            lengths,
            midi,
            bpm,
            target_duration_secs,
            source_audio: source_audio.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn total_frames(&self) -> usize {
        self.lengths.iter().sum()
    }

    /// Number of non-pause entries.
    pub fn pitched_count(&self) -> usize {
        self.notes.iter().filter(|n| !n.is_pause()).count()
    }

    /// Beats per frame for this melody's tempo and target duration.
    pub fn beat_scale(&self) -> Result<f64> {
        duration::beat_scale(self.target_duration_secs, self.bpm, self.total_frames())
    }

    /// Duration of each entry in beats.
    pub fn durations(&self) -> Result<Vec<f64>> {
        duration::durations(&self.lengths, self.target_duration_secs, self.bpm)
    }

    /// Check that the parallel sequences line up.
    pub fn validate(&self) -> Result<()> {
        if self.lengths.len() != self.notes.len() || self.midi.len() != self.notes.len() {
            return Err(Error::MelodyShape {
                notes: self.notes.len(),
                lengths: self.lengths.len(),
                midi: self.midi.len(),
            });
        }
        Ok(())
    }
}

/// Result of transcribing one recording.
#[derive(Debug, Clone, PartialEq)]
pub enum Transcription {
    /// At least one segment carries a pitch.
    Melody(Melody),
    /// Every segment was a pause; nothing should be stored or rendered.
    Empty { segments: usize },
}

impl Transcription {
    pub fn into_melody(self) -> Option<Melody> {
        match self {
            Transcription::Melody(m) => Some(m),
            Transcription::Empty { .. } => None,
        }
    }
}
