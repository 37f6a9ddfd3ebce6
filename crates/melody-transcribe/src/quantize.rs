use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pitch::{resolve_frequency, Note};
use crate::segment::segments;

/// One inter-border interval with its aggregated pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSegment {
    pub length_frames: usize,
    pub note: Note,
    /// Fractional MIDI number; `None` for pauses.
    pub midi: Option<f64>,
}

impl NoteSegment {
    fn pause(length_frames: usize) -> Self {
        Self {
            length_frames,
            note: Note::Pause,
            midi: None,
        }
    }
}

/// Median with the two middle values averaged for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median of a voiced/silent run: voiced only with a strict majority.
///
/// An even split has median 0.5, which truncates to silent.
pub fn majority_voiced(states: &[bool]) -> bool {
    let voiced = states.iter().filter(|v| **v).count();
    voiced * 2 > states.len()
}

/// Aggregate pitch and voicing per segment and name each one.
///
/// A segment becomes a pause when most of its frames are silent, or when
/// its median frequency does not resolve to a recognised note name.
pub fn quantize_segments(borders: &[usize], states: &[bool], pitch_hz: &[f64]) -> Vec<NoteSegment> {
    segments(borders)
        .into_iter()
        .map(|(start, end)| {
            let length = end - start;

            if !majority_voiced(&states[start..end]) {
                return NoteSegment::pause(length);
            }

            let hz = median(&pitch_hz[start..end]).unwrap_or(0.0);
            match resolve_frequency(hz) {
                (Some(name), midi) => NoteSegment {
                    length_frames: length,
                    note: Note::Pitched(name),
                    midi: Some(midi),
                },
                (None, midi) => {
                    debug!(start, end, hz, midi, "unrecognised pitch name, treating as pause");
                    NoteSegment::pause(length)
                }
            }
        })
        .collect()
}
