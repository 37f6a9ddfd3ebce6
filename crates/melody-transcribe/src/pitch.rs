use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Reference pitch: A4 = 440 Hz = MIDI 69.
const A4_HZ: f64 = 440.0;
const A4_MIDI: f64 = 69.0;

/// Substituted for a zero aggregated frequency so the log mapping stays defined.
///
/// The resulting note is far below octave 0 and is always rejected by
/// [`NoteName::from_midi`], so it ends up as a pause.
pub const ZERO_PITCH_HZ: f64 = 1e-6;

const SHARP_NAMES: [&str; 12] = ["C", "C♯", "D", "D♯", "E", "F", "F♯", "G", "G♯", "A", "A♯", "B"];

/// Text used for pause entries in stored melodies.
pub const PAUSE: &str = "P";

/// Pitch class 0–11 (C=0, C♯=1, ... B=11), cyclic under modulo 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchClass(u8);

impl PitchClass {
    /// Wraps any integer into 0–11.
    pub fn new(value: i32) -> Self {
        PitchClass(value.rem_euclid(12) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Transpose upward by `semitones`, wrapping at the octave.
    pub fn transpose(self, semitones: i32) -> Self {
        Self::new(self.0 as i32 + semitones)
    }

    /// Shortest distance around the pitch-class circle (0–6).
    pub fn circular_distance(self, other: PitchClass) -> u32 {
        let diff = (self.0 as i32 - other.0 as i32).unsigned_abs() % 12;
        diff.min(12 - diff)
    }

    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0..12).map(PitchClass)
    }

    pub fn name(self) -> &'static str {
        SHARP_NAMES[self.0 as usize]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('#', "♯");
        SHARP_NAMES
            .iter()
            .position(|name| *name == normalized)
            .map(|i| PitchClass(i as u8))
            .ok_or_else(|| Error::UnknownNoteName(s.to_string()))
    }
}

/// Pitch class plus single-digit octave, e.g. `F♯4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl NoteName {
    /// Nearest chromatic note to a fractional MIDI number.
    ///
    /// Returns `None` when the value is not finite or the octave falls
    /// outside 0–9, which is how degenerate and epsilon pitches surface.
    pub fn from_midi(midi: f64) -> Option<Self> {
        if !midi.is_finite() {
            return None;
        }
        let rounded = midi.round() as i64;
        let octave = rounded.div_euclid(12) - 1;
        if !(0..=9).contains(&octave) {
            return None;
        }
        Some(Self {
            pitch_class: PitchClass::new(rounded.rem_euclid(12) as i32),
            octave: octave as i32,
        })
    }

    pub fn midi(self) -> i32 {
        (self.octave + 1) * 12 + self.pitch_class.value() as i32
    }

    /// Same octave, different pitch class.
    pub fn with_pitch_class(self, pitch_class: PitchClass) -> Self {
        Self {
            pitch_class,
            octave: self.octave,
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for NoteName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit())
            .map(|(i, _)| i)
            .ok_or_else(|| Error::UnknownNoteName(s.to_string()))?;
        let (class, octave) = s.split_at(split);
        let octave: i32 = octave
            .parse()
            .map_err(|_| Error::UnknownNoteName(s.to_string()))?;
        if !(0..=9).contains(&octave) {
            return Err(Error::UnknownNoteName(s.to_string()));
        }
        Ok(Self {
            pitch_class: class
                .parse()
                .map_err(|_| Error::UnknownNoteName(s.to_string()))?,
            octave,
        })
    }
}

/// One melody entry: a named pitch or a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Note {
    Pause,
    Pitched(NoteName),
}

impl Note {
    pub fn is_pause(&self) -> bool {
        matches!(self, Note::Pause)
    }

    pub fn name(&self) -> Option<NoteName> {
        match self {
            Note::Pause => None,
            Note::Pitched(name) => Some(*name),
        }
    }

    pub fn pitch_class(&self) -> Option<PitchClass> {
        self.name().map(|n| n.pitch_class)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::Pause => f.write_str(PAUSE),
            Note::Pitched(name) => name.fmt(f),
        }
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

impl FromStr for Note {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == PAUSE {
            return Ok(Note::Pause);
        }
        s.parse().map(Note::Pitched)
    }
}

impl TryFrom<String> for Note {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fractional MIDI number for a frequency (A4 = 440 Hz = 69).
pub fn hz_to_midi(hz: f64) -> f64 {
    A4_MIDI + 12.0 * (hz / A4_HZ).log2()
}

/// Resolve an aggregated frequency to a note name and fractional MIDI number.
///
/// A zero frequency is replaced by [`ZERO_PITCH_HZ`] first; the name is
/// `None` whenever the result is not a recognised single-octave note.
pub fn resolve_frequency(hz: f64) -> (Option<NoteName>, f64) {
    let hz = if hz == 0.0 { ZERO_PITCH_HZ } else { hz };
    let midi = hz_to_midi(hz);
    (NoteName::from_midi(midi), midi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_midi_69() {
        assert!((hz_to_midi(440.0) - 69.0).abs() < 1e-9);
        let (name, midi) = resolve_frequency(440.0);
        assert_eq!(name.map(|n| n.to_string()), Some("A4".to_string()));
        assert!((midi - 69.0).abs() < 1e-9);
    }

    #[test]
    fn slightly_sharp_rounds_to_nearest() {
        // 270 Hz sits between C4 (261.6) and C♯4 (277.2), closer to C♯
        let (name, _) = resolve_frequency(270.0);
        assert_eq!(name.unwrap().to_string(), "C♯4");
    }

    #[test]
    fn zero_frequency_is_unrecognised() {
        let (name, midi) = resolve_frequency(0.0);
        assert!(name.is_none());
        assert!(midi < -200.0);
    }

    #[test]
    fn octave_outside_single_digit_rejected() {
        assert!(NoteName::from_midi(5.0).is_none()); // octave -1
        assert!(NoteName::from_midi(12.0).is_some()); // C0
        assert!(NoteName::from_midi(131.0).is_some()); // B9
        assert!(NoteName::from_midi(132.0).is_none()); // C10
        assert!(NoteName::from_midi(f64::NAN).is_none());
    }

    #[test]
    fn circular_distance_wraps() {
        let b = PitchClass::new(11);
        let c = PitchClass::new(0);
        assert_eq!(b.circular_distance(c), 1);
        assert_eq!(PitchClass::new(0).circular_distance(PitchClass::new(6)), 6);
        assert_eq!(PitchClass::new(2).circular_distance(PitchClass::new(9)), 5);
    }

    #[test]
    fn parse_accepts_ascii_sharp() {
        let name: NoteName = "F#3".parse().unwrap();
        assert_eq!(name.to_string(), "F♯3");
        assert_eq!(name.midi(), 54);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("H4".parse::<NoteName>().is_err());
        assert!("C".parse::<NoteName>().is_err());
        assert!("C-1".parse::<NoteName>().is_err());
    }

    #[test]
    fn note_serde_uses_text() {
        let notes = vec![Note::Pitched("D♯5".parse().unwrap()), Note::Pause];
        let json = serde_json::to_string(&notes).unwrap();
        assert_eq!(json, r#"["D♯5","P"]"#);
        let back: Vec<Note> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, notes);
    }

    #[test]
    fn with_pitch_class_keeps_octave() {
        let name: NoteName = "F♯2".parse().unwrap();
        let fixed = name.with_pitch_class(PitchClass::new(5));
        assert_eq!(fixed.to_string(), "F2");
        assert_eq!(fixed.midi(), 41);
    }
}
