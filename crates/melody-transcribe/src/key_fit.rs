//! Key fitting: snap off-key pitch classes into the best-matching diatonic scale.
//!
//! Candidates are the 12 major and 12 natural-minor scales, enumerated root
//! 0–11 with major before minor. The candidates sharing the largest overlap
//! with the melody's pitch classes are kept; for each, every out-of-scale
//! pitch class is mapped to its circularly nearest scale tone, and the
//! substitution distances weighted by occurrence count give the loss. The
//! lowest-loss candidate wins, earliest on ties.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

use crate::melody::Melody;
use crate::pitch::{Note, PitchClass};

const MAJOR_STEPS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_STEPS: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    Major,
    Minor,
}

impl ScaleMode {
    /// Enumeration order used for candidate generation.
    pub const ALL: [ScaleMode; 2] = [ScaleMode::Major, ScaleMode::Minor];

    pub fn steps(self) -> [i32; 7] {
        match self {
            ScaleMode::Major => MAJOR_STEPS,
            ScaleMode::Minor => MINOR_STEPS,
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleMode::Major => write!(f, "major"),
            ScaleMode::Minor => write!(f, "minor"),
        }
    }
}

/// A diatonic scale: an interval pattern transposed to a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    pub root: PitchClass,
    pub mode: ScaleMode,
}

impl Scale {
    /// Member pitch classes in ascending order.
    pub fn pitch_classes(&self) -> BTreeSet<PitchClass> {
        self.mode
            .steps()
            .iter()
            .map(|&step| self.root.transpose(step))
            .collect()
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.pitch_classes().contains(&pc)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root, self.mode)
    }
}

/// Which roots are tried when generating candidate scales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRoots {
    /// All twelve roots (24 candidates).
    #[default]
    All,
    /// Only roots that occur among the melody's own pitch classes.
    Present,
}

/// Outcome of one key-fitting pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyFit {
    /// Chosen scale, `None` when the melody had no pitched notes.
    pub scale: Option<Scale>,
    /// How many of the melody's distinct pitch classes the scale contains.
    pub intersection: usize,
    /// Occurrence-weighted semitone distance of all substitutions.
    pub loss: u32,
    /// Wrong pitch class -> replacement.
    pub substitutions: BTreeMap<PitchClass, PitchClass>,
}

impl KeyFit {
    pub fn is_noop(&self) -> bool {
        self.substitutions.is_empty()
    }
}

/// Candidate scales in enumeration order: root ascending, major then minor.
pub fn candidate_scales(roots: CandidateRoots, present: &BTreeSet<PitchClass>) -> Vec<Scale> {
    PitchClass::all()
        .filter(|root| roots == CandidateRoots::All || present.contains(root))
        .flat_map(|root| ScaleMode::ALL.into_iter().map(move |mode| Scale { root, mode }))
        .collect()
}

/// Pitch class -> number of pitched notes carrying it.
pub fn pitch_class_counts(notes: &[Note]) -> BTreeMap<PitchClass, u32> {
    let mut counts = BTreeMap::new();
    for pc in notes.iter().filter_map(Note::pitch_class) {
        *counts.entry(pc).or_insert(0) += 1;
    }
    counts
}

/// Map every out-of-scale pitch class to its nearest scale tone.
///
/// Ties go to the first scale tone in ascending order. Returns the map and
/// its occurrence-weighted loss.
pub fn substitution_plan(
    scale: &Scale,
    counts: &BTreeMap<PitchClass, u32>,
) -> (BTreeMap<PitchClass, PitchClass>, u32) {
    let members = scale.pitch_classes();
    let mut plan = BTreeMap::new();
    let mut loss = 0;

    for (&wrong, &count) in counts.iter().filter(|(pc, _)| !members.contains(*pc)) {
        let mut best: Option<(PitchClass, u32)> = None;
        for &candidate in &members {
            let distance = candidate.circular_distance(wrong);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }
        if let Some((replacement, distance)) = best {
            plan.insert(wrong, replacement);
            loss += distance * count;
        }
    }

    (plan, loss)
}

/// Choose a scale and substitution map without touching the melody.
pub fn plan_key_fit(melody: &Melody, roots: CandidateRoots) -> KeyFit {
    let counts = pitch_class_counts(&melody.notes);
    if counts.is_empty() {
        return KeyFit::default();
    }
    let present: BTreeSet<PitchClass> = counts.keys().copied().collect();

    let scored: Vec<(Scale, usize)> = candidate_scales(roots, &present)
        .into_iter()
        .map(|scale| {
            let members = scale.pitch_classes();
            (scale, present.intersection(&members).count())
        })
        .collect();

    let Some(max_intersection) = scored.iter().map(|(_, score)| *score).max() else {
        return KeyFit::default();
    };

    let mut best: Option<KeyFit> = None;
    for (scale, _) in scored.iter().filter(|(_, score)| *score == max_intersection) {
        let (substitutions, loss) = substitution_plan(scale, &counts);
        debug!(%scale, loss, "candidate scale");
        if best.as_ref().map_or(true, |b| loss < b.loss) {
            best = Some(KeyFit {
                scale: Some(*scale),
                intersection: max_intersection,
                loss,
                substitutions,
            });
        }
    }

    best.unwrap_or_default()
}

/// Rewrite the melody's notes and MIDI numbers according to `fit`.
///
/// Octaves are preserved; pauses and pitch classes outside the map are
/// left untouched.
pub fn apply_key_fit(melody: &mut Melody, fit: &KeyFit) {
    for (note, midi) in melody.notes.iter_mut().zip(melody.midi.iter_mut()) {
        let Note::Pitched(name) = *note else {
            continue;
        };
        if let Some(&replacement) = fit.substitutions.get(&name.pitch_class) {
            let fixed = name.with_pitch_class(replacement);
            *note = Note::Pitched(fixed);
            *midi = Some(fixed.midi() as f64);
        }
    }
}

/// Fit the melody into its best-matching key in place.
pub fn fit_key(melody: &mut Melody, roots: CandidateRoots) -> KeyFit {
    let fit = plan_key_fit(melody, roots);
    match fit.scale {
        Some(scale) => info!(
            %scale,
            intersection = fit.intersection,
            loss = fit.loss,
            substitutions = fit.substitutions.len(),
            "fitted melody to key"
        ),
        None => debug!("no pitched notes, key fitting skipped"),
    }
    apply_key_fit(melody, &fit);
    fit
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pc(v: i32) -> PitchClass {
        PitchClass::new(v)
    }

    fn melody(notes: &[&str]) -> Melody {
        let notes: Vec<Note> = notes
            .iter()
            .map(|s| Note::try_from(s.to_string()).unwrap())
            .collect();
        let midi = notes
            .iter()
            .map(|n| n.name().map(|name| name.midi() as f64 + 0.2))
            .collect();
        Melody {
            id: None,
            lengths: vec![4; notes.len()],
            notes,
            midi,
            bpm: 120.0,
            target_duration_secs: 10.0,
            source_audio: "test.wav".into(),
        }
    }

    fn names(melody: &Melody) -> Vec<String> {
        melody.notes.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn twenty_four_candidates_in_order() {
        let all = candidate_scales(CandidateRoots::All, &BTreeSet::new());
        assert_eq!(all.len(), 24);
        assert_eq!(all[0].to_string(), "C major");
        assert_eq!(all[1].to_string(), "C minor");
        assert_eq!(all[23].to_string(), "B minor");
    }

    #[test]
    fn scale_members() {
        let a_minor = Scale {
            root: pc(9),
            mode: ScaleMode::Minor,
        };
        let members: Vec<u8> = a_minor.pitch_classes().iter().map(|p| p.value()).collect();
        assert_eq!(members, vec![0, 2, 4, 5, 7, 9, 11]);
    }

    #[test]
    fn c_major_scores_two_for_c_d_f_sharp() {
        let m = melody(&["C4", "D4", "F♯4"]);
        let counts = pitch_class_counts(&m.notes);
        let c_major = Scale {
            root: pc(0),
            mode: ScaleMode::Major,
        };
        let present: BTreeSet<_> = counts.keys().copied().collect();
        assert_eq!(present.intersection(&c_major.pitch_classes()).count(), 2);

        // F♯ is one semitone from both F and G; F comes first
        let (plan, loss) = substitution_plan(&c_major, &counts);
        assert_eq!(plan, BTreeMap::from([(pc(6), pc(5))]));
        assert_eq!(loss, 1);
    }

    #[test]
    fn c_d_f_sharp_fits_e_minor_without_changes() {
        let mut m = melody(&["C4", "D4", "F♯4"]);
        let before = m.clone();
        let fit = fit_key(&mut m, CandidateRoots::All);
        // E minor (root 4) is the first scale containing all three
        assert_eq!(fit.scale.unwrap().to_string(), "E minor");
        assert_eq!(fit.intersection, 3);
        assert_eq!(fit.loss, 0);
        assert_eq!(m, before);
    }

    #[test]
    fn present_roots_tie_at_two() {
        let mut m = melody(&["C4", "D4", "F♯4"]);
        let fit = fit_key(&mut m, CandidateRoots::Present);
        assert_eq!(fit.intersection, 2);
        // C major is the first max-intersection candidate with loss 1
        assert_eq!(fit.scale.unwrap().to_string(), "C major");
        assert_eq!(fit.loss, 1);
        assert_eq!(names(&m), vec!["C4", "D4", "F4"]);
        assert_eq!(m.midi[2], Some(65.0));
    }

    #[test]
    fn loss_weights_by_occurrence() {
        let mut m = melody(&["C4", "C♯4", "C♯4", "C♯4", "D♯4", "E4", "F4", "G4", "A4", "B4"]);
        let counts = pitch_class_counts(&m.notes);
        let fit = fit_key(&mut m, CandidateRoots::All);
        let scale = fit.scale.unwrap();

        assert!(fit.substitutions.keys().all(|k| !scale.contains(*k)));
        let expected: u32 = fit
            .substitutions
            .iter()
            .map(|(wrong, right)| wrong.circular_distance(*right) * counts[wrong])
            .sum();
        assert_eq!(fit.loss, expected);
    }

    #[test]
    fn octave_preserved_and_pauses_untouched() {
        let mut m = melody(&["C3", "P", "D3", "E3", "F3", "G3", "A3", "A♯5"]);
        let fit = fit_key(&mut m, CandidateRoots::All);
        assert!(fit.substitutions.values().all(|v| fit.scale.unwrap().contains(*v)));
        assert_eq!(m.notes[1], Note::Pause);
        assert_eq!(m.midi[1], None);
        for note in m.notes.iter().filter_map(Note::name) {
            assert!(fit.scale.unwrap().contains(note.pitch_class));
        }
        let last = m.notes[7].name().unwrap();
        assert_eq!(last.octave, 5);
    }

    #[test]
    fn unchanged_notes_keep_fractional_midi() {
        let mut m = melody(&["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C♯4"]);
        fit_key(&mut m, CandidateRoots::All);
        assert_eq!(m.midi[0], Some(60.0 + 0.2));
        assert_eq!(m.notes[7].to_string(), "C4");
        assert_eq!(m.midi[7], Some(60.0));
    }

    #[test]
    fn all_pause_is_noop() {
        let mut m = melody(&["P", "P"]);
        let before = m.clone();
        let fit = fit_key(&mut m, CandidateRoots::All);
        assert_eq!(fit, KeyFit::default());
        assert_eq!(m, before);
    }

    #[test]
    fn second_pass_is_identity() {
        let mut m = melody(&["C4", "D♯4", "E4", "F♯4", "G4", "A4", "B4", "P"]);
        fit_key(&mut m, CandidateRoots::All);
        let once = m.clone();
        let second = fit_key(&mut m, CandidateRoots::All);
        assert_eq!(second.loss, 0);
        assert!(second.is_noop());
        assert_eq!(m, once);
    }
}
