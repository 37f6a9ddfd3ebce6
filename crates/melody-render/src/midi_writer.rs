use melody_transcribe::Melody;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// Highest value a MIDI data byte can carry.
const MAX_DATA_BYTE: u8 = 0x7F;
const MAX_MIDI_NOTE: f64 = MAX_DATA_BYTE as f64;

/// Metrical division is 15 bits; the top bit selects SMPTE timing.
const MAX_TICKS_PER_BEAT: u16 = 0x7FFF;

/// The tempo meta event stores microseconds per beat in 24 bits.
const MAX_TEMPO_USEC: f64 = 0xFF_FFFF as f64;

/// Options for melody export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiOptions {
    /// General MIDI program set at time 0. Default: 0 (acoustic grand).
    pub program: u8,
    /// Note-on velocity. Default: 100.
    pub velocity: u8,
    /// Ticks per quarter note. Default: 960.
    pub ticks_per_beat: u16,
    /// Notes shorter than this many beats are dropped. Default: 1/16.
    pub min_note_beats: f64,
}

impl Default for MidiOptions {
    fn default() -> Self {
        Self {
            program: 0,
            velocity: 100,
            ticks_per_beat: 960,
            min_note_beats: 1.0 / 16.0,
        }
    }
}

/// A note that survived the range and duration checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub start_beats: f64,
    pub duration_beats: f64,
    pub pitch: u8,
}

/// What happened to each melody entry during export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderReport {
    pub emitted: usize,
    pub pauses: usize,
    pub dropped_too_short: usize,
    pub dropped_out_of_range: usize,
}

/// Walk the melody and collect the notes worth emitting.
///
/// The time cursor advances by every entry's duration, pause or not.
/// Entries shorter than `min_note_beats`, or whose rounded MIDI number is
/// not a valid note number, are dropped without error.
pub fn note_events(melody: &Melody, options: &MidiOptions) -> Result<(Vec<NoteEvent>, RenderReport)> {
    melody.validate()?;
    let durations = melody.durations()?;

    let mut events = Vec::new();
    let mut report = RenderReport::default();
    let mut cursor = 0.0;

    for (i, ((&duration, &midi), note)) in durations
        .iter()
        .zip(&melody.midi)
        .zip(&melody.notes)
        .enumerate()
    {
        let start = cursor;
        cursor += duration;

        let Some(midi) = midi.filter(|_| !note.is_pause()) else {
            report.pauses += 1;
            continue;
        };

        if duration < options.min_note_beats {
            debug!(index = i, duration, "dropping note below minimum length");
            report.dropped_too_short += 1;
            continue;
        }

        let pitch = midi.round();
        if !(0.0..=MAX_MIDI_NOTE).contains(&pitch) {
            debug!(index = i, midi, "dropping note outside MIDI range");
            report.dropped_out_of_range += 1;
            continue;
        }

        events.push(NoteEvent {
            start_beats: start,
            duration_beats: duration,
            pitch: pitch as u8,
        });
        report.emitted += 1;
    }

    Ok((events, report))
}

/// Write a melody to Standard MIDI File format 0 bytes.
///
/// One track on channel 0: tempo and program change at tick 0, then a
/// note-on/note-off pair per emitted note.
pub fn melody_to_midi(melody: &Melody, options: &MidiOptions) -> Result<(Vec<u8>, RenderReport)> {
    let (notes, report) = note_events(melody, options)?;
    let track = build_track(melody.bpm, &notes, options);
    debug!(
        emitted = report.emitted,
        too_short = report.dropped_too_short,
        out_of_range = report.dropped_out_of_range,
        bytes = track.len(),
        "built melody track"
    );
    Ok((build_midi_file(division(options), &track), report))
}

fn tempo_usec(bpm: f64) -> u32 {
    (60_000_000.0 / bpm).round().clamp(1.0, MAX_TEMPO_USEC) as u32
}

fn build_track(bpm: f64, notes: &[NoteEvent], options: &MidiOptions) -> Vec<u8> {
    let channel = 0u8;
    let ppq = division(options) as f64;
    let mut events: Vec<(u64, Vec<u8>)> = Vec::new();

    let usec = tempo_usec(bpm);
    events.push((
        0,
        vec![
            0xFF,
            0x51,
            0x03,
            (usec >> 16) as u8,
            (usec >> 8) as u8,
            usec as u8,
        ],
    ));
    events.push((0, vec![0xC0 | channel, options.program.min(MAX_DATA_BYTE)]));
    // Velocity 0 would read as a note-off
    let velocity = options.velocity.clamp(1, MAX_DATA_BYTE);

    for note in notes {
        let onset = (note.start_beats * ppq).round() as u64;
        let offset = ((note.start_beats + note.duration_beats) * ppq).round() as u64;
        let offset = offset.max(onset + 1);
        events.push((onset, vec![0x90 | channel, note.pitch, velocity]));
        events.push((offset, vec![0x80 | channel, note.pitch, 0]));
    }

    // Note-offs before note-ons on the same tick
    events.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let a_is_off = a.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            let b_is_off = b.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            b_is_off.cmp(&a_is_off)
        })
    });

    let mut track_data = Vec::new();
    let mut last_tick = 0u64;
    for (tick, data) in events {
        let delta = tick.saturating_sub(last_tick);
        write_vlq(&mut track_data, delta as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }

    // End of track
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    track_data
}

fn division(options: &MidiOptions) -> u16 {
    options.ticks_per_beat.clamp(1, MAX_TICKS_PER_BEAT)
}

fn build_midi_file(ppq: u16, track: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(22 + track.len());

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // format 0
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    buf.extend_from_slice(b"MTrk");
    buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
    buf.extend_from_slice(track);

    buf
}

/// Write a variable-length quantity to a byte buffer.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    buf.extend_from_slice(&bytes);
}
