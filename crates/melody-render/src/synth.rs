//! SoundFont resynthesis of rendered MIDI.

use hound::{WavSpec, WavWriter};
use rustysynth::{MidiFile, MidiFileSequencer, SoundFont, Synthesizer, SynthesizerSettings};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::{Error, Result};

/// Load a SoundFont from disk.
pub fn load_soundfont(path: &Path) -> Result<Arc<SoundFont>> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cursor = Cursor::new(bytes);
    let sound_font = SoundFont::new(&mut cursor)
        .map_err(|e| Error::SoundFont(format!("{}: {}", path.display(), e)))?;
    Ok(Arc::new(sound_font))
}

/// Render MIDI bytes through a SoundFont into 16-bit stereo WAV bytes.
///
/// `tail_secs` of extra audio are rendered past the last event so note
/// releases are not cut off.
pub fn render_midi_to_wav(
    midi_bytes: &[u8],
    sound_font: &Arc<SoundFont>,
    sample_rate: u32,
    tail_secs: f64,
) -> Result<Vec<u8>> {
    let mut midi_cursor = Cursor::new(midi_bytes);
    let midi = Arc::new(MidiFile::new(&mut midi_cursor).map_err(|e| Error::Midi(e.to_string()))?);

    let settings = SynthesizerSettings::new(sample_rate as i32);
    let synthesizer =
        Synthesizer::new(sound_font, &settings).map_err(|e| Error::Synth(e.to_string()))?;

    let mut sequencer = MidiFileSequencer::new(synthesizer);
    sequencer.play(&midi, false);

    let total_time = midi.get_length() + tail_secs.max(0.0);
    let sample_count = (sample_rate as f64 * total_time) as usize;

    let mut left = vec![0f32; sample_count];
    let mut right = vec![0f32; sample_count];
    sequencer.render(&mut left[..], &mut right[..]);

    debug!(samples = sample_count, seconds = total_time, "synthesized audio");
    samples_to_wav(&left, &right, sample_rate)
}

/// Interleave stereo float samples into a WAV byte buffer.
fn samples_to_wav(left: &[f32], right: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for (&l, &r) in left.iter().zip(right.iter()) {
        writer.write_sample((l.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        writer.write_sample((r.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}
