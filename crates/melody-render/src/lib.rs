pub mod midi_writer;
pub mod publish;
pub mod synth;

pub use midi_writer::{melody_to_midi, note_events, MidiOptions, NoteEvent, RenderReport};
pub use publish::{staging_path, ArtifactPaths, StagedBatch};

use melody_transcribe::Melody;
use rustysynth::SoundFont;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Errors from rendering and resynthesis.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transcribe(#[from] melody_transcribe::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to load SoundFont {0}")]
    SoundFont(String),

    #[error("failed to parse rendered MIDI: {0}")]
    Midi(String),

    #[error("failed to create synthesizer: {0}")]
    Synth(String),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Audio resynthesis settings.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub sample_rate: u32,
    pub tail_secs: f64,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            tail_secs: 1.0,
        }
    }
}

/// Paths written by one [`Renderer::render`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub midi_path: PathBuf,
    pub audio_path: Option<PathBuf>,
    pub report: RenderReport,
}

/// Turns melodies into a MIDI file and, with a SoundFont, resynthesized audio.
pub struct Renderer {
    midi: MidiOptions,
    synth: SynthOptions,
    sound_font: Option<Arc<SoundFont>>,
}

impl Renderer {
    /// MIDI-only renderer.
    pub fn new(midi: MidiOptions) -> Self {
        Self {
            midi,
            synth: SynthOptions::default(),
            sound_font: None,
        }
    }

    /// Renderer that also resynthesizes audio with `sound_font`.
    pub fn with_sound_font(midi: MidiOptions, synth: SynthOptions, sound_font: Arc<SoundFont>) -> Self {
        Self {
            midi,
            synth,
            sound_font: Some(sound_font),
        }
    }

    /// Render `melody` and stage its artifacts for `paths` in `batch`.
    ///
    /// Nothing reaches the final paths until the batch is committed.
    pub fn stage(
        &self,
        melody: &Melody,
        paths: &ArtifactPaths,
        batch: &mut StagedBatch,
    ) -> Result<RenderOutput> {
        let (midi_bytes, report) = melody_to_midi(melody, &self.midi)?;

        let wav_bytes = match &self.sound_font {
            Some(sf) => Some(synth::render_midi_to_wav(
                &midi_bytes,
                sf,
                self.synth.sample_rate,
                self.synth.tail_secs,
            )?),
            None => None,
        };

        batch.stage(&paths.midi, &midi_bytes)?;
        let audio_path = match wav_bytes {
            Some(wav) => {
                batch.stage(&paths.audio, &wav)?;
                Some(paths.audio.clone())
            }
            None => None,
        };

        info!(
            midi = %paths.midi.display(),
            audio = audio_path.is_some(),
            notes = report.emitted,
            "rendered melody"
        );

        Ok(RenderOutput {
            midi_path: paths.midi.clone(),
            audio_path,
            report,
        })
    }
}
