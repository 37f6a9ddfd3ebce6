//! End-to-end processing of one recording.
//!
//! transcribe -> fit key -> render MIDI -> resynthesize -> write record.
//! The melody record is written last, so a record on disk always has its
//! artifacts beside it.

use anyhow::{Context, Result};
use hummerconf::{HummerConfig, ScaleRoots};
use melody_render::{synth, MidiOptions, RenderOutput, Renderer, StagedBatch, SynthOptions};
use melody_transcribe::{
    fit_key, CandidateRoots, FeatureSet, KeyFit, Melody, TranscribeOptions, Transcription,
    VoicingParams,
};
use tracing::info;

use crate::store::MelodyStore;

/// Per-invocation switches layered over the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    pub no_fix: bool,
    pub no_audio: bool,
}

/// What happened to one recording.
#[derive(Debug)]
pub enum Outcome {
    Stored(Stored),
    /// Nothing pitched was heard; no artifacts were written.
    Empty { segments: usize },
}

#[derive(Debug)]
pub struct Stored {
    pub melody: Melody,
    pub key_fit: Option<KeyFit>,
    pub render: RenderOutput,
    pub record_path: std::path::PathBuf,
}

pub struct Pipeline {
    options: TranscribeOptions,
    fix_key: bool,
    roots: CandidateRoots,
    renderer: Renderer,
    store: MelodyStore,
}

impl Pipeline {
    /// Build a pipeline from configuration.
    ///
    /// The SoundFont is loaded once here when audio is enabled.
    pub fn from_config(config: &HummerConfig, flags: RunFlags) -> Result<Self> {
        let options = TranscribeOptions {
            voicing: VoicingParams {
                silence_bias: config.analysis.silence_bias,
                silence_loop: config.analysis.silence_loop,
                voiced_loop: config.analysis.voiced_loop,
            },
            target_duration_secs: config.analysis.target_duration_secs,
        };

        let midi = MidiOptions {
            program: config.render.program,
            velocity: config.render.velocity,
            ticks_per_beat: config.render.ticks_per_beat,
            min_note_beats: config.render.min_note_beats,
        };

        let renderer = if config.render.synthesize && !flags.no_audio {
            let sound_font = synth::load_soundfont(&config.paths.soundfont).with_context(|| {
                format!(
                    "Failed to load SoundFont {} (use --no-audio to skip resynthesis)",
                    config.paths.soundfont.display()
                )
            })?;
            let synth = SynthOptions {
                sample_rate: config.render.sample_rate,
                tail_secs: config.render.tail_secs,
            };
            Renderer::with_sound_font(midi, synth, sound_font)
        } else {
            Renderer::new(midi)
        };

        Ok(Self {
            options,
            fix_key: config.analysis.fix_key && !flags.no_fix,
            roots: candidate_roots(config.analysis.scale_roots),
            renderer,
            store: MelodyStore::new(&config.paths.output_dir),
        })
    }

    pub fn store(&self) -> &MelodyStore {
        &self.store
    }

    /// Process one recording's features under identifier `id`.
    pub fn run(&self, features: &FeatureSet, id: u64) -> Result<Outcome> {
        let transcription = melody_transcribe::transcribe(features, &self.options)
            .with_context(|| format!("Failed to transcribe {}", features.source_audio))?;

        let mut melody = match transcription {
            Transcription::Melody(melody) => melody,
            Transcription::Empty { segments } => {
                info!(id, source = %features.source_audio, "no melody detected, nothing stored");
                return Ok(Outcome::Empty { segments });
            }
        };
        melody.id = Some(id);

        let key_fit = self.fix_key.then(|| self.fit(&mut melody));
        let stored = self.publish(melody, key_fit)?;
        Ok(Outcome::Stored(stored))
    }

    /// Key-fit a melody in place.
    pub fn fit(&self, melody: &mut Melody) -> KeyFit {
        let fit = fit_key(melody, self.roots);
        if let Some(scale) = fit.scale {
            info!(
                id = ?melody.id,
                scale = %scale,
                loss = fit.loss,
                changed = fit.substitutions.len(),
                "fitted key"
            );
        }
        fit
    }

    /// Render artifacts for `melody` and publish them with its record.
    ///
    /// Everything is staged first and the record is renamed into place
    /// last. On failure the previously stored melody, if any, is left as
    /// it was.
    pub fn publish(&self, melody: Melody, key_fit: Option<KeyFit>) -> Result<Stored> {
        let id = melody.id.context("melody has no identifier")?;
        let paths = self.store.artifact_paths(id);

        let mut batch = StagedBatch::new();
        let render = self
            .renderer
            .stage(&melody, &paths, &mut batch)
            .with_context(|| format!("Failed to render melody {id}"))?;
        let record_path = self.store.stage_record(&melody, &mut batch)?;
        batch
            .commit()
            .with_context(|| format!("Failed to publish melody {id}"))?;

        info!(id, record = %record_path.display(), "stored melody");
        Ok(Stored {
            melody,
            key_fit,
            render,
            record_path,
        })
    }
}

fn candidate_roots(roots: ScaleRoots) -> CandidateRoots {
    match roots {
        ScaleRoots::All => CandidateRoots::All,
        ScaleRoots::Present => CandidateRoots::Present,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config(dir: &Path) -> HummerConfig {
        let mut config = HummerConfig::default();
        config.paths.output_dir = dir.to_path_buf();
        config.paths.soundfont = dir.join("missing.sf2");
        config
    }

    #[test]
    fn missing_soundfont_fails_early() {
        let dir = tempfile::tempdir().unwrap();
        let err = Pipeline::from_config(&config(dir.path()), RunFlags::default())
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("missing.sf2"));
    }

    #[test]
    fn no_audio_skips_soundfont() {
        let dir = tempfile::tempdir().unwrap();
        let flags = RunFlags {
            no_audio: true,
            ..Default::default()
        };
        assert!(Pipeline::from_config(&config(dir.path()), flags).is_ok());
    }

    #[test]
    fn no_fix_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let flags = RunFlags {
            no_fix: true,
            no_audio: true,
        };
        let pipeline = Pipeline::from_config(&config(dir.path()), flags).unwrap();
        assert!(!pipeline.fix_key);
    }

    fn melody(id: u64, midi: f64) -> Melody {
        Melody {
            id: Some(id),
            notes: vec![melody_transcribe::NoteName::from_midi(midi)
                .map(melody_transcribe::Note::Pitched)
                .unwrap()],
            lengths: vec![40],
            midi: vec![Some(midi)],
            bpm: 120.0,
            target_duration_secs: 4.0,
            source_audio: format!("melody_{id}.wav"),
        }
    }

    #[test]
    fn failed_republish_keeps_stored_melody() {
        let dir = tempfile::tempdir().unwrap();
        let flags = RunFlags {
            no_audio: true,
            ..Default::default()
        };
        let pipeline = Pipeline::from_config(&config(dir.path()), flags).unwrap();
        pipeline.publish(melody(5, 69.0), None).unwrap();
        let midi_path = dir.path().join("melody_5.mid");
        let record_path = dir.path().join("melody_5.json");
        let first_midi = std::fs::read(&midi_path).unwrap();
        let first_record = std::fs::read(&record_path).unwrap();

        // The record cannot be staged, so the second publish must fail
        std::fs::create_dir_all(dir.path().join("melody_5.json.tmp/blocked")).unwrap();
        assert!(pipeline.publish(melody(5, 72.0), None).is_err());

        assert_eq!(std::fs::read(&midi_path).unwrap(), first_midi);
        assert_eq!(std::fs::read(&record_path).unwrap(), first_record);
        assert!(!dir.path().join("melody_5.mid.tmp").exists());
    }

    #[test]
    fn record_failure_withdraws_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let flags = RunFlags {
            no_audio: true,
            ..Default::default()
        };
        let pipeline = Pipeline::from_config(&config(dir.path()), flags).unwrap();
        // A directory at the record path makes the final rename fail
        std::fs::create_dir_all(dir.path().join("melody_7.json/blocked")).unwrap();

        assert!(pipeline.publish(melody(7, 69.0), None).is_err());
        assert!(!dir.path().join("melody_7.mid").exists());
        assert!(!dir.path().join("melody_7.mid.tmp").exists());
    }
}
