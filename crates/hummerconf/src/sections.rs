//! Configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".local/share/hummer"))
        .unwrap_or_else(|| PathBuf::from(".local/share/hummer"))
}

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where melody records, MIDI files and resynthesized audio are written.
    /// Default: ~/.local/share/hummer/melodies
    pub output_dir: PathBuf,

    /// SoundFont used for resynthesis.
    /// Default: ~/.local/share/hummer/piano.sf2
    pub soundfont: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: data_dir().join("melodies"),
            soundfont: data_dir().join("piano.sf2"),
        }
    }
}

/// Which roots the key fitter tries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleRoots {
    #[default]
    All,
    Present,
}

impl ScaleRoots {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleRoots::All => "all",
            ScaleRoots::Present => "present",
        }
    }
}

/// Transcription tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// RMS level treated as the voiced/silent midpoint. Default: 0.01
    pub silence_bias: f64,
    /// Silent-state self-transition probability. Default: 0.5
    pub silence_loop: f64,
    /// Voiced-state self-transition probability. Default: 0.6
    pub voiced_loop: f64,
    /// Rendered length of every melody in seconds. Default: 10
    pub target_duration_secs: f64,
    /// Run the key fitter after transcription. Default: true
    pub fix_key: bool,
    /// Candidate roots for key fitting. Default: all
    pub scale_roots: ScaleRoots,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            silence_bias: 0.01,
            silence_loop: 0.5,
            voiced_loop: 0.6,
            target_duration_secs: 10.0,
            fix_key: true,
            scale_roots: ScaleRoots::All,
        }
    }
}

/// MIDI export and resynthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub program: u8,
    pub velocity: u8,
    pub ticks_per_beat: u16,
    /// Notes shorter than this many beats are not emitted. Default: 1/16
    pub min_note_beats: f64,
    /// Produce resynthesized audio alongside the MIDI file. Default: true
    pub synthesize: bool,
    pub sample_rate: u32,
    /// Audio rendered past the final event. Default: 1s
    pub tail_secs: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: 0,
            velocity: 100,
            ticks_per_beat: 960,
            min_note_beats: 0.0625,
            synthesize: true,
            sample_rate: 44100,
            tail_secs: 1.0,
        }
    }
}

/// Logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive).
    /// Default: info
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
