//! Configuration loading for hummer.
//!
//! Every tunable of the transcription pipeline lives here as plain data,
//! so the analysis and rendering crates never touch files or the
//! environment themselves.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hummerconf::HummerConfig;
//!
//! let config = HummerConfig::load().expect("Failed to load config");
//! println!("Output dir: {}", config.paths.output_dir.display());
//! println!("Fix key: {}", config.analysis.fix_key);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/hummer/config.toml` (system)
//! 2. `~/.config/hummer/config.toml` (user)
//! 3. `./hummer.toml` or the path given with `--config` (local override)
//! 4. Environment variables (`HUMMER_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! output_dir = "~/.local/share/hummer/melodies"
//! soundfont = "~/midi/SF2/piano.sf2"
//!
//! [analysis]
//! silence_bias = 0.01
//! target_duration_secs = 10
//! fix_key = true
//!
//! [render]
//! program = 0
//! velocity = 100
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{AnalysisConfig, PathsConfig, RenderConfig, ScaleRoots, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config value {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Complete hummer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HummerConfig {
    pub paths: PathsConfig,
    pub analysis: AnalysisConfig,
    pub render: RenderConfig,
    pub telemetry: TelemetryConfig,
}

impl HummerConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/hummer/config.toml`
    /// 3. `~/.config/hummer/config.toml`
    /// 4. `./hummer.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` standing in for `./hummer.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        Self::load_files(&files)
    }

    /// Merge exactly `files` in order, then apply env overrides.
    pub fn load_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_table(path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path.clone());
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::config_from_table(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject values the analysis or MIDI encoding cannot represent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &'static str, message: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                key,
                message: message.into(),
            })
        }

        let analysis = &self.analysis;
        for (key, value) in [
            ("analysis.silence_loop", analysis.silence_loop),
            ("analysis.voiced_loop", analysis.voiced_loop),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(key, format!("{value} is not a probability"));
            }
        }
        if !analysis.silence_bias.is_finite() {
            return invalid("analysis.silence_bias", "must be finite");
        }
        if !(analysis.target_duration_secs.is_finite() && analysis.target_duration_secs > 0.0) {
            return invalid(
                "analysis.target_duration_secs",
                format!("{} must be positive", analysis.target_duration_secs),
            );
        }

        let render = &self.render;
        if render.program > 127 {
            return invalid("render.program", format!("{} is above 127", render.program));
        }
        if !(1..=127).contains(&render.velocity) {
            return invalid("render.velocity", format!("{} is outside 1-127", render.velocity));
        }
        if !(1..=0x7FFF).contains(&render.ticks_per_beat) {
            return invalid(
                "render.ticks_per_beat",
                format!("{} is outside 1-32767", render.ticks_per_beat),
            );
        }
        if !(render.min_note_beats.is_finite() && render.min_note_beats >= 0.0) {
            return invalid("render.min_note_beats", "must be zero or positive");
        }
        if render.sample_rate == 0 {
            return invalid("render.sample_rate", "must be positive");
        }
        if !(render.tail_secs.is_finite() && render.tail_secs >= 0.0) {
            return invalid("render.tail_secs", "must be zero or positive");
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# hummer configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "output_dir = \"{}\"\n",
            self.paths.output_dir.display()
        ));
        output.push_str(&format!(
            "soundfont = \"{}\"\n",
            self.paths.soundfont.display()
        ));

        output.push_str("\n[analysis]\n");
        output.push_str(&format!("silence_bias = {:?}\n", self.analysis.silence_bias));
        output.push_str(&format!("silence_loop = {:?}\n", self.analysis.silence_loop));
        output.push_str(&format!("voiced_loop = {:?}\n", self.analysis.voiced_loop));
        output.push_str(&format!(
            "target_duration_secs = {:?}\n",
            self.analysis.target_duration_secs
        ));
        output.push_str(&format!("fix_key = {}\n", self.analysis.fix_key));
        output.push_str(&format!(
            "scale_roots = \"{}\"\n",
            self.analysis.scale_roots.as_str()
        ));

        output.push_str("\n[render]\n");
        output.push_str(&format!("program = {}\n", self.render.program));
        output.push_str(&format!("velocity = {}\n", self.render.velocity));
        output.push_str(&format!("ticks_per_beat = {}\n", self.render.ticks_per_beat));
        output.push_str(&format!("min_note_beats = {:?}\n", self.render.min_note_beats));
        output.push_str(&format!("synthesize = {}\n", self.render.synthesize));
        output.push_str(&format!("sample_rate = {}\n", self.render.sample_rate));
        output.push_str(&format!("tail_secs = {:?}\n", self.render.tail_secs));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HummerConfig::default();
        assert_eq!(config.analysis.silence_bias, 0.01);
        assert_eq!(config.analysis.target_duration_secs, 10.0);
        assert!(config.analysis.fix_key);
        assert_eq!(config.render.velocity, 100);
        assert_eq!(config.render.min_note_beats, 0.0625);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.paths.output_dir.ends_with("hummer/melodies"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = HummerConfig::default();
        config.paths.output_dir = PathBuf::from("/srv/melodies");
        config.paths.soundfont = PathBuf::from("/srv/piano.sf2");
        config.analysis.scale_roots = ScaleRoots::Present;
        config.render.program = 19;

        let text = config.to_toml();
        let parsed = loader::parse_toml(&text, Path::new("roundtrip.toml")).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_later_files_win() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(
            &system,
            "[analysis]\nsilence_bias = 0.05\n\n[render]\nprogram = 40\n",
        )
        .unwrap();
        std::fs::write(&local, "[render]\nprogram = 73\n").unwrap();

        let (config, sources) =
            HummerConfig::load_files(&[system.clone(), local.clone()]).unwrap();

        assert_eq!(config.render.program, 73);
        assert_eq!(config.analysis.silence_bias, 0.05);
        assert_eq!(sources.files, vec![system, local]);
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(HummerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_midi_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("[render]\nvelocity = 128\n", "render.velocity"),
            ("[render]\nvelocity = 0\n", "render.velocity"),
            ("[render]\nticks_per_beat = 0\n", "render.ticks_per_beat"),
            ("[render]\nprogram = 130\n", "render.program"),
            ("[analysis]\nvoiced_loop = 1.5\n", "analysis.voiced_loop"),
            ("[analysis]\ntarget_duration_secs = 0.0\n", "analysis.target_duration_secs"),
        ];
        for (i, (toml, expected)) in cases.iter().enumerate() {
            let path = dir.path().join(format!("case{i}.toml"));
            std::fs::write(&path, toml).unwrap();
            match HummerConfig::load_files(&[path]) {
                Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, *expected),
                other => panic!("{toml:?} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HummerConfig::load_files(&[dir.path().join("absent.toml")]).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
