//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, HummerConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only existing files
/// are returned.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/hummer/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("hummer/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("hummer.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a config file as a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Recursively merge `overlay` into `base`; overlay keys win.
///
/// Tables merge key by key so a later file only needs the values it
/// changes. Any other value type is replaced wholesale.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Build a config from a merged table, filling gaps with defaults.
pub fn config_from_table(table: toml::Table, origin: &Path) -> Result<HummerConfig, ConfigError> {
    let mut config: HummerConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;
    config.paths.output_dir = expand_path(&config.paths.output_dir.to_string_lossy());
    config.paths.soundfont = expand_path(&config.paths.soundfont.to_string_lossy());
    Ok(config)
}

/// Parse a single TOML document into a config.
pub fn parse_toml(contents: &str, path: &Path) -> Result<HummerConfig, ConfigError> {
    config_from_table(parse_table(contents, path)?, path)
}

/// Apply `HUMMER_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut HummerConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from any key lookup (the process environment in production).
pub fn apply_overrides_from(
    config: &mut HummerConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let mut record = |key: &str| sources.env_overrides.push(key.to_string());

    if let Some(v) = lookup("HUMMER_OUTPUT_DIR") {
        config.paths.output_dir = expand_path(&v);
        record("HUMMER_OUTPUT_DIR");
    }
    if let Some(v) = lookup("HUMMER_SOUNDFONT") {
        config.paths.soundfont = expand_path(&v);
        record("HUMMER_SOUNDFONT");
    }

    if let Some(bias) = lookup("HUMMER_SILENCE_BIAS").and_then(|v| v.parse().ok()) {
        config.analysis.silence_bias = bias;
        record("HUMMER_SILENCE_BIAS");
    }
    if let Some(secs) = lookup("HUMMER_TARGET_DURATION").and_then(|v| v.parse().ok()) {
        config.analysis.target_duration_secs = secs;
        record("HUMMER_TARGET_DURATION");
    }
    if let Some(fix) = lookup("HUMMER_FIX_KEY").and_then(|v| parse_bool(&v)) {
        config.analysis.fix_key = fix;
        record("HUMMER_FIX_KEY");
    }
    if let Some(synth) = lookup("HUMMER_SYNTHESIZE").and_then(|v| parse_bool(&v)) {
        config.render.synthesize = synth;
        record("HUMMER_SYNTHESIZE");
    }

    if let Some(v) = lookup("HUMMER_LOG_LEVEL") {
        config.telemetry.log_level = v;
        record("HUMMER_LOG_LEVEL");
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        record("RUST_LOG");
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        PathBuf::from(path)
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            match env::var(var_name) {
                Ok(var_value) => PathBuf::from(var_value).join(&stripped[slash_pos + 1..]),
                Err(_) => PathBuf::from(path),
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
