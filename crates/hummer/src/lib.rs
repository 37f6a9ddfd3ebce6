//! Hummer: turn a hummed recording into a melody, fit it to a key and
//! play it back.
//!
//! Frame features come in as JSON ([`melody_transcribe::FeatureSet`]);
//! each recording yields `melody_<id>.json`, `melody_<id>.mid` and,
//! with a SoundFont configured, `melody_<id>_processed.wav`.

pub mod ids;
pub mod pipeline;
pub mod store;
pub mod telemetry;

pub use ids::IdSequence;
pub use pipeline::{Outcome, Pipeline, RunFlags, Stored};
pub use store::MelodyStore;

use anyhow::{Context, Result};
use melody_transcribe::FeatureSet;
use std::path::Path;

/// Read a feature set produced by the analysis front end.
pub fn load_features(path: &Path) -> Result<FeatureSet> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse feature set {}", path.display()))
}
