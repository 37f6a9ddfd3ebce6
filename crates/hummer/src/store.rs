//! Melody records on disk.
//!
//! One `melody_<id>.json` per melody, next to its rendered artifacts.

use anyhow::{bail, Context, Result};
use melody_render::{ArtifactPaths, StagedBatch};
use melody_transcribe::Melody;
use std::path::{Path, PathBuf};

/// Directory holding melody records and their artifacts.
#[derive(Debug, Clone)]
pub struct MelodyStore {
    dir: PathBuf,
}

impl MelodyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("melody_{id}.json"))
    }

    pub fn artifact_paths(&self, id: u64) -> ArtifactPaths {
        ArtifactPaths::for_id(&self.dir, id)
    }

    /// Stage the record for a melody that already carries its id.
    pub fn stage_record(&self, melody: &Melody, batch: &mut StagedBatch) -> Result<PathBuf> {
        let id = melody.id.context("melody has no identifier")?;
        let path = self.record_path(id);
        batch
            .stage(&path, &encode_record(melody)?)
            .with_context(|| format!("Failed to write melody record {}", path.display()))?;
        Ok(path)
    }

    /// Fail if a record for `id` is already stored.
    pub fn ensure_vacant(&self, id: u64) -> Result<()> {
        let path = self.record_path(id);
        if path.exists() {
            bail!(
                "melody {id} already exists at {} (use --force to replace it)",
                path.display()
            );
        }
        Ok(())
    }

    /// Stored records in identifier order.
    pub fn list(&self) -> Result<Vec<(u64, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if let Some(id) = record_id(&path) {
                records.push((id, path));
            }
        }
        records.sort_by_key(|(id, _)| *id);
        Ok(records)
    }

    /// Highest identifier already on disk.
    pub fn highest_id(&self) -> Result<Option<u64>> {
        Ok(self.list()?.last().map(|(id, _)| *id))
    }
}

/// Identifier encoded in a `melody_<id>.json` file name.
pub fn record_id(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix("melody_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Read and validate a melody record.
pub fn load_record(path: &Path) -> Result<Melody> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut melody: Melody = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse melody record {}", path.display()))?;
    melody
        .validate()
        .with_context(|| format!("Malformed melody record {}", path.display()))?;
    if melody.id.is_none() {
        melody.id = record_id(path);
    }
    Ok(melody)
}

/// Pretty-printed JSON for a melody record.
pub fn encode_record(melody: &Melody) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(melody).context("Failed to serialize melody")
}

#[cfg(test)]
mod tests {
    use super::*;
    use melody_transcribe::Note;
    use pretty_assertions::assert_eq;

    fn melody(id: u64) -> Melody {
        Melody {
            id: Some(id),
            notes: vec![Note::Pause, "E4".parse().unwrap()],
            lengths: vec![5, 15],
            midi: vec![None, Some(64.2)],
            bpm: 96.0,
            target_duration_secs: 10.0,
            source_audio: format!("melody_{id}.wav"),
        }
    }

    fn save(store: &MelodyStore, melody: &Melody) -> PathBuf {
        let mut batch = StagedBatch::new();
        let path = store.stage_record(melody, &mut batch).unwrap();
        batch.commit().unwrap();
        path
    }

    #[test]
    fn record_ids_from_names() {
        assert_eq!(record_id(Path::new("/x/melody_42.json")), Some(42));
        assert_eq!(record_id(Path::new("/x/melody_42.mid")), None);
        assert_eq!(record_id(Path::new("/x/melody_42_processed.wav")), None);
        assert_eq!(record_id(Path::new("/x/melody_42.json.tmp")), None);
        assert_eq!(record_id(Path::new("/x/melody_new.json")), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = MelodyStore::new(dir.path());
        let path = save(&store, &melody(3));

        assert_eq!(path, store.record_path(3));
        assert_eq!(load_record(&path).unwrap(), melody(3));
    }

    #[test]
    fn list_is_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = MelodyStore::new(dir.path());
        for id in [10, 2, 7] {
            save(&store, &melody(id));
        }
        std::fs::write(dir.path().join("melody_2.mid"), b"MThd").unwrap();

        let ids: Vec<u64> = store.list().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![2, 7, 10]);
        assert_eq!(store.highest_id().unwrap(), Some(10));
    }

    #[test]
    fn missing_dir_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MelodyStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.highest_id().unwrap(), None);
    }

    #[test]
    fn stored_ids_are_not_vacant() {
        let dir = tempfile::tempdir().unwrap();
        let store = MelodyStore::new(dir.path());
        save(&store, &melody(4));

        assert!(store.ensure_vacant(5).is_ok());
        let err = store.ensure_vacant(4).unwrap_err();
        assert!(err.to_string().contains("melody 4 already exists"));
    }

    #[test]
    fn id_falls_back_to_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("melody_5.json");
        let mut m = melody(5);
        m.id = None;
        std::fs::write(&path, encode_record(&m).unwrap()).unwrap();

        assert_eq!(load_record(&path).unwrap().id, Some(5));
    }

    #[test]
    fn malformed_record_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("melody_1.json");
        let mut m = melody(1);
        m.lengths.pop();
        std::fs::write(&path, encode_record(&m).unwrap()).unwrap();

        assert!(load_record(&path).is_err());
    }
}
