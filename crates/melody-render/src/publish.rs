//! Atomic artifact publication.
//!
//! Artifacts are staged next to their final paths and only renamed into
//! place once every one of them has been written. A failed commit puts
//! back whatever the targets held before.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Error, Result};

/// Output locations for one melody's rendered artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub midi: PathBuf,
    pub audio: PathBuf,
}

impl ArtifactPaths {
    /// `melody_<id>.mid` and `melody_<id>_processed.wav` under `dir`.
    pub fn for_id(dir: &Path, id: u64) -> Self {
        Self {
            midi: dir.join(format!("melody_{id}.mid")),
            audio: dir.join(format!("melody_{id}_processed.wav")),
        }
    }
}

/// Sibling path the bytes are staged at before the rename.
pub fn staging_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

/// Sibling path the previous contents are kept at during a commit.
pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".bak")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A set of files published together.
///
/// [`stage`](Self::stage) writes each file to its staging path;
/// [`commit`](Self::commit) renames them into place in staging order.
/// Dropping an uncommitted batch removes its staging files and leaves the
/// targets untouched.
#[derive(Debug, Default)]
pub struct StagedBatch {
    staged: Vec<(PathBuf, PathBuf)>,
}

/// A target replaced during commit, with its previous contents if any.
struct Replaced {
    target: PathBuf,
    backup: Option<PathBuf>,
}

impl StagedBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `bytes` to the staging path of `target`.
    pub fn stage(&mut self, target: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let staging = staging_path(target);
        if let Err(e) = fs::write(&staging, bytes) {
            let _ = fs::remove_file(&staging);
            return Err(io_error(target)(e));
        }
        self.staged.push((staging, target.to_path_buf()));
        Ok(())
    }

    /// Rename every staged file into place.
    ///
    /// Existing targets are linked (or copied) to a backup first, so readers
    /// always see either the old or the new file. If any step fails, the
    /// targets already replaced get their previous contents back (or are
    /// removed if they did not exist) and the remaining staging files are
    /// deleted.
    pub fn commit(mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let mut replaced: Vec<Replaced> = Vec::with_capacity(staged.len());

        for (i, (staging, target)) in staged.iter().enumerate() {
            if let Err(e) = replace(staging, target).map(|r| replaced.push(r)) {
                for (staging, _) in &staged[i..] {
                    let _ = fs::remove_file(staging);
                }
                roll_back(replaced);
                return Err(e);
            }
        }

        for r in replaced {
            if let Some(backup) = r.backup {
                let _ = fs::remove_file(backup);
            }
        }
        Ok(())
    }
}

impl Drop for StagedBatch {
    fn drop(&mut self) {
        for (staging, _) in self.staged.drain(..) {
            let _ = fs::remove_file(staging);
        }
    }
}

fn replace(staging: &Path, target: &Path) -> Result<Replaced> {
    let backup = if target.exists() {
        let backup = backup_path(target);
        let _ = fs::remove_file(&backup);
        fs::hard_link(target, &backup)
            .or_else(|_| fs::copy(target, &backup).map(|_| ()))
            .map_err(io_error(target))?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging, target) {
        if let Some(backup) = &backup {
            let _ = fs::remove_file(backup);
        }
        return Err(io_error(target)(e));
    }

    Ok(Replaced {
        target: target.to_path_buf(),
        backup,
    })
}

fn roll_back(replaced: Vec<Replaced>) {
    for r in replaced.into_iter().rev() {
        let restored = match &r.backup {
            Some(backup) => fs::rename(backup, &r.target),
            None => fs::remove_file(&r.target),
        };
        if let Err(e) = restored {
            warn!(path = %r.target.display(), error = %e, "failed to restore artifact");
        }
    }
}
