//! On-disk layout of published index artifacts
//!
//! ```text
//! <index_dir>/
//!   CURRENT                 name of the published generation
//!   gen-<stamp>-<id>/
//!     vectors.bin
//!     metadata.jsonl
//! ```
//!
//! A build writes into a hidden staging directory, renames it to a
//! generation name and then swaps `CURRENT`. Readers resolve `CURRENT` once
//! and read both files from that generation, so an index and its metadata
//! are always observed as a pair.
//!
//! Publishing and pruning hold an exclusive lock on `<index_dir>/.publish.lock`
//! so concurrent builds never remove a generation another build is about to
//! make current.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use uuid::Uuid;

use crate::error::{Result, RetrievalError};

const CURRENT_FILE: &str = "CURRENT";
const GENERATION_PREFIX: &str = "gen-";
const STAGING_PREFIX: &str = ".staging-";
const INDEX_FILE: &str = "vectors.bin";
const METADATA_FILE: &str = "metadata.jsonl";
const LOCK_FILE: &str = ".publish.lock";

/// One published build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub name: String,
    pub dir: PathBuf,
}

impl Generation {
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }
}

/// A build in progress; removed on drop unless published
#[derive(Debug)]
pub struct StagedGeneration {
    name: String,
    dir: PathBuf,
    published: bool,
}

impl StagedGeneration {
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }
}

impl Drop for StagedGeneration {
    fn drop(&mut self) {
        if !self.published {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                log::debug!("Could not remove staging dir {}: {}", self.dir.display(), e);
            }
        }
    }
}

/// Exclusive hold on the publication lock, released on drop
struct PublishLock {
    file: File,
}

impl Drop for PublishLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::debug!("Could not release publish lock: {}", e);
        }
    }
}

/// Artifact directory handle
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn current_file(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    /// Name of the published generation, if any
    pub fn current_name(&self) -> Result<Option<String>> {
        let path = self.current_file();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let name = raw.trim();
        if !name.starts_with(GENERATION_PREFIX) || name.contains(|c: char| c == '/' || c == '\\') {
            return Err(RetrievalError::corrupt(
                path,
                format!("invalid generation name {:?}", name),
            ));
        }
        Ok(Some(name.to_string()))
    }

    /// Resolve the published generation
    ///
    /// Fails with [`RetrievalError::IndexNotFound`] when nothing has been built.
    pub fn resolve(&self) -> Result<Generation> {
        let name = self
            .current_name()?
            .ok_or_else(|| RetrievalError::IndexNotFound(self.root.clone()))?;
        Ok(Generation {
            dir: self.root.join(&name),
            name,
        })
    }

    /// Create an empty staging directory for a new build
    pub fn stage(&self) -> Result<StagedGeneration> {
        fs::create_dir_all(&self.root)?;

        let name = format!(
            "{}{}-{}",
            GENERATION_PREFIX,
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let dir = self.root.join(format!("{}{}", STAGING_PREFIX, name));
        fs::create_dir(&dir)?;

        Ok(StagedGeneration {
            name,
            dir,
            published: false,
        })
    }

    fn lock(&self) -> Result<PublishLock> {
        let path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;
        Ok(PublishLock { file })
    }

    /// Make a staged build the current generation
    ///
    /// Rename, `CURRENT` swap and pruning run under the publication lock.
    pub fn publish(&self, mut staged: StagedGeneration) -> Result<Generation> {
        let _lock = self.lock()?;
        let previous = self.current_name().ok().flatten();

        let dir = self.root.join(&staged.name);
        fs::rename(&staged.dir, &dir)?;
        staged.published = true;

        let tmp = self
            .root
            .join(format!("{}.tmp-{}", CURRENT_FILE, Uuid::new_v4().simple()));
        fs::write(&tmp, format!("{}\n", staged.name))?;
        fs::rename(&tmp, self.current_file())?;

        log::info!("Published index generation {}", staged.name);

        self.prune(&staged.name, previous.as_deref());

        Ok(Generation {
            name: staged.name.clone(),
            dir,
        })
    }

    /// Remove generations other than the current and previous one
    fn prune(&self, current: &str, previous: Option<&str>) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Could not list {}: {}", self.root.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(GENERATION_PREFIX)
                || name == current
                || Some(name.as_str()) == previous
            {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => log::debug!("Pruned index generation {}", name),
                Err(e) => log::warn!("Could not prune {}: {}", name, e),
            }
        }
    }

    /// Names of generations on disk, oldest first
    pub fn generations(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&self.root)?
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(GENERATION_PREFIX))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_without_build_is_index_not_found() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path().join("index"));
        assert!(matches!(
            layout.resolve(),
            Err(RetrievalError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_publish_swaps_current() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());

        let staged = layout.stage().unwrap();
        fs::write(staged.index_path(), b"one").unwrap();
        let first = layout.publish(staged).unwrap();
        assert_eq!(layout.resolve().unwrap(), first);
        assert_eq!(fs::read(first.index_path()).unwrap(), b"one");

        let staged = layout.stage().unwrap();
        fs::write(staged.index_path(), b"two").unwrap();
        let second = layout.publish(staged).unwrap();
        assert_ne!(first.name, second.name);
        assert_eq!(layout.resolve().unwrap(), second);
    }

    #[test]
    fn test_unpublished_stage_is_removed() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());

        let staged = layout.stage().unwrap();
        let staged_dir = staged.dir.clone();
        assert!(staged_dir.is_dir());
        drop(staged);

        assert!(!staged_dir.exists());
        assert!(layout.current_name().unwrap().is_none());
    }

    #[test]
    fn test_prune_keeps_current_and_previous() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());

        let mut published = Vec::new();
        for _ in 0..4 {
            let staged = layout.stage().unwrap();
            published.push(layout.publish(staged).unwrap().name);
        }

        let on_disk = layout.generations().unwrap();
        assert_eq!(on_disk.len(), 2);
        assert!(on_disk.contains(&published[2]));
        assert!(on_disk.contains(&published[3]));
    }

    #[test]
    fn test_concurrent_publishes_leave_current_intact() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let staged = layout.stage().unwrap();
        fs::write(staged.index_path(), b"seed").unwrap();
        layout.publish(staged).unwrap();

        for _ in 0..20 {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        let staged = layout.stage().unwrap();
                        fs::write(staged.index_path(), b"data").unwrap();
                        layout.publish(staged).unwrap();
                    });
                }
            });

            let current = layout.resolve().unwrap();
            assert!(current.index_path().is_file(), "{} was pruned", current.name);
            assert!(layout.generations().unwrap().len() <= 2);
        }
    }

    #[test]
    fn test_tampered_current_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("CURRENT"), "../../etc").unwrap();
        let layout = ArtifactLayout::new(dir.path());
        assert!(matches!(
            layout.resolve(),
            Err(RetrievalError::CorruptArtifact { .. })
        ));
    }
}
