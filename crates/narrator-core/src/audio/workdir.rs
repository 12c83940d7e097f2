//! Per-run storage for audio segments and the concat manifest

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::Result;
use crate::text::{Chunk, ChunkId};

const MANIFEST_NAME: &str = "concat.txt";

/// Directory owning every intermediate file of one run
///
/// A temporary work directory is deleted by [`WorkDir::close`], or by `Drop`
/// if the run bails out first. A kept directory survives the run.
pub struct WorkDir {
    storage: Storage,
    extension: String,
}

enum Storage {
    Temp(TempDir),
    Kept(PathBuf),
}

impl WorkDir {
    /// Fresh uniquely named directory under the system temp dir.
    pub fn temporary(run_id: &str, extension: &str) -> Result<Self> {
        Self::temporary_in(&std::env::temp_dir(), run_id, extension)
    }

    pub fn temporary_in(root: &Path, run_id: &str, extension: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("narrator-{run_id}-"))
            .tempdir_in(root)?;
        debug!("Created work directory {:?}", dir.path());
        Ok(Self {
            storage: Storage::Temp(dir),
            extension: extension.to_string(),
        })
    }

    /// Persistent `<output stem>.parts` directory next to the output.
    pub fn kept(output: &Path, extension: &str) -> Result<Self> {
        let dir = std::path::absolute(output.with_extension("parts"))?;
        std::fs::create_dir_all(&dir)?;
        debug!("Keeping intermediates in {:?}", dir);
        Ok(Self {
            storage: Storage::Kept(dir),
            extension: extension.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        match &self.storage {
            Storage::Temp(dir) => dir.path(),
            Storage::Kept(dir) => dir,
        }
    }

    pub fn keeps_intermediates(&self) -> bool {
        matches!(self.storage, Storage::Kept(_))
    }

    pub fn segment_path(&self, id: ChunkId) -> PathBuf {
        self.path().join(format!(
            "{:04}-{:04}.{}",
            id.section, id.ordinal, self.extension
        ))
    }

    pub fn markup_path(&self, id: ChunkId) -> PathBuf {
        self.path()
            .join(format!("{:04}-{:04}.ssml", id.section, id.ordinal))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path().join(MANIFEST_NAME)
    }

    /// Save the markup of every chunk; only done for kept directories.
    pub async fn save_markup(&self, chunks: &[Chunk]) -> Result<()> {
        if !self.keeps_intermediates() {
            return Ok(());
        }
        for chunk in chunks {
            tokio::fs::write(self.markup_path(chunk.id), &chunk.markup).await?;
        }
        Ok(())
    }

    /// Release the directory. Failures are logged, never returned.
    pub fn close(self) {
        match self.storage {
            Storage::Temp(dir) => {
                let path = dir.path().to_path_buf();
                match dir.close() {
                    Ok(()) => debug!("Removed work directory {:?}", path),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to remove work directory {:?}: {}", path, e),
                }
            }
            Storage::Kept(dir) => remove_quietly(&dir.join(MANIFEST_NAME)),
        }
    }
}

/// Delete a file, treating "already gone" as success and logging the rest.
pub(crate) fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_dir_removed_on_close() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::temporary_in(root.path(), "run", "mp3").unwrap();
        let path = work.path().to_path_buf();
        std::fs::write(work.segment_path(ChunkId::new(0, 0)), b"audio").unwrap();
        assert!(path.exists());

        work.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_temporary_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkDir::temporary_in(root.path(), "run", "mp3").unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_close_tolerates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::temporary_in(root.path(), "run", "mp3").unwrap();
        std::fs::remove_dir_all(work.path()).unwrap();
        work.close();
    }

    #[test]
    fn test_segment_paths_unique_and_ordered() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::temporary_in(root.path(), "run", "wav").unwrap();
        let a = work.segment_path(ChunkId::new(0, 1));
        let b = work.segment_path(ChunkId::new(1, 0));
        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(a.extension().unwrap(), "wav");
    }

    #[tokio::test]
    async fn test_kept_dir_survives_close() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("book.mp3");
        let work = WorkDir::kept(&output, "mp3").unwrap();
        let chunk = Chunk {
            id: ChunkId::new(0, 0),
            text: "Hello.".into(),
            markup: "<speak>Hello.</speak>".into(),
        };
        work.save_markup(std::slice::from_ref(&chunk)).await.unwrap();
        std::fs::write(work.manifest_path(), "file 'x'\n").unwrap();
        let dir = work.path().to_path_buf();
        let markup = work.markup_path(chunk.id);

        work.close();
        assert_eq!(dir, root.path().join("book.parts"));
        assert!(markup.exists());
        assert!(!dir.join(MANIFEST_NAME).exists());
    }

    #[test]
    fn test_kept_dir_absolute_for_relative_output() {
        let root = tempfile::tempdir_in(".").unwrap();
        let output = root.path().join("book.mp3");
        assert!(output.is_relative());

        let work = WorkDir::kept(&output, "mp3").unwrap();
        assert!(work.path().is_absolute());
        assert!(work.path().ends_with("book.parts"));
        assert!(work.path().is_dir());
        assert!(work.segment_path(ChunkId::new(0, 0)).is_absolute());
        work.close();
    }
}
