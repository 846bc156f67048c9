//! # Tree Enumerator
//!
//! Lists every regular file under a source root.
//!
//! Traversal is depth-first with entries sorted by file name, so two walks
//! of an unchanged tree yield the same order. Directories are descended
//! into but never yielded. Symbolic links are not followed into
//! directories; a link pointing at a regular file is yielded like the file
//! itself. Any read error aborts the walk.

use crate::progress::{ProgressTracker, RunToken};
use crate::{Result, SyncError};
use core_async::sync::mpsc::UnboundedSender;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

pub struct TreeEnumerator {
    root: PathBuf,
}

impl TreeEnumerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree. Each call starts a fresh walk.
    pub fn files(&self) -> impl Iterator<Item = Result<PathBuf>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => is_file(&entry).then(|| Ok(entry.into_path())),
                Err(err) => Some(Err(self.enumeration_error(err))),
            })
    }

    fn enumeration_error(&self, err: walkdir::Error) -> SyncError {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        SyncError::Enumeration {
            path,
            source: err.into(),
        }
    }

    /// Push every file onto `queue`, counting each in `tracker` before it
    /// is sent.
    ///
    /// Blocking; run it on a blocking thread. Stops early without error if
    /// the run stops being current or every receiver is gone. Returns the
    /// number of files queued.
    pub(crate) fn feed(
        &self,
        queue: &UnboundedSender<PathBuf>,
        tracker: &ProgressTracker,
        token: RunToken,
    ) -> Result<u64> {
        let mut queued = 0;

        for file in self.files() {
            if !tracker.is_current(token) {
                debug!(queued, "Run no longer active, stopping enumeration");
                break;
            }

            let file = file?;
            tracker.record_discovered();

            if queue.send(file).is_err() {
                // Counted but never processed; the invariant only needs
                // total to be an upper bound.
                warn!("Task queue closed during enumeration");
                break;
            }
            queued += 1;
        }

        debug!(root = %self.root.display(), queued, "Enumeration finished");
        Ok(queued)
    }
}

fn is_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    file_type.is_symlink() && entry.path().is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lists_files_recursively_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("b/inner/2.flac"), b"x").unwrap();
        fs::write(root.join("b/1.mp3"), b"x").unwrap();
        fs::write(root.join("a/cover.jpg"), b"x").unwrap();
        fs::write(root.join("z.txt"), b"x").unwrap();

        let enumerator = TreeEnumerator::new(root);
        let files: Vec<PathBuf> = enumerator
            .files()
            .map(|file| file.unwrap().strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            files,
            vec![
                PathBuf::from("a/cover.jpg"),
                PathBuf::from("b/1.mp3"),
                PathBuf::from("b/inner/2.flac"),
                PathBuf::from("z.txt"),
            ]
        );

        // Restartable: a second call walks again from the start
        assert_eq!(enumerator.files().count(), 4);
    }

    #[test]
    fn test_missing_root_is_enumeration_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");

        let enumerator = TreeEnumerator::new(&missing);
        let mut files = enumerator.files();
        match files.next() {
            Some(Err(SyncError::Enumeration { path, .. })) => assert_eq!(path, missing),
            other => panic!("expected enumeration error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("hidden.mp3"), b"x").unwrap();
        fs::write(root.join("real.mp3"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("real.mp3"), root.join("link.mp3")).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("dirlink")).unwrap();

        let names: Vec<String> = TreeEnumerator::new(&root)
            .files()
            .map(|file| {
                file.unwrap()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        assert_eq!(names, vec!["link.mp3", "real.mp3"]);
    }
}
