//! Sequential directory walker with pruned directory names and symlink safety.
//!
//! Both the asset scan and the reference index walk through here. The asset
//! scan prunes nothing; the reference index prunes dependency caches, VCS
//! metadata and build output so their contents are never read.
//!
//! Entries within a directory are visited in byte order of their names, so a
//! walk over an unchanged tree always yields the same sequence.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{AoptError, Result};

/// Walker configuration.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub root: PathBuf,
    /// Directory names skipped entirely (matched against the final component).
    pub excluded_dir_names: HashSet<String>,
}

impl WalkerConfig {
    /// Walk everything under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded_dir_names: HashSet::new(),
        }
    }

    #[must_use]
    pub fn excluding<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_dir_names
            .extend(names.into_iter().map(Into::into));
        self
    }
}

/// A regular file discovered during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Recursive walker.
///
/// Safety invariants:
/// - Symlinks are never followed, so the walk cannot loop and always ends
/// - Excluded directory names are pruned before they are read
/// - No depth cutoff: every non-excluded subtree is visited however deep
/// - Read failures are returned, never skipped: a silently missing subtree
///   could hide a reference and make a deletion look safe
pub struct DirectoryWalker {
    config: WalkerConfig,
}

impl DirectoryWalker {
    pub fn new(config: WalkerConfig) -> Self {
        Self { config }
    }

    /// Collect every regular file under the root accepted by `filter`.
    pub fn walk_files<F>(&self, mut filter: F) -> Result<Vec<FileEntry>>
    where
        F: FnMut(&Path) -> bool,
    {
        let mut out = Vec::new();
        self.visit(&self.config.root, &mut filter, &mut out)?;
        Ok(out)
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    fn visit<F>(
        &self,
        dir: &Path,
        filter: &mut F,
        out: &mut Vec<FileEntry>,
    ) -> Result<()>
    where
        F: FnMut(&Path) -> bool,
    {
        let mut children = fs::read_dir(dir)
            .map_err(|e| AoptError::io(dir, e))?
            .map(|entry| entry.map_err(|e| AoptError::io(dir, e)))
            .collect::<Result<Vec<_>>>()?;
        children.sort_by_key(fs::DirEntry::file_name);

        for entry in children {
            let path = entry.path();
            let ft = entry.file_type().map_err(|e| AoptError::io(&path, e))?;

            if ft.is_symlink() {
                continue;
            }
            let meta = entry.metadata().map_err(|e| AoptError::io(&path, e))?;

            if meta.is_dir() {
                let name = entry.file_name();
                if self
                    .config
                    .excluded_dir_names
                    .contains(name.to_string_lossy().as_ref())
                {
                    continue;
                }
                self.visit(&path, filter, out)?;
            } else if meta.is_file() && filter(&path) {
                out.push(FileEntry {
                    path,
                    size_bytes: meta.len(),
                });
            }
        }
        Ok(())
    }
}
