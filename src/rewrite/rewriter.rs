//! Reference rewriter and original cleanup.
//!
//! Two phases per candidate, both over the run's single [`TextCorpus`] snapshot:
//! 1. Rewrite: apply the candidate's replacement pairs to every corpus file.
//! 2. Verify: scan the corpus again for any old form. Only when none remains
//!    (and policy allows) is the original deleted.
//!
//! The verify pass can only find references the three canonical forms did
//! not cover, e.g. paths assembled at runtime from fragments. Those originals
//! are kept and reported so a human can resolve them.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::OptimizeOptions;
use crate::core::errors::{AoptError, Result};
use crate::rewrite::replacements::ReplacementSet;
use crate::scanner::corpus::TextCorpus;

/// What happened to the original after rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum CleanupDecision {
    /// Original removed from disk.
    Deleted,
    /// Dry run: the original would have been removed.
    WouldDelete,
    /// An old form is still present in `referenced_in`.
    KeptStillReferenced { referenced_in: PathBuf },
    /// `--keep-original`: never deleted, never checked.
    KeptByPolicy,
}

impl CleanupDecision {
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted | Self::WouldDelete)
    }
}

/// Rewrites references across a corpus and decides on deletion.
pub struct ReferenceRewriter<'c> {
    corpus: &'c TextCorpus,
}

impl<'c> ReferenceRewriter<'c> {
    pub fn new(corpus: &'c TextCorpus) -> Self {
        Self { corpus }
    }

    /// Apply `set` to every corpus file; returns the files whose content changed.
    ///
    /// In dry-run mode change detection still runs but nothing is written.
    pub fn rewrite(&self, set: &ReplacementSet, dry_run: bool) -> Result<Vec<PathBuf>> {
        let mut changed = Vec::new();
        for path in self.corpus.files() {
            let before = TextCorpus::read(path)?;
            let Some(after) = set.apply(&before) else {
                continue;
            };
            if !dry_run {
                write_in_place(path, &after)?;
            }
            changed.push(path.clone());
        }
        Ok(changed)
    }

    /// First corpus file that still contains an old form of `set`.
    ///
    /// With `simulate_rewrite` the check runs against the content the rewrite
    /// pass would have produced, so a dry run reaches the same verdict as a
    /// live run without writing anything.
    pub fn find_remaining_reference(
        &self,
        set: &ReplacementSet,
        simulate_rewrite: bool,
    ) -> Result<Option<PathBuf>> {
        for path in self.corpus.files() {
            let content = TextCorpus::read(path)?;
            let effective = if simulate_rewrite {
                set.apply(&content).unwrap_or(content)
            } else {
                content
            };
            if set.references_old(&effective) {
                return Ok(Some(path.clone()));
            }
        }
        Ok(None)
    }

    /// Decide whether `original` can go, and remove it if so.
    pub fn cleanup(
        &self,
        original: &Path,
        set: &ReplacementSet,
        options: &OptimizeOptions,
    ) -> Result<CleanupDecision> {
        if !options.delete_original() {
            return Ok(CleanupDecision::KeptByPolicy);
        }

        if let Some(referenced_in) = self.find_remaining_reference(set, options.dry_run())? {
            return Ok(CleanupDecision::KeptStillReferenced { referenced_in });
        }

        if options.dry_run() {
            return Ok(CleanupDecision::WouldDelete);
        }

        fs::remove_file(original).map_err(|e| AoptError::io(original, e))?;
        Ok(CleanupDecision::Deleted)
    }
}

/// Overwrite a corpus file, keeping its permissions.
fn write_in_place(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content).map_err(|e| AoptError::io(path, e))
}
