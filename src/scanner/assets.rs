//! Asset scanner: finds oversized raster images under the images dir.
//!
//! A file is a candidate when its extension is a source raster extension,
//! it is not protected (raw marker or glob), and its size is at least the
//! threshold. Candidates come back largest first.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::errors::{AoptError, Result};
use crate::core::paths::relative_posix;
use crate::scanner::patterns::ExtensionSet;
use crate::scanner::protection::ProtectionRegistry;
use crate::scanner::walker::{DirectoryWalker, WalkerConfig};

/// A discovered source asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    /// Path relative to the web root, `/`-separated.
    pub rel_path: String,
    /// Path relative to the images dir, `/`-separated (drives the width cap).
    pub images_rel_path: String,
    pub size_bytes: u64,
}

/// Result of one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub candidates: Vec<Candidate>,
    /// Source-format files seen, before protection and threshold filtering.
    pub files_seen: usize,
    /// Skipped by the raw marker or a protected pattern.
    pub protected: usize,
    pub below_threshold: usize,
}

impl ScanOutcome {
    pub fn total_bytes(&self) -> u64 {
        self.candidates.iter().map(|c| c.size_bytes).sum()
    }
}

/// Scans the images dir for candidates.
#[derive(Debug, Clone)]
pub struct AssetScanner {
    public_root: PathBuf,
    images_root: PathBuf,
    sources: ExtensionSet,
    protection: ProtectionRegistry,
}

impl AssetScanner {
    pub fn new(
        public_root: impl Into<PathBuf>,
        images_root: impl Into<PathBuf>,
        sources: ExtensionSet,
        protection: ProtectionRegistry,
    ) -> Self {
        Self {
            public_root: public_root.into(),
            images_root: images_root.into(),
            sources,
            protection,
        }
    }

    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        Ok(Self::new(
            config.public_root(root),
            config.images_root(root),
            ExtensionSet::new(&config.scanner.source_extensions),
            ProtectionRegistry::new(
                config.scanner.raw_marker.clone(),
                &config.scanner.protected_patterns,
            )?,
        ))
    }

    /// Walk the images dir and select candidates of at least `threshold_bytes`.
    pub fn scan(&self, threshold_bytes: u64) -> Result<ScanOutcome> {
        if !self.images_root.is_dir() {
            return Err(AoptError::MissingRoot {
                path: self.images_root.clone(),
            });
        }

        let walker = DirectoryWalker::new(WalkerConfig::new(&self.images_root));
        let entries = walker.walk_files(|p| self.sources.matches(p))?;

        let mut outcome = ScanOutcome {
            files_seen: entries.len(),
            ..ScanOutcome::default()
        };

        for entry in entries {
            let (Some(images_rel_path), Some(rel_path)) = (
                relative_posix(&self.images_root, &entry.path),
                relative_posix(&self.public_root, &entry.path),
            ) else {
                continue;
            };

            if self.protection.is_protected(&images_rel_path) {
                outcome.protected += 1;
                continue;
            }
            if entry.size_bytes < threshold_bytes {
                outcome.below_threshold += 1;
                continue;
            }

            outcome.candidates.push(Candidate {
                path: entry.path,
                rel_path,
                images_rel_path,
                size_bytes: entry.size_bytes,
            });
        }

        // Largest first; path order breaks ties so runs are reproducible.
        outcome.candidates.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.rel_path.cmp(&b.rel_path))
        });

        Ok(outcome)
    }
}
