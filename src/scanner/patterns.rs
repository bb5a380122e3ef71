//! Extension tables, asset categories and output naming.
//!
//! - [`ExtensionSet`]: case-insensitive extension membership.
//! - [`CapTable`]: width cap per asset category (first directory under the images dir).
//! - [`OutputNaming`]: regex-based rewrite of a source extension to the target one.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use regex::Regex;

use crate::core::config::EncoderConfig;
use crate::core::errors::{AoptError, Result};

/// Media and archive extensions never treated as text, whatever the allow-list says.
pub const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "avif", "gif", "mp4", "mov", "webm", "zip", "pdf",
];

/// Case-insensitive set of file extensions (stored lowercase, without the dot).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    exts: HashSet<String>,
}

impl ExtensionSet {
    pub fn new<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exts: exts
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Whether `path` has one of the extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.exts.contains(&e.to_ascii_lowercase()))
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.exts.contains(&ext.to_ascii_lowercase())
    }

    /// Sorted list, for building patterns deterministically.
    pub fn sorted(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.exts.iter().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    pub fn is_empty(&self) -> bool {
        self.exts.is_empty()
    }
}

/// Text allow-list minus the binary deny-list.
pub fn text_extension_set<S: AsRef<str>>(allowed: &[S]) -> ExtensionSet {
    let binary = ExtensionSet::new(BINARY_EXTENSIONS);
    ExtensionSet::new(
        allowed
            .iter()
            .map(AsRef::as_ref)
            .filter(|ext| !binary.contains(ext)),
    )
}

/// Width cap lookup keyed by asset category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapTable {
    caps: BTreeMap<String, u32>,
    default_cap: u32,
}

impl CapTable {
    pub fn new(caps: BTreeMap<String, u32>, default_cap: u32) -> Self {
        Self { caps, default_cap }
    }

    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(config.caps.clone(), config.default_cap)
    }

    /// Category of an asset: its first directory under the images dir, if listed.
    pub fn category<'a>(&self, rel_to_images: &'a str) -> Option<&'a str> {
        let (first, _) = rel_to_images.split_once('/')?;
        self.caps.contains_key(first).then_some(first)
    }

    /// Largest width the encoder may produce for this asset.
    pub fn cap_for(&self, rel_to_images: &str) -> u32 {
        self.category(rel_to_images)
            .and_then(|c| self.caps.get(c).copied())
            .unwrap_or(self.default_cap)
    }

    pub fn default_cap(&self) -> u32 {
        self.default_cap
    }
}

impl Default for CapTable {
    fn default() -> Self {
        Self::from_config(&EncoderConfig::default())
    }
}

/// Derives the output name of a source asset.
#[derive(Debug, Clone)]
pub struct OutputNaming {
    source_ext: Regex,
    target_extension: String,
}

impl OutputNaming {
    /// Build from the source extension set and the target extension (no dot).
    pub fn new(sources: &ExtensionSet, target_extension: &str) -> Result<Self> {
        if sources.is_empty() {
            return Err(AoptError::InvalidConfig {
                details: "no source extensions to rewrite".to_string(),
            });
        }
        let alternation = sources
            .sorted()
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let source_ext = Regex::new(&format!(r"(?i)\.(?:{alternation})$")).map_err(|err| {
            AoptError::InvalidConfig {
                details: format!("invalid source extension pattern: {err}"),
            }
        })?;
        Ok(Self {
            source_ext,
            target_extension: target_extension.trim_start_matches('.').to_string(),
        })
    }

    /// `images/blog/cover.PNG` -> `images/blog/cover.webp`.
    ///
    /// Returns `None` if the path does not end in a source extension.
    pub fn output_rel(&self, rel: &str) -> Option<String> {
        let m = self.source_ext.find(rel)?;
        Some(format!("{}.{}", &rel[..m.start()], self.target_extension))
    }

    pub fn target_extension(&self) -> &str {
        &self.target_extension
    }
}
