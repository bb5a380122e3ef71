//! Source-image protection: the raw-marker filename convention and config-level globs.
//!
//! A file whose name contains the raw marker (default `_raw.`, as in
//! `hero_raw.png`) is a protected original kept at full fidelity and is never
//! selected, regardless of size. Projects can add globs over the path relative
//! to the images dir (e.g. `brand/**`) for the same effect.

#![allow(missing_docs)]

use regex::Regex;

use crate::core::errors::{AoptError, Result};

/// How an asset became protected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionSource {
    /// Filename contains the raw marker.
    RawMarker,
    /// Path matches a config-level glob pattern.
    ConfigPattern(String),
}

/// Compiled glob pattern for path matching.
#[derive(Debug, Clone)]
struct GlobPattern {
    original: String,
    compiled: Regex,
}

/// Registry deciding which candidate files are off-limits.
#[derive(Debug, Clone)]
pub struct ProtectionRegistry {
    raw_marker: String,
    config_patterns: Vec<GlobPattern>,
}

impl ProtectionRegistry {
    /// Create a registry from the raw marker and optional glob patterns.
    ///
    /// Patterns use shell-style globs: `*` matches within a path component,
    /// `**` matches across path components, `?` matches a single character.
    pub fn new(raw_marker: impl Into<String>, patterns: &[String]) -> Result<Self> {
        let config_patterns = patterns
            .iter()
            .map(|pat| {
                Ok(GlobPattern {
                    original: pat.clone(),
                    compiled: glob_to_regex(pat)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw_marker: raw_marker.into(),
            config_patterns,
        })
    }

    /// Registry with only the raw-marker rule.
    pub fn marker_only(raw_marker: impl Into<String>) -> Self {
        Self {
            raw_marker: raw_marker.into(),
            config_patterns: Vec::new(),
        }
    }

    /// Why `rel_path` (relative to the images dir, `/`-separated) is protected, if it is.
    pub fn protection_reason(&self, rel_path: &str) -> Option<ProtectionSource> {
        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        if file_name.contains(&self.raw_marker) {
            return Some(ProtectionSource::RawMarker);
        }
        self.config_patterns
            .iter()
            .find(|p| p.compiled.is_match(rel_path))
            .map(|p| ProtectionSource::ConfigPattern(p.original.clone()))
    }

    pub fn is_protected(&self, rel_path: &str) -> bool {
        self.protection_reason(rel_path).is_some()
    }
}

/// Validate that a glob pattern can be compiled.
pub fn validate_glob_pattern(pattern: &str) -> Result<()> {
    glob_to_regex(pattern).map(|_| ())
}

/// Convert a shell-style glob pattern to an anchored regex.
///
/// Supports:
/// - `**` → matches any path (including separators)
/// - `*`  → matches anything except `/`
/// - `?`  → matches a single character except `/`
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let normalized_pattern = pattern.replace('\\', "/");
    let mut regex_str = String::with_capacity(pattern.len() * 2);
    regex_str.push('^');

    let chars: Vec<char> = normalized_pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                if i + 2 < chars.len() && chars[i + 2] == '/' {
                    regex_str.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex_str.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex_str.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex_str.push_str("[^/]");
                i += 1;
            }
            c => {
                regex_str.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    regex_str.push('$');

    Regex::new(&regex_str).map_err(|err| AoptError::InvalidConfig {
        details: format!("invalid glob pattern {pattern:?}: {err}"),
    })
}
