//! Configuration system: optional TOML file + env var overrides + defaults.
//!
//! Two layers:
//! - [`Config`] is the file-level model (`aopt.toml` at the project root). It
//!   describes the project layout, the scan/corpus tables and the encoder.
//! - [`OptimizeOptions`] is the immutable per-run policy (threshold, quality,
//!   dry-run, delete, force). It is validated once at construction and then
//!   passed by value into every stage.
//!
//! Precedence is CLI flag > env var > file > default.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AoptError, Result};
use crate::rewrite::replacements::ReferenceStyle;

/// Default minimum original size in bytes.
pub const DEFAULT_THRESHOLD_BYTES: u64 = 512_000;
/// Default encoder quality.
pub const DEFAULT_QUALITY: u8 = 80;
/// Config file looked up at the project root when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "aopt.toml";

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub optimize: OptimizeConfig,
    pub scanner: ScannerConfig,
    pub corpus: CorpusConfig,
    pub encoder: EncoderConfig,
}

/// Project layout, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Web root whose relative paths form the URL reference forms.
    pub public_dir: PathBuf,
    /// Asset tree scanned for candidates, relative to `public_dir`.
    pub images_dir: PathBuf,
    /// Import alias for the project root used in source, e.g. `@/`.
    pub import_alias: String,
    /// Optional JSONL activity log.
    pub activity_log: Option<PathBuf>,
}

/// File-level defaults for the per-run policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OptimizeConfig {
    pub threshold_bytes: u64,
    pub quality: u32,
    pub delete_original: bool,
    pub force: bool,
}

/// Candidate selection rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Filenames containing this substring are never optimized.
    pub raw_marker: String,
    /// Raster extensions eligible for transcoding (lowercase, no dot).
    pub source_extensions: Vec<String>,
    /// Extra globs (relative to the images dir) that are never optimized.
    pub protected_patterns: Vec<String>,
}

/// Reference index rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory names pruned from the project walk.
    pub excluded_dirs: Vec<String>,
    /// Extensions of files eligible for reference rewriting.
    pub text_extensions: Vec<String>,
}

/// External encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EncoderConfig {
    pub program: String,
    pub target_extension: String,
    /// Width cap per top-level directory under the images dir.
    pub caps: BTreeMap<String, u32>,
    /// Cap for assets outside any listed category.
    pub default_cap: u32,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            images_dir: PathBuf::from("images"),
            import_alias: "@/".to_string(),
            activity_log: None,
        }
    }
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            quality: u32::from(DEFAULT_QUALITY),
            delete_original: true,
            force: false,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            raw_marker: "_raw.".to_string(),
            source_extensions: strings(&["png", "jpg", "jpeg"]),
            protected_patterns: Vec::new(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: strings(&["node_modules", ".next", ".git", "dist", "build", "out"]),
            text_extensions: strings(&[
                "md", "mdx", "ts", "tsx", "js", "jsx", "mjs", "cjs", "json", "yml", "yaml", "css",
                "scss", "txt",
            ]),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            target_extension: "webp".to_string(),
            caps: [("docs", 1400), ("blog", 1400), ("media", 2000)]
                .into_iter()
                .map(|(name, cap)| (name.to_string(), cap))
                .collect(),
            default_cap: 1600,
        }
    }
}

impl Config {
    /// Load config from `<root>/aopt.toml` or an explicit path, then apply env overrides.
    ///
    /// A missing default file is not an error; defaults are used. A missing
    /// explicit file is.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path_buf = explicit.map_or_else(|| root.join(DEFAULT_CONFIG_FILE), Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|e| AoptError::io(&path_buf, e))?;
            toml::from_str::<Self>(&raw)?
        } else if explicit.is_some() {
            return Err(AoptError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(|name| env::var(name).ok())?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Absolute web root under `root`.
    #[must_use]
    pub fn public_root(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.public_dir)
    }

    /// Absolute asset root under `root`.
    #[must_use]
    pub fn images_root(&self, root: &Path) -> PathBuf {
        self.public_root(root).join(&self.paths.images_dir)
    }

    /// How asset paths are spelled in source text.
    #[must_use]
    pub fn reference_style(&self) -> ReferenceStyle {
        let public_prefix = self
            .paths
            .public_dir
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        ReferenceStyle {
            public_prefix,
            import_alias: self.paths.import_alias.clone(),
        }
    }

    /// Combine file-level defaults with CLI overrides into the immutable run policy.
    pub fn resolve_options(&self, overrides: &OptionOverrides) -> Result<OptimizeOptions> {
        let quality = overrides.quality.unwrap_or(self.optimize.quality);
        OptimizeOptions::new(
            overrides
                .threshold_bytes
                .unwrap_or(self.optimize.threshold_bytes),
            validate_quality(quality)?,
            overrides.dry_run,
            self.optimize.delete_original && !overrides.keep_original,
            self.optimize.force || overrides.force,
        )
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut var = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = var("AOPT_THRESHOLD_BYTES") {
            self.optimize.threshold_bytes = parse_env("AOPT_THRESHOLD_BYTES", &raw)?;
        }
        if let Some(raw) = var("AOPT_QUALITY") {
            self.optimize.quality = parse_env("AOPT_QUALITY", &raw)?;
        }
        if let Some(raw) = var("AOPT_DELETE_ORIGINAL") {
            self.optimize.delete_original = parse_env("AOPT_DELETE_ORIGINAL", &raw)?;
        }
        if let Some(raw) = var("AOPT_FORCE") {
            self.optimize.force = parse_env("AOPT_FORCE", &raw)?;
        }
        if let Some(raw) = var("AOPT_ENCODER") {
            self.encoder.program = raw;
        }
        if let Some(raw) = var("AOPT_ACTIVITY_LOG") {
            self.paths.activity_log = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        for list in [
            &mut self.scanner.source_extensions,
            &mut self.corpus.text_extensions,
        ] {
            for ext in list.iter_mut() {
                *ext = normalize_extension(ext);
            }
            list.retain(|ext| !ext.is_empty());
        }
        self.encoder.target_extension = normalize_extension(&self.encoder.target_extension);
    }

    /// Structural checks only. `optimize` values are checked by
    /// [`Config::resolve_options`] after CLI overrides are layered on.
    fn validate(&self) -> Result<()> {
        if self.paths.public_dir.as_os_str().is_empty() {
            return Err(AoptError::InvalidConfig {
                details: "paths.public_dir must not be empty".to_string(),
            });
        }

        if self.scanner.raw_marker.is_empty() {
            return Err(AoptError::InvalidConfig {
                details: "scanner.raw_marker must not be empty".to_string(),
            });
        }

        if self.scanner.source_extensions.is_empty() {
            return Err(AoptError::InvalidConfig {
                details: "scanner.source_extensions must list at least one extension".to_string(),
            });
        }

        if self.encoder.program.trim().is_empty() {
            return Err(AoptError::InvalidConfig {
                details: "encoder.program must not be empty".to_string(),
            });
        }

        if self.encoder.target_extension.is_empty() {
            return Err(AoptError::InvalidConfig {
                details: "encoder.target_extension must not be empty".to_string(),
            });
        }

        // An output that is itself a candidate would be re-encoded forever.
        if self
            .scanner
            .source_extensions
            .contains(&self.encoder.target_extension)
        {
            return Err(AoptError::InvalidConfig {
                details: format!(
                    "encoder.target_extension ({}) must not be a scanner source extension",
                    self.encoder.target_extension
                ),
            });
        }

        if self.encoder.default_cap == 0 {
            return Err(AoptError::InvalidConfig {
                details: "encoder.default_cap must be > 0".to_string(),
            });
        }
        for (category, cap) in &self.encoder.caps {
            if *cap == 0 {
                return Err(AoptError::InvalidConfig {
                    details: format!("encoder.caps.{category} must be > 0"),
                });
            }
        }

        for pattern in &self.scanner.protected_patterns {
            crate::scanner::protection::validate_glob_pattern(pattern)?;
        }

        Ok(())
    }
}

/// Values supplied on the command line, layered over [`OptimizeConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    pub threshold_bytes: Option<u64>,
    pub quality: Option<u32>,
    pub dry_run: bool,
    pub keep_original: bool,
    pub force: bool,
}

impl OptionOverrides {
    /// Validate explicitly supplied numeric flags.
    ///
    /// Runs before any config file is read so a bad flag never touches disk.
    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.threshold_bytes {
            validate_threshold(threshold)?;
        }
        if let Some(quality) = self.quality {
            validate_quality(quality)?;
        }
        Ok(())
    }
}

/// Immutable per-run policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimizeOptions {
    threshold_bytes: u64,
    quality: u8,
    dry_run: bool,
    delete_original: bool,
    force: bool,
}

impl OptimizeOptions {
    /// Build a validated policy.
    pub fn new(
        threshold_bytes: u64,
        quality: u8,
        dry_run: bool,
        delete_original: bool,
        force: bool,
    ) -> Result<Self> {
        validate_threshold(threshold_bytes)?;
        validate_quality(u32::from(quality))?;
        Ok(Self {
            threshold_bytes,
            quality,
            dry_run,
            delete_original,
            force,
        })
    }

    pub const fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    pub const fn quality(&self) -> u8 {
        self.quality
    }

    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub const fn delete_original(&self) -> bool {
        self.delete_original
    }

    pub const fn force(&self) -> bool {
        self.force
    }
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            quality: DEFAULT_QUALITY,
            dry_run: false,
            delete_original: true,
            force: false,
        }
    }
}

/// Threshold must be a positive byte count.
pub fn validate_threshold(threshold_bytes: u64) -> Result<()> {
    if threshold_bytes == 0 {
        return Err(AoptError::InvalidConfig {
            details: "threshold must be a positive number of bytes, got 0".to_string(),
        });
    }
    Ok(())
}

/// Quality must lie in `1..=100`.
pub fn validate_quality(quality: u32) -> Result<u8> {
    match u8::try_from(quality) {
        Ok(q) if (1..=100).contains(&q) => Ok(q),
        _ => Err(AoptError::InvalidConfig {
            details: format!("quality must be in [1, 100], got {quality}"),
        }),
    }
}

fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| AoptError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
