//! Transcoder: produces the compressed sibling of one candidate.
//!
//! Decision order for each candidate:
//! 1. Output already exists and `force` is off -> reuse it, report its size.
//! 2. Dry run -> report what would be written; touch nothing.
//! 3. Encode into `<output>.tmp.<ext>`, then rename into place. On failure the
//!    temp file is removed and the whole run aborts.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::OptimizeOptions;
use crate::core::errors::{AoptError, Result};
use crate::core::paths::join_posix;
use crate::scanner::assets::Candidate;
use crate::scanner::patterns::{CapTable, OutputNaming};
use crate::transcode::encoder::{EncodeRequest, Encoder};

/// What the transcoder did for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeAction {
    /// The encoder ran and the output was moved into place.
    Encoded,
    /// An output from an earlier run was kept as is.
    ReusedExisting,
    /// Dry run: the encoder would have run.
    Simulated,
}

/// Result of transcoding one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    pub output_path: PathBuf,
    /// Output path relative to the web root, `/`-separated.
    pub output_rel: String,
    pub max_width: u32,
    pub action: TranscodeAction,
    /// Size of the artifact on disk; `None` when nothing exists yet (dry run).
    pub output_size: Option<u64>,
}

/// Derives output paths and caps, and drives the encoder.
pub struct Transcoder<'e> {
    encoder: &'e dyn Encoder,
    public_root: PathBuf,
    caps: CapTable,
    naming: OutputNaming,
}

impl<'e> Transcoder<'e> {
    pub fn new(
        encoder: &'e dyn Encoder,
        public_root: impl Into<PathBuf>,
        caps: CapTable,
        naming: OutputNaming,
    ) -> Self {
        Self {
            encoder,
            public_root: public_root.into(),
            caps,
            naming,
        }
    }

    /// Output path (relative to the web root) for a candidate.
    pub fn output_rel(&self, candidate: &Candidate) -> Result<String> {
        self.naming
            .output_rel(&candidate.rel_path)
            .ok_or_else(|| AoptError::Runtime {
                details: format!(
                    "candidate {} has no convertible extension",
                    candidate.rel_path
                ),
            })
    }

    pub fn cap_for(&self, candidate: &Candidate) -> u32 {
        self.caps.cap_for(&candidate.images_rel_path)
    }

    pub fn transcode(
        &self,
        candidate: &Candidate,
        options: &OptimizeOptions,
    ) -> Result<TranscodeOutcome> {
        let output_rel = self.output_rel(candidate)?;
        let output_path = join_posix(&self.public_root, &output_rel);
        let max_width = self.cap_for(candidate);

        if !options.force()
            && let Some(size) = file_size(&output_path)?
        {
            return Ok(TranscodeOutcome {
                output_path,
                output_rel,
                max_width,
                action: TranscodeAction::ReusedExisting,
                output_size: Some(size),
            });
        }

        if options.dry_run() {
            return Ok(TranscodeOutcome {
                output_path,
                output_rel,
                max_width,
                action: TranscodeAction::Simulated,
                output_size: None,
            });
        }

        let tmp_path = temp_path(&output_path, self.naming.target_extension());
        let request = EncodeRequest {
            input: &candidate.path,
            output: &tmp_path,
            max_width,
            quality: options.quality(),
        };

        if let Err(err) = self.encoder.encode(&request) {
            remove_if_exists(&tmp_path);
            return Err(match err {
                AoptError::Transcode { .. } => err,
                other => AoptError::Transcode {
                    path: candidate.path.clone(),
                    details: other.to_string(),
                },
            });
        }

        if !tmp_path.is_file() {
            return Err(AoptError::Transcode {
                path: candidate.path.clone(),
                details: format!("{} reported success but wrote no output", self.encoder.name()),
            });
        }

        fs::rename(&tmp_path, &output_path).map_err(|e| {
            remove_if_exists(&tmp_path);
            AoptError::io(&output_path, e)
        })?;

        let output_size = file_size(&output_path)?;
        Ok(TranscodeOutcome {
            output_path,
            output_rel,
            max_width,
            action: TranscodeAction::Encoded,
            output_size,
        })
    }
}

/// `cover.webp` -> `cover.webp.tmp.webp`; the encoder picks the format from the name.
fn temp_path(output: &Path, target_extension: &str) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(format!(".tmp.{target_extension}"));
    PathBuf::from(name)
}

fn file_size(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AoptError::io(path, e)),
    }
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        let _ = fs::remove_file(path);
    }
}
