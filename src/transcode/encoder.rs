//! Encoder capability: "transcode `input` into `output`, width-capped, at `quality`".
//!
//! The pipeline only ever talks to [`Encoder`]. [`FfmpegEncoder`] is the
//! production implementation; tests substitute in-process fakes.

#![allow(missing_docs)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::core::errors::{AoptError, Result};

/// One encode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    /// Never upscale; constrain width to this, preserving aspect ratio.
    pub max_width: u32,
    pub quality: u8,
}

/// Something that can produce a compressed image file.
///
/// Implementations must either leave a complete file at `request.output` and
/// return `Ok`, or return an error. Cleaning up a partial output is the
/// caller's job.
pub trait Encoder {
    /// Short label for logs and reports.
    fn name(&self) -> &str;

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<()>;
}

/// Encodes through an external `ffmpeg` binary with `libwebp`.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Scale filter: cap width at `max_width`, keep aspect with an even height.
    pub fn scale_filter(max_width: u32) -> String {
        format!("scale='if(gt(iw,{max_width}),{max_width},iw)':-2")
    }

    /// Full argument vector for one request.
    pub fn args(request: &EncodeRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(request.input.as_os_str().to_owned());
        args.push("-vf".into());
        args.push(Self::scale_filter(request.max_width).into());
        for arg in ["-f", "webp", "-c:v", "libwebp", "-q:v"] {
            args.push(arg.into());
        }
        args.push(request.quality.to_string().into());
        args.push("-pix_fmt".into());
        // Keeps the alpha channel of transparent PNGs.
        args.push("yuva420p".into());
        args.push(request.output.as_os_str().to_owned());
        args
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<()> {
        let output = Command::new(&self.program)
            .args(Self::args(request))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| AoptError::Transcode {
                path: request.input.to_path_buf(),
                details: format!("failed to launch {}: {e}", self.program.display()),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr.trim().lines().last().unwrap_or("").to_string();
        Err(AoptError::Transcode {
            path: request.input.to_path_buf(),
            details: if tail.is_empty() {
                format!("{} exited with {}", self.program.display(), output.status)
            } else {
                format!(
                    "{} exited with {}: {tail}",
                    self.program.display(),
                    output.status
                )
            },
        })
    }
}
