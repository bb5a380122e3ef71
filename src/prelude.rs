//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use asset_optimizer::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, OptimizeOptions, OptionOverrides};
pub use crate::core::errors::{AoptError, Result};

// Logging
pub use crate::logger::jsonl::ActivityLog;

// Scanner
pub use crate::scanner::assets::{AssetScanner, Candidate};
pub use crate::scanner::corpus::{CorpusBuilder, TextCorpus};
pub use crate::scanner::walker::{DirectoryWalker, WalkerConfig};

// Transcode
pub use crate::transcode::encoder::{EncodeRequest, Encoder, FfmpegEncoder};
pub use crate::transcode::transcoder::{TranscodeAction, Transcoder};

// Rewrite
pub use crate::rewrite::replacements::{ReferenceStyle, ReplacementSet};
pub use crate::rewrite::rewriter::{CleanupDecision, ReferenceRewriter};

// Pipeline
pub use crate::pipeline::report::{AssetOutcome, RunReport, format_bytes};
pub use crate::pipeline::runner::Optimizer;
