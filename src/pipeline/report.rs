//! Run report: per-asset outcomes plus the aggregate counters printed at the end.
//!
//! Counters only ever grow while a run is in progress. The rendered lines are
//! plain strings; coloring is left to the front end.

#![allow(missing_docs)]

use std::path::PathBuf;

use serde::Serialize;

use crate::core::config::OptimizeOptions;
use crate::rewrite::rewriter::CleanupDecision;
use crate::scanner::assets::ScanOutcome;
use crate::transcode::transcoder::TranscodeAction;

/// Why an original survived a run that was allowed to delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeptOriginal {
    /// Source path relative to the web root.
    pub path: String,
    pub reason: String,
    /// First text file that still held an old reference form.
    pub referenced_in: PathBuf,
}

/// Everything that happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetOutcome {
    pub source: String,
    pub output: String,
    pub original_size: u64,
    /// Zero when no output exists yet (dry run).
    pub output_size: u64,
    pub max_width: u32,
    pub action: TranscodeAction,
    pub files_updated: Vec<PathBuf>,
    pub cleanup: CleanupDecision,
}

/// Aggregate result of one optimizer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub delete_original: bool,
    pub threshold_bytes: u64,
    pub quality: u8,
    /// Source-format files under the images dir.
    pub files_scanned: usize,
    pub protected_skipped: usize,
    pub below_threshold: usize,
    pub converted: usize,
    pub encoded: usize,
    pub reused: usize,
    pub files_updated: usize,
    pub original_bytes: u64,
    pub optimized_bytes: u64,
    pub estimated_savings: u64,
    pub deleted: usize,
    pub would_delete: usize,
    pub kept_originals: Vec<KeptOriginal>,
    pub assets: Vec<AssetOutcome>,
}

impl RunReport {
    pub fn new(options: &OptimizeOptions) -> Self {
        Self {
            dry_run: options.dry_run(),
            delete_original: options.delete_original(),
            threshold_bytes: options.threshold_bytes(),
            quality: options.quality(),
            files_scanned: 0,
            protected_skipped: 0,
            below_threshold: 0,
            converted: 0,
            encoded: 0,
            reused: 0,
            files_updated: 0,
            original_bytes: 0,
            optimized_bytes: 0,
            estimated_savings: 0,
            deleted: 0,
            would_delete: 0,
            kept_originals: Vec::new(),
            assets: Vec::new(),
        }
    }

    /// Copy the scan counters for files that were looked at but not selected.
    pub fn record_scan(&mut self, scan: &ScanOutcome) {
        self.files_scanned = scan.files_seen;
        self.protected_skipped = scan.protected;
        self.below_threshold = scan.below_threshold;
    }

    /// Fold one finished candidate into the counters.
    pub fn record(&mut self, outcome: AssetOutcome) {
        self.converted += 1;
        match outcome.action {
            TranscodeAction::Encoded => self.encoded += 1,
            TranscodeAction::ReusedExisting => self.reused += 1,
            TranscodeAction::Simulated => {}
        }
        self.files_updated += outcome.files_updated.len();
        self.original_bytes = self.original_bytes.saturating_add(outcome.original_size);
        self.optimized_bytes = self.optimized_bytes.saturating_add(outcome.output_size);
        self.estimated_savings = self.original_bytes.saturating_sub(self.optimized_bytes);

        match &outcome.cleanup {
            CleanupDecision::Deleted => self.deleted += 1,
            CleanupDecision::WouldDelete => self.would_delete += 1,
            CleanupDecision::KeptStillReferenced { referenced_in } => {
                self.kept_originals.push(KeptOriginal {
                    path: outcome.source.clone(),
                    reason: "still referenced".to_string(),
                    referenced_in: referenced_in.clone(),
                });
            }
            CleanupDecision::KeptByPolicy => {}
        }
        self.assets.push(outcome);
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Message printed when nothing crosses the threshold.
    pub fn nothing_to_do_line(&self, images_label: &str, raw_marker: &str) -> String {
        format!(
            "No images >= {} to optimize under {images_label} (excluding *{raw_marker}*).",
            format_bytes(self.threshold_bytes)
        )
    }

    /// Closing summary, one line per entry.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Optimized images: {}", self.converted),
            format!("Text files updated: {}", self.files_updated),
            format!("Original bytes (sum): {}", format_bytes(self.original_bytes)),
            format!("Optimized bytes (sum): {}", format_bytes(self.optimized_bytes)),
            format!("Estimated savings: {}", format_bytes(self.estimated_savings)),
        ];
        if self.delete_original {
            lines.push(format!("Deleted originals: {}", self.deleted));
            if self.dry_run {
                lines.push(format!("Would delete originals: {}", self.would_delete));
            }
            if !self.kept_originals.is_empty() {
                lines.push("Kept originals (still referenced):".to_string());
                lines.extend(self.kept_originals.iter().map(|k| format!("- {}", k.path)));
            }
        } else {
            lines.push("Kept originals: --keep-original".to_string());
        }
        lines
    }
}

impl AssetOutcome {
    /// Per-candidate progress line.
    pub fn line(&self, dry_run: bool) -> String {
        format!(
            "{}{} -> {}  {} -> {} (max {}w)",
            if dry_run { "[dry-run] " } else { "" },
            self.source,
            self.output,
            format_bytes(self.original_size),
            format_bytes(self.output_size),
            self.max_width
        )
    }
}

/// Human-readable size: `B`, then `KB` with one decimal, then `MB`/`GB` with two (base 1024).
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;

    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let kb = bytes as f64 / KIB;
    if kb < KIB {
        return format!("{kb:.1}KB");
    }
    let mb = kb / KIB;
    if mb < KIB {
        return format!("{mb:.2}MB");
    }
    format!("{:.2}GB", mb / KIB)
}
