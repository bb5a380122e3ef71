//! Optimizer run loop.
//!
//! Resolve roots, scan once, build the text corpus once, then for each
//! candidate (largest first): transcode, rewrite references, decide on the
//! original. The first error aborts the run; whatever was already written
//! stays written. Output collisions are caught before anything is written.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::config::{Config, OptimizeOptions};
use crate::core::errors::{AoptError, Result};
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};
use crate::pipeline::report::{AssetOutcome, RunReport};
use crate::rewrite::replacements::{ReferenceStyle, ReplacementSet};
use crate::rewrite::rewriter::{CleanupDecision, ReferenceRewriter};
use crate::scanner::assets::{AssetScanner, Candidate};
use crate::scanner::corpus::CorpusBuilder;
use crate::scanner::patterns::{CapTable, ExtensionSet, OutputNaming};
use crate::transcode::encoder::{Encoder, FfmpegEncoder};
use crate::transcode::transcoder::{TranscodeAction, Transcoder};

/// One configured optimization run over a project root.
pub struct Optimizer {
    root: PathBuf,
    config: Config,
    options: OptimizeOptions,
    encoder: Box<dyn Encoder>,
    log: ActivityLog,
}

impl Optimizer {
    /// Optimizer using the configured external encoder and no activity log.
    pub fn new(root: impl Into<PathBuf>, config: Config, options: OptimizeOptions) -> Self {
        let encoder = FfmpegEncoder::new(&config.encoder.program);
        Self {
            root: root.into(),
            config,
            options,
            encoder: Box::new(encoder),
            log: ActivityLog::disabled(),
        }
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: Box<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    #[must_use]
    pub fn with_activity_log(mut self, log: ActivityLog) -> Self {
        self.log = log;
        self
    }

    pub fn options(&self) -> &OptimizeOptions {
        &self.options
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run without progress callbacks.
    pub fn run(&mut self) -> Result<RunReport> {
        self.run_with(|_| {})
    }

    /// Run, calling `on_asset` after each candidate is fully processed.
    pub fn run_with(&mut self, on_asset: impl FnMut(&AssetOutcome)) -> Result<RunReport> {
        let result = self.run_inner(on_asset);
        match &result {
            Ok(report) => {
                let mut entry = LogEntry::new(EventType::RunComplete, Severity::Info);
                entry.files = Some(report.files_updated);
                entry.size = Some(report.original_bytes);
                entry.new_size = Some(report.optimized_bytes);
                entry.dry_run = Some(report.dry_run);
                entry.details = Some(format!(
                    "converted={} deleted={} kept={}",
                    report.converted,
                    report.deleted,
                    report.kept_originals.len()
                ));
                self.log.record(&entry);
            }
            Err(err) => self.log.record(&LogEntry::error(err)),
        }
        self.log.flush();
        result
    }

    fn run_inner(&mut self, mut on_asset: impl FnMut(&AssetOutcome)) -> Result<RunReport> {
        let public_root = self.config.public_root(&self.root);
        let images_root = self.config.images_root(&self.root);
        for dir in [&public_root, &images_root] {
            if !dir.is_dir() {
                return Err(AoptError::MissingRoot { path: dir.clone() });
            }
        }

        let scan = AssetScanner::from_config(&self.config, &self.root)?
            .scan(self.options.threshold_bytes())?;

        let mut start = LogEntry::new(EventType::RunStart, Severity::Info);
        start.dry_run = Some(self.options.dry_run());
        start.size = Some(scan.total_bytes());
        start.details = Some(format!(
            "candidates={} scanned={} protected={} below_threshold={} config_hash={}",
            scan.candidates.len(),
            scan.files_seen,
            scan.protected,
            scan.below_threshold,
            self.config.stable_hash()?
        ));
        self.log.record(&start);

        let mut report = RunReport::new(&self.options);
        report.record_scan(&scan);
        if scan.candidates.is_empty() {
            return Ok(report);
        }

        let naming = OutputNaming::new(
            &ExtensionSet::new(&self.config.scanner.source_extensions),
            &self.config.encoder.target_extension,
        )?;
        let transcoder = Transcoder::new(
            self.encoder.as_ref(),
            &public_root,
            CapTable::from_config(&self.config.encoder),
            naming,
        );
        check_output_collisions(&transcoder, &scan.candidates)?;

        let corpus = CorpusBuilder::from_config(&self.config, &self.root).build()?;
        let step = CandidateStep {
            root: &self.root,
            options: &self.options,
            style: self.config.reference_style(),
            transcoder: &transcoder,
            rewriter: ReferenceRewriter::new(&corpus),
        };

        for candidate in &scan.candidates {
            let outcome = step.process(candidate, &mut self.log)?;
            on_asset(&outcome);
            report.record(outcome);
        }

        Ok(report)
    }
}

/// Per-candidate work, sharing the run's corpus and transcoder.
struct CandidateStep<'a> {
    root: &'a Path,
    options: &'a OptimizeOptions,
    style: ReferenceStyle,
    transcoder: &'a Transcoder<'a>,
    rewriter: ReferenceRewriter<'a>,
}

impl CandidateStep<'_> {
    fn process(&self, candidate: &Candidate, log: &mut ActivityLog) -> Result<AssetOutcome> {
        let transcoded = self.transcoder.transcode(candidate, self.options)?;

        let mut entry = LogEntry::asset(
            match transcoded.action {
                TranscodeAction::ReusedExisting => EventType::AssetReused,
                TranscodeAction::Encoded | TranscodeAction::Simulated => EventType::AssetEncoded,
            },
            &candidate.rel_path,
        );
        entry.new_path = Some(transcoded.output_rel.clone());
        entry.size = Some(candidate.size_bytes);
        entry.new_size = transcoded.output_size;
        entry.cap = Some(transcoded.max_width);
        entry.dry_run = Some(self.options.dry_run());
        log.record(&entry);

        let set = ReplacementSet::new(&self.style, &candidate.rel_path, &transcoded.output_rel);
        let changed = self.rewriter.rewrite(&set, self.options.dry_run())?;
        if !changed.is_empty() {
            let mut entry = LogEntry::asset(EventType::ReferencesRewritten, &candidate.rel_path);
            entry.new_path = Some(transcoded.output_rel.clone());
            entry.files = Some(changed.len());
            entry.dry_run = Some(self.options.dry_run());
            log.record(&entry);
        }

        let cleanup = match self.rewriter.cleanup(&candidate.path, &set, self.options)? {
            CleanupDecision::KeptStillReferenced { referenced_in } => {
                CleanupDecision::KeptStillReferenced {
                    referenced_in: self.display_path(referenced_in),
                }
            }
            other => other,
        };
        log.record(&cleanup_entry(&cleanup, candidate, self.options.dry_run()));

        Ok(AssetOutcome {
            source: candidate.rel_path.clone(),
            output: transcoded.output_rel,
            original_size: candidate.size_bytes,
            output_size: transcoded.output_size.unwrap_or(0),
            max_width: transcoded.max_width,
            action: transcoded.action,
            files_updated: changed.into_iter().map(|p| self.display_path(p)).collect(),
            cleanup,
        })
    }

    /// Project-relative form of a corpus path for reports.
    fn display_path(&self, path: PathBuf) -> PathBuf {
        match path.strip_prefix(self.root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path,
        }
    }
}

/// Fail when two candidates map to the same output, e.g. `a.png` and `a.jpg`.
fn check_output_collisions(transcoder: &Transcoder<'_>, candidates: &[Candidate]) -> Result<()> {
    let mut claimed: BTreeMap<String, &str> = BTreeMap::new();
    for candidate in candidates {
        let output = transcoder.output_rel(candidate)?;
        if let Some(first) = claimed.get(&output) {
            return Err(AoptError::OutputCollision {
                output,
                first: (*first).to_string(),
                second: candidate.rel_path.clone(),
            });
        }
        claimed.insert(output, &candidate.rel_path);
    }
    Ok(())
}

fn cleanup_entry(cleanup: &CleanupDecision, candidate: &Candidate, dry_run: bool) -> LogEntry {
    let (event, details) = match cleanup {
        CleanupDecision::Deleted | CleanupDecision::WouldDelete => {
            (EventType::OriginalDeleted, None)
        }
        CleanupDecision::KeptStillReferenced { referenced_in } => (
            EventType::OriginalKept,
            Some(format!("still referenced in {}", referenced_in.display())),
        ),
        CleanupDecision::KeptByPolicy => {
            (EventType::OriginalKept, Some("keep-original".to_string()))
        }
    };
    let mut entry = LogEntry::asset(event, &candidate.rel_path);
    if matches!(cleanup, CleanupDecision::KeptStillReferenced { .. }) {
        entry.severity = Severity::Warning;
    }
    entry.size = Some(candidate.size_bytes);
    entry.dry_run = Some(dry_run);
    entry.details = details;
    entry
}
