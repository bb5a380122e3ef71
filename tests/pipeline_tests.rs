//! Library-level pipeline tests with an in-process encoder.

mod common;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use proptest::prelude::*;

use asset_optimizer::core::config::{Config, OptimizeOptions};
use asset_optimizer::core::errors::{AoptError, Result};
use asset_optimizer::pipeline::runner::Optimizer;
use asset_optimizer::rewrite::rewriter::CleanupDecision;
use asset_optimizer::scanner::assets::AssetScanner;
use asset_optimizer::transcode::encoder::{EncodeRequest, Encoder};
use asset_optimizer::transcode::transcoder::TranscodeAction;

/// Output is one tenth of the input, at least one byte.
struct ShrinkingEncoder;

impl Encoder for ShrinkingEncoder {
    fn name(&self) -> &str {
        "shrinking"
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<()> {
        let len = fs::metadata(request.input)
            .map_err(|e| AoptError::io(request.input, e))?
            .len();
        let out = usize::try_from(len / 10).unwrap_or(1).max(1);
        fs::write(request.output, vec![1u8; out]).map_err(|e| AoptError::io(request.output, e))
    }
}

fn options(threshold: u64, dry_run: bool, delete_original: bool) -> OptimizeOptions {
    OptimizeOptions::new(threshold, 80, dry_run, delete_original, false).unwrap()
}

fn run(root: &Path, options: OptimizeOptions) -> asset_optimizer::pipeline::report::RunReport {
    Optimizer::new(root, Config::default(), options)
        .with_encoder(Box::new(ShrinkingEncoder))
        .run()
        .unwrap()
}

/// Every regular file under `root` with its contents, for byte-for-byte comparisons.
fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        let mut entries: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
        entries.sort();
        for path in entries {
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
                out.push((rel, fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out
}

fn site() -> tempfile::TempDir {
    let tmp = common::blog_project(800_000);
    let root = tmp.path();
    common::write_file(root, "public/images/docs/setup.jpeg", vec![0u8; 600_000]);
    common::write_file(root, "public/images/media/hero.png", vec![0u8; 2_000_000]);
    common::write_file(root, "public/images/logo.png", vec![0u8; 520_000]);
    common::write_file(root, "public/images/blog/cover_raw.png", vec![0u8; 3_000_000]);
    common::write_file(root, "public/images/small.png", vec![0u8; 4_096]);
    common::write_file(
        root,
        "src/app/page.tsx",
        "import hero from '@/public/images/media/hero.png';\nconst logo = '/images/logo.png';\n",
    );
    common::write_file(
        root,
        "docs/setup.mdx",
        "![setup](/images/docs/setup.jpeg)\nSource: public/images/docs/setup.jpeg\n",
    );
    common::write_file(
        root,
        "node_modules/pkg/readme.md",
        "![cover](/images/blog/cover.png)\n",
    );
    common::write_file(root, ".next/cache/page.js", "'/images/logo.png'");
    tmp
}

#[test]
fn largest_first_with_category_caps() {
    let tmp = site();
    let report = run(tmp.path(), options(500_000, false, true));

    let order: Vec<(&str, u32)> = report
        .assets
        .iter()
        .map(|a| (a.source.as_str(), a.max_width))
        .collect();
    assert_eq!(
        order,
        vec![
            ("images/media/hero.png", 2000),
            ("images/blog/cover.png", 1400),
            ("images/docs/setup.jpeg", 1400),
            ("images/logo.png", 1600),
        ]
    );
    assert_eq!(report.encoded, 4);
    assert_eq!(report.deleted, 4);
    assert!(report.kept_originals.is_empty());
    assert_eq!(report.original_bytes, 2_000_000 + 800_000 + 600_000 + 520_000);
    assert_eq!(report.optimized_bytes, 200_000 + 80_000 + 60_000 + 52_000);
}

#[test]
fn pruned_directories_are_never_rewritten() {
    let tmp = site();
    run(tmp.path(), options(500_000, false, true));
    let root = tmp.path();

    assert_eq!(
        fs::read_to_string(root.join("node_modules/pkg/readme.md")).unwrap(),
        "![cover](/images/blog/cover.png)\n"
    );
    assert_eq!(
        fs::read_to_string(root.join(".next/cache/page.js")).unwrap(),
        "'/images/logo.png'"
    );
    assert_eq!(
        fs::read_to_string(root.join("src/app/page.tsx")).unwrap(),
        "import hero from '@/public/images/media/hero.webp';\nconst logo = '/images/logo.webp';\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("docs/setup.mdx")).unwrap(),
        "![setup](/images/docs/setup.webp)\nSource: public/images/docs/setup.webp\n"
    );
}

#[test]
fn raw_and_small_images_are_left_alone() {
    let tmp = site();
    run(tmp.path(), options(500_000, false, true));
    let root = tmp.path();
    assert!(root.join("public/images/blog/cover_raw.png").exists());
    assert!(!root.join("public/images/blog/cover_raw.webp").exists());
    assert!(root.join("public/images/small.png").exists());
    assert!(!root.join("public/images/small.webp").exists());
}

#[test]
fn dry_run_is_pure_and_matches_live_candidates() {
    let tmp = site();
    let before = snapshot(tmp.path());
    let simulated = run(tmp.path(), options(500_000, true, true));
    assert_eq!(snapshot(tmp.path()), before);

    assert!(
        simulated
            .assets
            .iter()
            .all(|a| a.action == TranscodeAction::Simulated && a.output_size == 0)
    );
    assert_eq!(simulated.would_delete, 4);
    assert_eq!(simulated.deleted, 0);

    let live = run(tmp.path(), options(500_000, false, true));
    let names = |r: &asset_optimizer::pipeline::report::RunReport| -> Vec<String> {
        r.assets.iter().map(|a| a.source.clone()).collect()
    };
    assert_eq!(names(&simulated), names(&live));
    assert_eq!(simulated.files_updated, live.files_updated);
}

#[test]
fn rerun_after_keep_original_is_idempotent() {
    let tmp = site();
    let first = run(tmp.path(), options(500_000, false, false));
    assert_eq!(first.encoded, 4);
    assert!(
        first
            .assets
            .iter()
            .all(|a| a.cleanup == CleanupDecision::KeptByPolicy)
    );
    let after_first = snapshot(tmp.path());

    let second = run(tmp.path(), options(500_000, false, false));
    assert_eq!(second.encoded, 0);
    assert_eq!(second.reused, 4);
    assert_eq!(second.files_updated, 0);
    assert_eq!(snapshot(tmp.path()), after_first);
}

#[test]
fn reference_deep_in_the_tree_is_rewritten_before_delete() {
    let tmp = common::blog_project(800_000);
    let root = tmp.path();
    let deep_rel: String = (0..70).map(|level| format!("d{level}/")).collect::<String>() + "notes.md";
    common::write_file(root, &deep_rel, "see /images/blog/cover.png\n");

    let report = run(root, options(500_000, false, true));

    assert_eq!(fs::read_to_string(root.join(&deep_rel)).unwrap(), "see /images/blog/cover.webp\n");
    assert_eq!(report.files_updated, 2);
    assert_eq!(report.deleted, 1);
    assert!(!root.join("public/images/blog/cover.png").exists());
}

#[test]
fn jpeg_and_png_with_one_stem_are_refused() {
    let tmp = common::blog_project(900_000);
    let root = tmp.path();
    common::write_file(root, "public/images/blog/cover.jpg", vec![b'J'; 800_000]);
    let post = "![p](/images/blog/cover.png) ![j](/images/blog/cover.jpg)\n";
    common::write_file(root, "content/post.md", post);
    let before = snapshot(root);

    let err = Optimizer::new(root, Config::default(), options(500_000, false, true))
        .with_encoder(Box::new(ShrinkingEncoder))
        .run()
        .unwrap_err();

    assert!(matches!(err, AoptError::OutputCollision { .. }));
    assert_eq!(snapshot(root), before);
}

fn scan_names(root: &Path, threshold: u64) -> BTreeSet<String> {
    AssetScanner::from_config(&Config::default(), root)
        .unwrap()
        .scan(threshold)
        .unwrap()
        .candidates
        .into_iter()
        .map(|c| c.rel_path)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn raising_threshold_never_adds_candidates(
        sizes in proptest::collection::vec(1usize..20_000, 1..8),
        low in 1u64..10_000,
        bump in 0u64..10_000,
    ) {
        let tmp = tempfile::tempdir().unwrap();
        for (i, size) in sizes.iter().enumerate() {
            common::write_file(tmp.path(), &format!("public/images/img{i}.png"), vec![0u8; *size]);
        }
        let lower = scan_names(tmp.path(), low);
        let higher = scan_names(tmp.path(), low + bump);
        prop_assert!(higher.is_subset(&lower));
    }
}
