//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Component, Path, PathBuf};

use clap::Parser;
use colored::{Colorize, control};
use serde_json::Value;
use thiserror::Error;

use asset_optimizer::core::config::{Config, OptionOverrides};
use asset_optimizer::core::errors::AoptError;
use asset_optimizer::core::paths::resolve_absolute_path;
use asset_optimizer::logger::jsonl::ActivityLog;
use asset_optimizer::pipeline::report::{AssetOutcome, RunReport};
use asset_optimizer::pipeline::runner::Optimizer;

/// Asset optimizer: recompress oversized images to WebP and rewrite references.
#[derive(Debug, Parser)]
#[command(
    name = "aopt",
    author,
    version,
    about = "Recompress oversized PNG/JPEG assets to WebP and rewrite every reference",
    long_about = None
)]
pub struct Cli {
    /// Only optimize images of at least this many bytes [default: 512000].
    /// Fractions and exponents (`1e6`) are accepted and rounded up.
    #[arg(long, value_name = "BYTES", value_parser = parse_threshold)]
    threshold: Option<u64>,
    /// WebP quality, 1-100 [default: 80].
    #[arg(long, value_name = "1-100")]
    quality: Option<u32>,
    /// Report changes but don't write files.
    #[arg(long)]
    dry_run: bool,
    /// Don't delete originals after rewriting references.
    #[arg(long)]
    keep_original: bool,
    /// Re-generate output even if it already exists.
    #[arg(long)]
    force: bool,
    /// Project root containing the public dir and the source tree.
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Append a JSONL activity log to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Also list the text files rewritten for each image.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (summary and errors only).
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid flags, config or project layout.
    #[error("{0}")]
    User(String),
    /// Encoder or filesystem failure during the run.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<AoptError> for CliError {
    fn from(err: AoptError) -> Self {
        if err.is_user_error() {
            Self::User(err.to_string())
        } else if matches!(err, AoptError::Serialization { .. }) {
            Self::Internal(err.to_string())
        } else {
            Self::Runtime(err.to_string())
        }
    }
}

/// Resolve config and options, run the optimizer, print the report.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    let overrides = OptionOverrides {
        threshold_bytes: cli.threshold,
        quality: cli.quality,
        dry_run: cli.dry_run,
        keep_original: cli.keep_original,
        force: cli.force,
    };
    overrides.validate()?;

    let root = resolve_absolute_path(&cli.root);
    let config = Config::load(&root, cli.config.as_deref())?;
    let options = config.resolve_options(&overrides)?;
    let images_label = images_label(&config);
    let raw_marker = config.scanner.raw_marker.clone();
    let log_path = activity_log_path(cli.log_file.as_deref(), &root, &config);

    let mut optimizer = Optimizer::new(root, config, options)
        .with_activity_log(ActivityLog::open(log_path.as_deref()));

    match output_mode(cli) {
        OutputMode::Human => {
            let report = optimizer.run_with(|outcome| {
                if !cli.quiet {
                    print_asset_line(outcome, options.dry_run(), cli.verbose);
                }
            })?;
            print_summary(&report, &images_label, &raw_marker);
        }
        OutputMode::Json => {
            let report = optimizer.run()?;
            write_json_line(&serde_json::to_value(&report)?)?;
        }
    }
    Ok(())
}

fn print_asset_line(outcome: &AssetOutcome, dry_run: bool, verbose: bool) {
    let line = outcome.line(dry_run);
    if dry_run {
        println!("{}", line.yellow());
    } else {
        println!("{line}");
    }
    if verbose {
        for file in &outcome.files_updated {
            println!("    {} {}", "rewrote".dimmed(), file.display());
        }
    }
}

fn print_summary(report: &RunReport, images_label: &str, raw_marker: &str) {
    if report.is_empty() {
        println!("{}", report.nothing_to_do_line(images_label, raw_marker));
        return;
    }
    println!();
    for line in report.summary_lines() {
        if line.starts_with("- ") || line.starts_with("Kept originals (") {
            println!("{}", line.yellow());
        } else if line.starts_with("Estimated savings") {
            println!("{}", line.green().bold());
        } else {
            println!("{line}");
        }
    }
}

/// `public/images` as written in messages.
fn images_label(config: &Config) -> String {
    let parts: Vec<String> = config
        .paths
        .public_dir
        .components()
        .chain(config.paths.images_dir.components())
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// `--log-file` wins over the configured path; relative config paths hang off the root.
fn activity_log_path(flag: Option<&Path>, root: &Path, config: &Config) -> Option<PathBuf> {
    flag.map(Path::to_path_buf).or_else(|| {
        config
            .paths
            .activity_log
            .as_deref()
            .map(|p| resolve_under(root, p))
    })
}

fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Byte count from a plain integer or any finite non-negative decimal, rounded up.
///
/// Zero passes through so the policy check reports it like any other bad value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn parse_threshold(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    if let Ok(bytes) = raw.parse::<u64>() {
        return Ok(bytes);
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of bytes"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("`{raw}` is not a non-negative number of bytes"));
    }
    let bytes = value.ceil();
    if bytes >= u64::MAX as f64 {
        return Err(format!("`{raw}` is too large"));
    }
    Ok(bytes as u64)
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("AOPT_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

/// JSON when asked for by flag or `AOPT_OUTPUT_FORMAT`, human otherwise.
fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_flags_in_both_spellings() {
        let eq = Cli::try_parse_from(["aopt", "--threshold=1000", "--quality=70"]).unwrap();
        assert_eq!((eq.threshold, eq.quality), (Some(1000), Some(70)));

        let spaced =
            Cli::try_parse_from(["aopt", "--threshold", "1000", "--quality", "70"]).unwrap();
        assert_eq!((spaced.threshold, spaced.quality), (Some(1000), Some(70)));
    }

    #[test]
    fn parses_switches_and_ambient_flags() {
        let cli = Cli::try_parse_from([
            "aopt",
            "--dry-run",
            "--keep-original",
            "--force",
            "--root",
            "/srv/site",
            "--config",
            "/tmp/aopt.toml",
            "--log-file",
            "/tmp/aopt.jsonl",
            "--json",
            "--no-color",
            "-v",
        ])
        .unwrap();
        assert!(cli.dry_run && cli.keep_original && cli.force && cli.json && cli.verbose);
        assert_eq!(cli.root, PathBuf::from("/srv/site"));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/aopt.jsonl")));
    }

    #[test]
    fn defaults_leave_policy_to_config() {
        let cli = Cli::try_parse_from(["aopt"]).unwrap();
        assert_eq!(cli.threshold, None);
        assert_eq!(cli.quality, None);
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(!cli.dry_run);
    }

    #[test]
    fn rejects_unknown_and_conflicting_flags() {
        assert!(Cli::try_parse_from(["aopt", "--bogus"]).is_err());
        assert!(Cli::try_parse_from(["aopt", "-v", "-q"]).is_err());
        assert!(Cli::try_parse_from(["aopt", "--threshold", "lots"]).is_err());
        assert!(Cli::try_parse_from(["aopt", "--threshold=-5"]).is_err());
        assert!(Cli::try_parse_from(["aopt", "--threshold=inf"]).is_err());
    }

    #[test]
    fn threshold_accepts_exponents_and_fractions() {
        let sci = Cli::try_parse_from(["aopt", "--threshold=1e6"]).unwrap();
        assert_eq!(sci.threshold, Some(1_000_000));
        let frac = Cli::try_parse_from(["aopt", "--threshold", "500000.5"]).unwrap();
        assert_eq!(frac.threshold, Some(500_001));
        assert_eq!(parse_threshold("18446744073709551615"), Ok(u64::MAX));
        assert_eq!(parse_threshold("0"), Ok(0));
        assert_eq!(parse_threshold("0.25"), Ok(1));
        assert!(parse_threshold("NaN").is_err());
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(resolve_output_mode(true, Some("human")), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some(" JSON ")), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("human")), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None), OutputMode::Human);
    }

    #[test]
    fn error_classes_map_to_exit_codes() {
        let user: CliError = AoptError::InvalidConfig {
            details: "quality".to_string(),
        }
        .into();
        assert_eq!(user.exit_code(), 1);

        let missing: CliError = AoptError::MissingRoot {
            path: PathBuf::from("public"),
        }
        .into();
        assert_eq!(missing.exit_code(), 1);

        let transcode: CliError = AoptError::Transcode {
            path: PathBuf::from("a.png"),
            details: "exit 1".to_string(),
        }
        .into();
        assert_eq!(transcode.exit_code(), 2);

        let internal: CliError = AoptError::Serialization {
            context: "report",
            details: "bad".to_string(),
        }
        .into();
        assert_eq!(internal.exit_code(), 3);
    }

    #[test]
    fn images_label_joins_configured_dirs() {
        let mut config = Config::default();
        assert_eq!(images_label(&config), "public/images");
        config.paths.public_dir = PathBuf::from("./static");
        config.paths.images_dir = PathBuf::from("img/");
        assert_eq!(images_label(&config), "static/img");
    }

    #[cfg(unix)]
    #[test]
    fn log_flag_wins_over_config() {
        let mut config = Config::default();
        config.paths.activity_log = Some(PathBuf::from("logs/aopt.jsonl"));

        let root = Path::new("/srv/site");
        assert_eq!(
            activity_log_path(None, root, &config),
            Some(PathBuf::from("/srv/site/logs/aopt.jsonl"))
        );
        assert_eq!(
            activity_log_path(Some(Path::new("/tmp/x.jsonl")), root, &config),
            Some(PathBuf::from("/tmp/x.jsonl"))
        );
        assert_eq!(activity_log_path(None, root, &Config::default()), None);
    }
}
