#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_aopt") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "aopt.exe" } else { "aopt" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve aopt binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_env(case_name, args, &[])
}

/// Run the binary with a clean `AOPT_*` environment plus `envs`.
pub fn run_cli_case_with_env(case_name: &str, args: &[&str], envs: &[(&str, &str)]) -> CmdResult {
    let root = std::env::temp_dir().join("aopt-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command.args(args).env("RUST_BACKTRACE", "1");
    for (key, _) in std::env::vars() {
        if key.starts_with("AOPT_") {
            command.env_remove(key);
        }
    }
    for (key, value) in envs {
        command.env(key, value);
    }
    let output = command.output().expect("execute aopt command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("envs={envs:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write `content` at `root/rel`, creating parents.
pub fn write_file(root: &Path, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent dir")).expect("create parent dirs");
    fs::write(&path, content).expect("write fixture file");
    path
}

/// A project with `public/images` and a blog cover referenced from a post.
pub fn blog_project(cover_size: usize) -> tempfile::TempDir {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_file(
        tmp.path(),
        "public/images/blog/cover.png",
        vec![0u8; cover_size],
    );
    write_file(
        tmp.path(),
        "content/post.md",
        "# Post\n\n![cover](/images/blog/cover.png)\n",
    );
    tmp
}

/// Install a stand-in encoder script that logs its arguments to `calls.log`
/// next to itself and writes `payload` to its last argument.
#[cfg(unix)]
pub fn fake_encoder(dir: &Path, payload: &str) -> PathBuf {
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> \"$(dirname \"$0\")/calls.log\"\nfor last; do :; done\nprintf '%s' '{payload}' > \"$last\"\n"
    );
    install_script(dir, "fake-encoder.sh", &script)
}

/// Install an encoder script that leaves a partial file and fails.
#[cfg(unix)]
pub fn failing_encoder(dir: &Path) -> PathBuf {
    let script = "#!/bin/sh\nfor last; do :; done\nprintf 'partial' > \"$last\"\necho 'Invalid data found when processing input' >&2\nexit 1\n";
    install_script(dir, "failing-encoder.sh", script)
}

#[cfg(unix)]
fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).expect("create script dir");
    let path = dir.join(name);
    fs::write(&path, body).expect("write encoder script");
    let mut perms = fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod encoder script");
    path
}

/// Lines the fake encoder logged, one per invocation.
pub fn encoder_calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
