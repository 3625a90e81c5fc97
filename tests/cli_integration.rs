//! Integration tests for the randaudit binary
//!
//! Exit codes, stdout/stderr behavior and temp-file cleanup as seen from
//! outside the process.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

struct Sandbox {
    root: tempfile::TempDir,
    tmp: PathBuf,
    vol: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let tmp = root.path().join("tmp");
        let vol = root.path().join("vol");
        std::fs::create_dir(&tmp).unwrap();
        std::fs::create_dir(&vol).unwrap();
        Self { root, tmp, vol }
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.root.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    /// Command for the binary with a stub harness and a deterministic helper
    fn command(&self, harness: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_randaudit"));
        cmd.args(args)
            .env_remove("RANDAUDIT_CONFIG")
            .env("RANDAUDIT_HARNESS", harness)
            .env("RANDAUDIT_SOURCE", "command")
            .env("RANDAUDIT_HELPER", "seq 0 999")
            .env("RANDAUDIT_TMPDIR", &self.tmp)
            .env("RANDAUDIT_VOLATILE_DIR", &self.vol)
            .env("RUST_LOG", "warn");
        cmd
    }

    fn report(&self) -> PathBuf {
        self.tmp.join("randaudit_report.txt")
    }

    fn assert_only_report_left(&self) {
        let tmp: Vec<_> = std::fs::read_dir(&self.tmp)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(tmp, vec!["randaudit_report.txt".to_string()]);
        assert_eq!(std::fs::read_dir(&self.vol).unwrap().count(), 0);
    }
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run randaudit binary")
}

#[test]
fn test_success_prints_report_and_exits_zero() {
    let sandbox = Sandbox::new();
    let stub = sandbox.script("ok.sh", "printf 'stub ran with: %s\\n' \"$*\"\n");
    let harness = format!("sh {}", stub.display());

    let output = run(&mut sandbox.command(&harness, &["20", "-d 0"]));

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("length 20, tests \"-d 0\""));
    assert!(stdout.contains("stub ran with: -d 0 -g 202 -f "));
    assert!(stdout.contains("seconds for 20 samples."));
    sandbox.assert_only_report_left();
}

#[test]
fn test_display_can_be_disabled() {
    let sandbox = Sandbox::new();
    let stub = sandbox.script("ok.sh", "echo quiet stub\n");
    let harness = format!("sh {}", stub.display());

    let output = run(sandbox.command(&harness, &["5"]).env("RANDAUDIT_DISPLAY", "0"));

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    let report = std::fs::read_to_string(sandbox.report()).unwrap();
    assert!(report.contains("tests \"-a\""));
    assert!(report.contains("quiet stub"));
}

#[test]
fn test_harness_failure_propagates_exit_code_and_diagnostics() {
    let sandbox = Sandbox::new();
    let stub = sandbox.script(
        "fail.sh",
        "echo 'first lines of output'\necho 'dieharder: unknown test number 999' >&2\nexit 7\n",
    );
    let harness = format!("sh {}", stub.display());

    let output = run(&mut sandbox.command(&harness, &["10", "-d 999"]));

    assert_eq!(output.status.code(), Some(7));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("randaudit"));
    assert!(stderr.contains("unknown test number 999"));

    // Partial report kept, temp files gone
    let report = std::fs::read_to_string(sandbox.report()).unwrap();
    assert!(report.contains("first lines of output"));
    assert!(!report.contains("finished in"));
    sandbox.assert_only_report_left();
}

#[test]
fn test_missing_harness_is_internal_failure() {
    let sandbox = Sandbox::new();
    let output = run(&mut sandbox.command("/nonexistent/dieharder", &["3"]));

    assert_eq!(output.status.code(), Some(116));
    assert!(String::from_utf8_lossy(&output.stderr).contains("/nonexistent/dieharder"));
    sandbox.assert_only_report_left();
}

#[test]
fn test_invalid_length_is_rejected() {
    let sandbox = Sandbox::new();
    let output = run(&mut sandbox.command("true", &["0"]));

    assert!(!output.status.success());
    assert_eq!(std::fs::read_dir(&sandbox.tmp).unwrap().count(), 0);
}

#[test]
fn test_interrupt_exits_114_and_cleans_up() {
    let sandbox = Sandbox::new();
    let marker = sandbox.root.path().join("harness_started");
    let stub = sandbox.script("slow.sh", "touch \"$1\"\nexec sleep 30\n");
    let harness = format!("sh {} {}", stub.display(), marker.display());

    let mut child = sandbox
        .command(&harness, &["50"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    wait_for(&marker, Duration::from_secs(10));
    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if started.elapsed() > Duration::from_secs(10) {
            let _ = child.kill();
            panic!("randaudit did not exit after SIGINT");
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    assert_eq!(status.code(), Some(114));
    sandbox.assert_only_report_left();
}

#[test]
fn test_interrupt_shared_with_harness_exits_114() {
    // Terminal Ctrl-C: the whole process group, harness included, gets SIGINT
    let sandbox = Sandbox::new();
    let stub = sandbox.script("ctrl_c.sh", "kill -INT $PPID\nkill -INT $$\nsleep 5\n");
    let harness = format!("sh {}", stub.display());

    let started = Instant::now();
    let output = run(&mut sandbox.command(&harness, &["20"]));

    assert_eq!(output.status.code(), Some(114), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(started.elapsed() < Duration::from_secs(10));
    sandbox.assert_only_report_left();
}

#[test]
fn test_harness_killed_by_signal_reports_shell_style_code() {
    let sandbox = Sandbox::new();
    let stub = sandbox.script("oom.sh", "echo 'partial output'\nkill -KILL $$\n");
    let harness = format!("sh {}", stub.display());

    let output = run(&mut sandbox.command(&harness, &["5"]));

    assert_eq!(output.status.code(), Some(137));
    assert!(String::from_utf8_lossy(&output.stderr).contains("terminated by signal 9"));
    sandbox.assert_only_report_left();
}

fn wait_for(path: &Path, limit: Duration) {
    let started = Instant::now();
    while !path.exists() {
        assert!(started.elapsed() < limit, "{} never appeared", path.display());
        std::thread::sleep(Duration::from_millis(20));
    }
}
