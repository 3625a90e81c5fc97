use crate::config::types::{AuditError, Result};
use crate::kernel::signal::CancelToken;
use log::{info, warn};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
/// Statistical test harness invocation
/// The harness runs as a child process with stdout and stderr redirected
/// into scratch files. The wait is blocking with no timeout, polled so that
/// a pending cancellation stops the child.
use std::fs::{File, OpenOptions};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Harness generator code for "file input, ASCII decimal integers one per line"
pub const FILE_INPUT_ASCII: u32 = 202;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TERM_GRACE: Duration = Duration::from_secs(2);

/// One harness run against a data file
#[derive(Debug, Clone)]
pub struct HarnessInvocation {
    pub program: String,
    /// Arguments placed before the test selector
    pub leading_args: Vec<String>,
    /// Opaque selector, split on whitespace into arguments
    pub test_selector: String,
    pub data_file: PathBuf,
}

impl HarnessInvocation {
    /// Full argument vector: leading args, selector words, `-g 202 -f <file>`
    pub fn args(&self) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend(self.test_selector.split_whitespace().map(str::to_string));
        args.push("-g".to_string());
        args.push(FILE_INPUT_ASCII.to_string());
        args.push("-f".to_string());
        args.push(self.data_file.display().to_string());
        args
    }

    /// Run to completion. Stdout goes to `stdout_path`, stderr to
    /// `stderr_path`. A non-zero exit becomes `ExternalTool` carrying the
    /// captured stderr.
    pub fn run(&self, stdout_path: &Path, stderr_path: &Path, cancel: &CancelToken) -> Result<()> {
        let stdout = open_capture(stdout_path)?;
        let stderr = open_capture(stderr_path)?;

        let args = self.args();
        info!("Launching harness: {} {}", self.program, args.join(" "));
        let started = Instant::now();

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| AuditError::ExternalTool {
                status: None,
                diagnostics: format!("Failed to launch '{}': {}", self.program, e),
            })?;

        let status = wait_cancellable(&mut child, cancel)?;
        info!(
            "Harness finished with {} after {:.1}s",
            status,
            started.elapsed().as_secs_f64()
        );

        if status.success() {
            return Ok(());
        }

        let mut diagnostics = std::fs::read_to_string(stderr_path).unwrap_or_else(|e| {
            format!("<stderr capture unreadable: {}>", e)
        });
        if let Some(signal) = status.signal() {
            diagnostics.push_str(&format!("harness terminated by signal {}\n", signal));
        }
        Err(AuditError::ExternalTool {
            status: exit_code_of(status),
            diagnostics,
        })
    }
}

/// Exit code as a shell reports it: the status, or 128 + signal
fn exit_code_of(status: ExitStatus) -> Option<i32> {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
}

fn open_capture(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| {
            AuditError::Resource(format!(
                "Failed to open capture file {}: {}",
                path.display(),
                e
            ))
        })
}

/// Wait for the child, stopping it if cancellation is requested
fn wait_cancellable(child: &mut Child, cancel: &CancelToken) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            // A terminal interrupt reaches the harness too; ours takes precedence
            if !status.success() {
                if let Some(signal) = cancel.pending() {
                    warn!("Harness exited with {} after signal {}", status, signal);
                    return Err(AuditError::Interrupted { signal });
                }
            }
            return Ok(status);
        }

        if let Some(signal) = cancel.pending() {
            warn!(
                "Signal {} received, stopping harness (pid {})",
                signal,
                child.id()
            );
            stop_child(child);
            return Err(AuditError::Interrupted { signal });
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

/// SIGTERM, short grace period, then SIGKILL; always reaps
fn stop_child(child: &mut Child) {
    let pid = Pid::from_raw(child.id() as i32);
    if let Err(e) = kill(pid, Signal::SIGTERM) {
        warn!("Failed to send SIGTERM to harness: {}", e);
    }

    let deadline = Instant::now() + TERM_GRACE;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => std::thread::sleep(Duration::from_millis(20)),
            Err(_) => break,
        }
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(script: &str, selector: &str, data: &Path) -> HarnessInvocation {
        HarnessInvocation {
            program: "sh".to_string(),
            leading_args: vec!["-c".to_string(), script.to_string(), "harness".to_string()],
            test_selector: selector.to_string(),
            data_file: data.to_path_buf(),
        }
    }

    #[test]
    fn test_args_layout() {
        let inv = HarnessInvocation {
            program: "dieharder".to_string(),
            leading_args: Vec::new(),
            test_selector: "-d 204".to_string(),
            data_file: PathBuf::from("/tmp/data.txt"),
        };
        assert_eq!(inv.args(), vec!["-d", "204", "-g", "202", "-f", "/tmp/data.txt"]);
    }

    #[test]
    fn test_success_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = dir.path().join("err");
        File::create(&out).unwrap();
        File::create(&err).unwrap();

        let inv = invocation("printf '%s\\n' \"$*\"", "-a", Path::new("/tmp/data.txt"));
        inv.run(&out, &err, &CancelToken::new()).unwrap();

        let stdout = std::fs::read_to_string(&out).unwrap();
        assert_eq!(stdout.trim(), "-a -g 202 -f /tmp/data.txt");
    }

    #[test]
    fn test_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = dir.path().join("err");
        File::create(&out).unwrap();
        File::create(&err).unwrap();

        let inv = invocation("echo 'unknown test 999' >&2; exit 3", "-d 999", Path::new("/tmp/x"));
        match inv.run(&out, &err, &CancelToken::new()) {
            Err(AuditError::ExternalTool {
                status,
                diagnostics,
            }) => {
                assert_eq!(status, Some(3));
                assert!(diagnostics.contains("unknown test 999"));
            }
            other => panic!("expected harness failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = dir.path().join("err");
        File::create(&out).unwrap();
        File::create(&err).unwrap();

        let inv = HarnessInvocation {
            program: "/nonexistent/dieharder".to_string(),
            leading_args: Vec::new(),
            test_selector: "-a".to_string(),
            data_file: PathBuf::from("/tmp/x"),
        };
        let result = inv.run(&out, &err, &CancelToken::new());
        assert!(matches!(result, Err(AuditError::ExternalTool { status: None, .. })));
    }

    #[test]
    fn test_harness_killed_by_foreign_signal() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = dir.path().join("err");
        File::create(&out).unwrap();
        File::create(&err).unwrap();

        let inv = invocation("kill -KILL $$", "-a", Path::new("/tmp/x"));
        match inv.run(&out, &err, &CancelToken::new()) {
            Err(e @ AuditError::ExternalTool { .. }) => {
                assert_eq!(e.exit_code(), 128 + libc::SIGKILL);
                assert!(e.to_string().contains("terminated by signal 9"));
            }
            other => panic!("expected harness failure, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_interrupt_reports_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = dir.path().join("err");
        File::create(&out).unwrap();
        File::create(&err).unwrap();

        // Same signal delivered to us and to the harness
        let cancel = CancelToken::new();
        cancel.request(libc::SIGINT);
        let inv = invocation("kill -INT $$", "-a", Path::new("/tmp/x"));
        let result = inv.run(&out, &err, &cancel);
        assert!(matches!(result, Err(AuditError::Interrupted { signal }) if signal == libc::SIGINT));
    }

    #[test]
    fn test_cancel_stops_long_harness() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = dir.path().join("err");
        File::create(&out).unwrap();
        File::create(&err).unwrap();

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let timer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            trigger.request(libc::SIGTERM);
        });

        let inv = invocation("exec sleep 30", "-a", Path::new("/tmp/x"));
        let started = Instant::now();
        let result = inv.run(&out, &err, &cancel);
        timer.join().unwrap();

        assert!(matches!(result, Err(AuditError::Interrupted { signal }) if signal == libc::SIGTERM));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
