/// External helper source
/// The helper is spawned once and writes unsigned integers separated by
/// whitespace on stdout. A reader thread parses them and forwards them over
/// a bounded channel, so each draw can wait with a timeout. The helper gets
/// its own process group so that everything it forked is stopped with it.
use super::{RandomSource, SourceError};
use crate::config::types::{AuditError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const CHANNEL_CAPACITY: usize = 4096;

enum Message {
    Value(u32),
    Malformed(String),
    ReadError(String),
}

pub struct CommandSource {
    name: String,
    child: Child,
    values: Receiver<Message>,
    reader: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl CommandSource {
    pub fn spawn(program: &str, args: &[String], timeout: Duration) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .process_group(0)
            .spawn()
            .map_err(|e| AuditError::RandomSource {
                reason: format!("Failed to launch random helper '{}': {}", program, e),
                exit_code: None,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| AuditError::RandomSource {
            reason: "random helper stdout not captured".to_string(),
            exit_code: None,
        })?;

        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        let reader = thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        let _ = tx.send(Message::ReadError(e.to_string()));
                        return;
                    }
                };
                for word in line.split_whitespace() {
                    let message = match word.parse::<u32>() {
                        Ok(value) => Message::Value(value),
                        Err(_) => Message::Malformed(word.to_string()),
                    };
                    if tx.send(message).is_err() {
                        // Receiver gone: source dropped
                        return;
                    }
                }
            }
        });

        info!("Random helper '{}' started (pid {})", program, child.id());
        Ok(Self {
            name: program.to_string(),
            child,
            values: rx,
            reader: Some(reader),
            timeout,
        })
    }

    fn exit_status(&mut self) -> Option<i32> {
        match self.child.wait() {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("Failed to reap random helper: {}", e);
                None
            }
        }
    }
}

impl RandomSource for CommandSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_u32(&mut self) -> std::result::Result<u32, SourceError> {
        match self.values.recv_timeout(self.timeout) {
            Ok(Message::Value(value)) => Ok(value),
            Ok(Message::Malformed(word)) => Err(SourceError::Malformed(word)),
            Ok(Message::ReadError(e)) => Err(SourceError::Unavailable(e)),
            Err(RecvTimeoutError::Timeout) => Err(SourceError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Exited(self.exit_status())),
        }
    }
}

impl Drop for CommandSource {
    fn drop(&mut self) {
        // The group outlives the helper while any forked child holds stdout
        let group = Pid::from_raw(self.child.id() as i32);
        match killpg(group, Signal::SIGKILL) {
            Ok(()) => debug!("Stopped random helper group {}", group),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to stop random helper group {}: {}", group, e),
        }
        let _ = self.child.wait();
        // Disconnect first so a reader blocked on a full channel can exit
        self.values = crossbeam_channel::never();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}
