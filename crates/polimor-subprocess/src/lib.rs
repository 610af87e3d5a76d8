//! Subprocess execution harness used by the purge and migration agents to
//! invoke external tools with captured combined stdout+stderr and lifecycle
//! control.
//!
//! The pipe is created before spawn, the child inherits its write end, and
//! the parent closes its copy immediately after spawn — mirroring the
//! `pipe2`/`posix_spawn`/dup2-onto-stdout-and-stderr sequence the original
//! harness used, expressed here as two piped child streams merged into one
//! line stream rather than a single dup2'd fd (`std::process::Child` doesn't
//! expose raw fd duplication safely, and a merged stream gives callers the
//! same "one combined output" contract).

pub mod error;

pub use error::ProcessError;

use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// A spawned child's combined stdout+stderr, delivered as a newline-delimited
/// stream. Dropping the stream does not affect the child; use [`Process`]'s
/// own `Drop` for lifecycle guarantees.
pub struct ReadStream {
    rx: mpsc::Receiver<String>,
}

impl ReadStream {
    /// Yields the next output line, or `None` once both stdout and stderr
    /// have reached EOF.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Holds the child's pid (via the underlying `tokio::process::Child`) and
/// argv. `launch` may be called more than once: a second call first cleans
/// up whatever child is still running from the previous one.
pub struct Process {
    argv: Vec<String>,
    child: Option<tokio::process::Child>,
}

impl Process {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv, child: None }
    }

    /// Spawns the child with both stdout and stderr piped, returning a
    /// combined line stream. If a previous child from an earlier `launch`
    /// call is still running, it is killed and reaped first.
    pub async fn launch(&mut self) -> Result<ReadStream, ProcessError> {
        self.cleanup_previous().await;
        self.spawn().await
    }

    /// Replaces the configured argv and launches it, cleaning up any
    /// previous child exactly as [`Process::launch`] does.
    pub async fn launch_with(&mut self, argv: Vec<String>) -> Result<ReadStream, ProcessError> {
        self.cleanup_previous().await;
        self.argv = argv;
        self.spawn().await
    }

    async fn spawn(&mut self) -> Result<ReadStream, ProcessError> {
        let (argv0, rest) = self
            .argv
            .split_first()
            .ok_or_else(|| ProcessError::Spawn {
                argv0: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
            })?;

        let mut child = tokio::process::Command::new(argv0)
            .args(rest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                argv0: argv0.clone(),
                source,
            })?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(pump_lines(stdout, tx.clone()));
        tokio::spawn(pump_lines(stderr, tx));

        self.child = Some(child);
        Ok(ReadStream { rx })
    }

    /// Blocks until the child exits, returning its exit status.
    pub async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        let child = self.child.as_mut().ok_or(ProcessError::NotRunning)?;
        let status = child.wait().await.map_err(ProcessError::Wait)?;
        self.child = None;
        Ok(status)
    }

    /// Sends a kill signal and reaps the child.
    pub async fn stop(&mut self) -> Result<(), ProcessError> {
        let mut child = self.child.take().ok_or(ProcessError::NotRunning)?;
        child.start_kill().map_err(ProcessError::Kill)?;
        child.wait().await.map_err(ProcessError::Wait)?;
        Ok(())
    }

    async fn cleanup_previous(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            // Best-effort synchronous reap: try_wait avoids blocking the
            // drop on a child that's slow to die after SIGKILL, at the cost
            // of occasionally leaving a zombie for the reaper to collect.
            for _ in 0..10 {
                match child.try_wait() {
                    Ok(Some(_)) | Err(_) => break,
                    Ok(None) => std::thread::sleep(std::time::Duration::from_millis(10)),
                }
            }
        }
    }
}

async fn pump_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_yields_one_combined_line() {
        let mut process = Process::new(vec![
            "/bin/echo".to_string(),
            "hello".to_string(),
            "world".to_string(),
        ]);
        let mut output = process.launch().await.unwrap();
        let line = output.next_line().await.unwrap();
        assert_eq!(line, "hello world");
        assert!(output.next_line().await.is_none());

        let status = process.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn relaunch_reaps_the_previous_child() {
        let mut process = Process::new(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            "sleep 30".to_string(),
        ]);
        let _first = process.launch().await.unwrap();
        assert!(process.child.is_some());

        // A second launch must kill and reap the still-running first child
        // before spawning its replacement.
        let mut second_output = process
            .launch_with(vec!["/bin/echo".to_string(), "second".to_string()])
            .await
            .unwrap();
        let line = second_output.next_line().await;
        assert_eq!(line.as_deref(), Some("second"));

        let status = process.wait().await.unwrap();
        assert!(status.success());
    }
}
