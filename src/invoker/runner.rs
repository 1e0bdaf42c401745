use crate::error::{OctopilotError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long output readers may keep draining after the process has exited or
/// been killed. Grandchildren holding the pipes open must not stall the call.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// A fully constructed command: program plus argv, never a shell string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Human-readable command line, quoting arguments that contain whitespace
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().map(|arg| quote(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", arg.replace('\'', "'\\''"))
    } else {
        arg.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a command to completion.
///
/// Expiry of `timeout` kills the process and yields [`OctopilotError::Timeout`]
/// carrying whatever output was captured before the kill.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<ProcessOutput>;
}

#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

type Captured = Arc<Mutex<Vec<u8>>>;

fn capture<R>(reader: Option<R>) -> (Captured, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = buffer.clone();
    let handle = tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .extend_from_slice(&chunk[..n]),
                Err(e) => {
                    debug!(error = %e, "Output stream closed with error");
                    break;
                }
            }
        }
    });
    (buffer, handle)
}

async fn drain(mut handle: JoinHandle<()>) {
    if tokio::time::timeout(DRAIN_GRACE, &mut handle).await.is_err() {
        handle.abort();
    }
}

fn take_text(buffer: &Captured) -> String {
    String::from_utf8_lossy(&buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
        .into_owned()
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<ProcessOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| OctopilotError::io(format!("Failed to spawn {}", spec.program.display()), e))?;
        debug!(pid = ?child.id(), "Spawned process");

        let (stdout, stdout_task) = capture(child.stdout.take());
        let (stderr, stderr_task) = capture(child.stderr.take());

        let waited = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
            None => Some(child.wait().await),
        };

        match waited {
            Some(status) => {
                let status = status.map_err(|e| {
                    OctopilotError::io(format!("Failed to wait for {}", spec.program.display()), e)
                })?;
                drain(stdout_task).await;
                drain(stderr_task).await;
                Ok(ProcessOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout: take_text(&stdout),
                    stderr: take_text(&stderr),
                })
            }
            None => {
                let limit = timeout.unwrap_or_default();
                warn!(?limit, command = %spec.display(), "Command timed out, killing it");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed out process");
                }
                drain(stdout_task).await;
                drain(stderr_task).await;
                Err(OctopilotError::Timeout {
                    limit,
                    command: spec.display(),
                    stdout: take_text(&stdout),
                    stderr: take_text(&stderr),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(program: &str, args: &[&str]) -> CommandSpec {
        CommandSpec {
            program: PathBuf::from(program),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: std::env::temp_dir(),
            env: Vec::new(),
        }
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let spec = spec("/usr/bin/op", &["build", "--repo", "ghcr.io/acme", "--label", "a b"]);
        assert_eq!(spec.display(), "/usr/bin/op build --repo ghcr.io/acme --label 'a b'");
    }

    #[test]
    fn test_display_escapes_single_quotes() {
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote(""), "''");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let runner = TokioProcessRunner::new();
        let output = runner
            .run(&spec("/bin/sh", &["-c", "echo out; echo err >&2; exit 3"]), None)
            .await
            .unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_is_closed() {
        let runner = TokioProcessRunner::new();
        let output = runner
            .run(&spec("/bin/sh", &["-c", "cat; echo done"]), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        assert_eq!(output.stdout, "done\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_and_keeps_partial_output() {
        let runner = TokioProcessRunner::new();
        let err = runner
            .run(
                &spec("/bin/sh", &["-c", "echo started; exec sleep 30"]),
                Some(Duration::from_millis(500)),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("after 500ms"), "{}", err);
        match err {
            OctopilotError::Timeout { limit, stdout, .. } => {
                assert_eq!(limit, Duration::from_millis(500));
                assert_eq!(stdout, "started\n");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_io_error() {
        let runner = TokioProcessRunner::new();
        let err = runner
            .run(&spec("/definitely/not/a/binary", &["version"]), None)
            .await
            .unwrap_err();

        assert!(matches!(err, OctopilotError::Io { .. }));
    }
}
