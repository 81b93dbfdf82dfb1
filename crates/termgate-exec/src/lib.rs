//! Command gate and execution gateway.
//!
//! Admits operator-supplied command strings ([`gate::CommandGate`]) and
//! runs admitted commands against a target shell: either the local host
//! or a long-lived container managed through the docker/podman CLI
//! ([`runtime::ContainerRuntime`]).
//!
//! The command always travels as a single argv element to the shell's
//! command flag. It is never concatenated into shell text, so the target
//! runtime's own argument parser cannot be tricked into anything the
//! gate did not already see.

pub mod error;
pub mod gate;
pub mod runtime;

pub use error::{ExecError, ExecResult};
pub use gate::{CommandGate, default_whitelist};
pub use runtime::{ContainerRuntime, RuntimeType};

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

/// Default wall-clock limit for a single execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default per-stream capture ceiling (5 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 5 * 1024 * 1024;

/// Extra time granted after the deadline for the pipe readers to reach
/// EOF once the child has been reaped.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Captured result of one command execution.
///
/// Returned verbatim to the HTTP caller. A non-zero exit is an ordinary
/// outcome (`ok: false` with the cause in `error`), not a transport
/// failure.
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutcome {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where a command runs.
#[derive(Debug, Clone)]
pub enum ExecTarget {
    /// Directly on the host.
    Local,
    /// Inside a named, already-running container.
    Container {
        runtime: ContainerRuntime,
        name: String,
    },
}

/// Seam between the HTTP layer and process execution, stubbed in tests.
#[async_trait]
pub trait ExecBackend: Send + Sync {
    /// Run an admitted command and capture its output.
    ///
    /// `Err` is reserved for failures to run at all (spawn errors);
    /// timeouts, truncation and non-zero exits are reported in-band.
    async fn run(&self, command: &str) -> ExecResult<ExecOutcome>;
}

/// Execution gateway: runs one command against a target with a timeout
/// and a bounded output capture.
#[derive(Debug, Clone)]
pub struct Executor {
    target: ExecTarget,
    shell: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl Executor {
    /// Build a gateway for a target.
    ///
    /// `shell` is the interpreter plus its command flag, e.g.
    /// `["pwsh", "-Command"]` or `["sh", "-c"]`; the command string is
    /// appended as one further argument.
    pub fn new(target: ExecTarget, shell: Vec<String>) -> ExecResult<Self> {
        if shell.is_empty() {
            return Err(ExecError::InvalidInput(
                "shell invocation cannot be empty".to_string(),
            ));
        }
        if let ExecTarget::Container { name, .. } = &target {
            runtime::validate_container_name(name)?;
        }
        Ok(Self {
            target,
            shell,
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        })
    }

    /// Override the wall-clock timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the per-stream capture ceiling.
    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    /// Program and argument vector for a command, with the command as a
    /// single trailing argv element.
    fn command_line(&self, command: &str) -> (String, Vec<String>) {
        match &self.target {
            ExecTarget::Local => {
                let program = self.shell[0].clone();
                let mut args: Vec<String> = self.shell[1..].to_vec();
                args.push(command.to_string());
                (program, args)
            }
            ExecTarget::Container { runtime, name } => {
                let mut args = vec!["exec".to_string(), name.clone()];
                args.extend(self.shell.iter().cloned());
                args.push(command.to_string());
                (runtime.binary().to_string(), args)
            }
        }
    }
}

#[async_trait]
impl ExecBackend for Executor {
    async fn run(&self, command: &str) -> ExecResult<ExecOutcome> {
        let (program, args) = self.command_line(command);
        debug!(%program, timeout_secs = self.timeout.as_secs(), "spawning command");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::Spawn {
                program: program.clone(),
                message: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ExecError::Spawn {
                program: program.clone(),
                message: "stdout pipe unavailable".to_string(),
            }
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            ExecError::Spawn {
                program: program.clone(),
                message: "stderr pipe unavailable".to_string(),
            }
        })?;

        // Readers drain the pipes for the child's whole lifetime but stop
        // storing past the cap, so memory stays bounded and the child
        // never blocks on a full pipe. Capture goes through shared
        // buffers so the prefixes survive even if a reader is abandoned.
        let cap = self.max_output_bytes;
        let out_buf = Arc::new(Mutex::new(Vec::new()));
        let err_buf = Arc::new(Mutex::new(Vec::new()));
        let out_truncated = Arc::new(AtomicBool::new(false));
        let err_truncated = Arc::new(AtomicBool::new(false));
        let mut out_task = tokio::spawn(drain_capped(
            stdout,
            cap,
            out_buf.clone(),
            out_truncated.clone(),
        ));
        let mut err_task = tokio::spawn(drain_capped(
            stderr,
            cap,
            err_buf.clone(),
            err_truncated.clone(),
        ));

        let deadline = Instant::now() + self.timeout;

        let status = match timeout_at(deadline, child.wait()).await {
            Ok(waited) => Some(waited?),
            Err(_) => {
                // Deadline passed: terminate the child and reap it so
                // nothing is left running.
                let _ = child.start_kill();
                let _ = child.wait().await;
                None
            }
        };

        // The readers can outlive the child: a descendant may inherit
        // the pipes and keep them open. The drain phase shares the same
        // deadline (plus a short grace) and abandons the readers on
        // expiry, closing our pipe ends.
        let drained = timeout_at(deadline + DRAIN_GRACE, async {
            let _ = (&mut out_task).await;
            let _ = (&mut err_task).await;
        })
        .await
        .is_ok();
        if !drained {
            out_task.abort();
            err_task.abort();
        }

        let stdout = take_lossy(&out_buf);
        let stderr = take_lossy(&err_buf);
        let truncated =
            out_truncated.load(Ordering::SeqCst) || err_truncated.load(Ordering::SeqCst);

        let error = if status.is_none() || !drained {
            Some(format!(
                "command timed out after {}s",
                self.timeout.as_secs_f32()
            ))
        } else if truncated {
            let mut message = format!("output exceeded {cap} bytes and was truncated");
            if let Some(status) = &status {
                if !status.success() {
                    message.push_str("; ");
                    message.push_str(&exit_message(status));
                }
            }
            Some(message)
        } else {
            match &status {
                Some(status) if !status.success() => Some(exit_message(status)),
                _ => None,
            }
        };

        Ok(ExecOutcome {
            ok: error.is_none(),
            stdout,
            stderr,
            error,
        })
    }
}

fn exit_message(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("command exited with status {code}"),
        None => "command terminated by signal".to_string(),
    }
}

fn take_lossy(buf: &Mutex<Vec<u8>>) -> String {
    let captured = buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    String::from_utf8_lossy(&captured).into_owned()
}

/// Read a stream to EOF, storing at most `cap` bytes into `sink`.
///
/// Keeps draining past the cap so the writer never blocks; sets
/// `truncated` when anything is discarded.
async fn drain_capped<R>(
    mut reader: R,
    cap: usize,
    sink: Arc<Mutex<Vec<u8>>>,
    truncated: Arc<AtomicBool>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                let mut captured = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if captured.len() < cap {
                    let keep = n.min(cap - captured.len());
                    captured.extend_from_slice(&chunk[..keep]);
                    if keep < n {
                        truncated.store(true, Ordering::SeqCst);
                    }
                } else {
                    truncated.store(true, Ordering::SeqCst);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn local_sh() -> Executor {
        Executor::new(ExecTarget::Local, vec!["sh".into(), "-c".into()]).unwrap()
    }

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let outcome = local_sh().run("echo hello").await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.stdout.trim(), "hello");
        assert!(outcome.stderr.is_empty());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_in_band() {
        let outcome = local_sh()
            .run("echo oops 1>&2 && exit 3")
            .await
            .unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.stderr.trim(), "oops");
        assert_eq!(
            outcome.error.as_deref(),
            Some("command exited with status 3")
        );
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let start = Instant::now();
        let outcome = local_sh()
            .with_timeout(Duration::from_millis(200))
            .run("sleep 30")
            .await
            .unwrap();
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().contains("timed out"));
        // the child must be gone well before its own sleep would end
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn timeout_bounds_descendants_holding_the_pipes() {
        // setsid re-parents a grandchild that inherits our pipe ends,
        // so the direct child exits immediately while the pipes stay
        // open. The call must still return within the deadline.
        let start = Instant::now();
        let outcome = local_sh()
            .with_timeout(Duration::from_millis(200))
            .run("setsid sleep 3")
            .await
            .unwrap();
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn oversized_output_is_truncated() {
        let outcome = local_sh()
            .with_max_output_bytes(1024)
            .run("head -c 100000 /dev/zero")
            .await
            .unwrap();
        assert!(!outcome.ok);
        assert!(outcome.stdout.len() <= 1024);
        assert!(outcome.error.unwrap().contains("truncated"));
    }

    #[tokio::test]
    async fn truncation_reports_the_exit_status_too() {
        let outcome = local_sh()
            .with_max_output_bytes(16)
            .run("head -c 100000 /dev/zero && exit 7")
            .await
            .unwrap();
        assert!(!outcome.ok);
        let error = outcome.error.unwrap();
        assert!(error.contains("truncated"), "missing truncation: {error}");
        assert!(
            error.contains("exited with status 7"),
            "missing exit status: {error}"
        );
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let exec = Executor::new(
            ExecTarget::Local,
            vec!["definitely-not-a-real-shell-9f2c".into(), "-c".into()],
        )
        .unwrap();
        assert!(matches!(
            exec.run("echo hi").await,
            Err(ExecError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn empty_shell_rejected() {
        assert!(matches!(
            Executor::new(ExecTarget::Local, vec![]),
            Err(ExecError::InvalidInput(_))
        ));
    }

    #[test]
    fn container_argv_keeps_command_as_single_argument() {
        let runtime = ContainerRuntime::with_type(RuntimeType::Docker);
        let exec = Executor::new(
            ExecTarget::Container {
                runtime,
                name: "powershell-container".into(),
            },
            vec!["pwsh".into(), "-Command".into()],
        )
        .unwrap();

        let (program, args) = exec.command_line("Get-Date; whoami");
        assert_eq!(program, "docker");
        assert_eq!(
            args,
            vec![
                "exec",
                "powershell-container",
                "pwsh",
                "-Command",
                "Get-Date; whoami"
            ]
        );
    }
}
