//! External processor invocation.
//!
//! Launches the processing command, streams its combined stdout/stderr
//! incrementally, and reports a single terminal [`RunResult`] per run.
//! Cancellation is cooperative: a [`CancellationToken`] kills the child,
//! and the supervisor still waits for it so the terminal result is
//! delivered exactly once. A failed launch is a typed error; a non-zero
//! exit is a normal result.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Output chunks are delivered as they arrive, not line-aligned.
const OUTPUT_CHANNEL_CAPACITY: usize = 64;
const READ_BUF_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("executable not found: {0}")]
    NotFound(String),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Terminal outcome of one run. Exactly one of success (`exit code 0`),
/// failure (non-zero or no exit code) or cancelled holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// None when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub cancelled: bool,
}

impl RunResult {
    pub fn success(&self) -> bool {
        !self.cancelled && self.exit_code == Some(0)
    }
}

/// The configured processing command: a program plus any leading args
/// (so `PROCESS_COMMAND="python3 process.py"` works).
#[derive(Debug, Clone)]
pub struct ProcessorCommand {
    program: String,
    base_args: Vec<String>,
}

impl ProcessorCommand {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Whitespace-split command line. Quoting is not interpreted; args
    /// with spaces belong in the command's own wrapper script.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split_whitespace().map(String::from);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            base_args: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn base_args(&self) -> &[String] {
        &self.base_args
    }

    /// Args for single-item mode: direct source path plus optional
    /// `--context "<string>"`.
    pub fn item_args(&self, source_path: &Path, context: Option<&str>) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push(source_path.to_string_lossy().to_string());
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            args.push("--context".to_string());
            args.push(ctx.to_string());
        }
        args
    }

    /// Args for the command's own batch mode: `--scan-imports`, no path.
    pub fn scan_imports_args(&self, context: Option<&str>) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("--scan-imports".to_string());
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            args.push("--context".to_string());
            args.push(ctx.to_string());
        }
        args
    }
}

/// Handle to one in-flight run. Dropping it kills the child
/// (`kill_on_drop`); `wait` consumes the handle, so the terminal result
/// can only be taken once.
#[derive(Debug)]
pub struct RunHandle {
    output: mpsc::Receiver<String>,
    result: oneshot::Receiver<RunResult>,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Next output chunk; `None` once both streams hit EOF.
    pub async fn recv_output(&mut self) -> Option<String> {
        self.output.recv().await
    }

    /// Request termination. The terminal result still arrives via
    /// [`RunHandle::wait`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve the terminal result. Exactly once per run.
    pub async fn wait(self) -> RunResult {
        match self.result.await {
            Ok(result) => result,
            // Supervisor task dropped without sending — only reachable if
            // the runtime is shutting down. Report a cancelled run.
            Err(_) => RunResult {
                exit_code: None,
                cancelled: true,
            },
        }
    }
}

/// Launch `program` with `args`, streaming combined output.
pub fn start(
    program: &str,
    args: &[String],
    working_dir: Option<&Path>,
) -> Result<RunHandle, LaunchError> {
    resolve_program(program)?;

    let mut command = tokio::process::Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
        program: program.to_string(),
        source,
    })?;

    debug!("Launched {} {:?}", program, args);

    let (output_tx, output_rx) = mpsc::channel::<String>(OUTPUT_CHANNEL_CAPACITY);
    let (result_tx, result_rx) = oneshot::channel::<RunResult>();
    let cancel = CancellationToken::new();

    // Stdout and stderr are pumped independently into one channel.
    // Ordering between the two streams is unspecified; within each
    // stream, chunk order is preserved.
    let stdout_task = pump(child.stdout.take(), output_tx.clone());
    let stderr_task = pump(child.stderr.take(), output_tx);

    let token = cancel.clone();
    tokio::spawn(async move {
        let (status, cancelled) = tokio::select! {
            status = child.wait() => (status, false),
            _ = token.cancelled() => {
                // Kill and still collect the exit. If the child exited
                // before the kill landed, that natural status wins the
                // race — acceptable either way, reported once.
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill processor: {}", e);
                }
                (child.wait().await, true)
            }
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let result = match status {
            Ok(status) => RunResult {
                exit_code: status.code(),
                cancelled,
            },
            Err(e) => {
                warn!("Failed to collect processor exit status: {}", e);
                RunResult {
                    exit_code: None,
                    cancelled,
                }
            }
        };
        let _ = result_tx.send(result);
    });

    Ok(RunHandle {
        output: output_rx,
        result: result_rx,
        cancel,
    })
}

/// Launch `command` in single-item mode against `source_path`.
pub fn start_item(
    command: &ProcessorCommand,
    source_path: &Path,
    context: Option<&str>,
) -> Result<RunHandle, LaunchError> {
    start(
        command.program(),
        &command.item_args(source_path, context),
        None,
    )
}

/// Read a stream in arbitrary-size chunks into the shared channel.
fn pump<R>(reader: Option<R>, tx: mpsc::Sender<String>) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Fail early with a typed error when the executable cannot be found,
/// so a missing processor reads differently from a failing one.
fn resolve_program(program: &str) -> Result<PathBuf, LaunchError> {
    if program.is_empty() {
        return Err(LaunchError::NotFound("<empty command>".to_string()));
    }
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(program);
        if path.exists() {
            return Ok(path);
        }
        return Err(LaunchError::NotFound(program.to_string()));
    }
    which::which(program).map_err(|_| LaunchError::NotFound(program.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> Result<RunHandle, LaunchError> {
        start(
            "/bin/sh",
            &["-c".to_string(), script.to_string()],
            None,
        )
    }

    async fn drain(handle: &mut RunHandle) -> String {
        let mut combined = String::new();
        while let Some(chunk) = handle.recv_output().await {
            combined.push_str(&chunk);
        }
        combined
    }

    #[test]
    fn test_parse_command_line() {
        let cmd = ProcessorCommand::parse("python3 process.py --quiet");
        assert_eq!(cmd.program(), "python3");
        assert_eq!(cmd.base_args(), &["process.py", "--quiet"]);

        let bare = ProcessorCommand::parse("meeting-processor");
        assert_eq!(bare.program(), "meeting-processor");
        assert!(bare.base_args().is_empty());
    }

    #[test]
    fn test_item_args_include_path_and_context() {
        let cmd = ProcessorCommand::parse("proc --flag");
        let args = cmd.item_args(Path::new("/rec/a"), Some("type=meeting; Alice"));
        assert_eq!(
            args,
            vec!["--flag", "/rec/a", "--context", "type=meeting; Alice"]
        );

        let no_ctx = cmd.item_args(Path::new("/rec/a"), None);
        assert_eq!(no_ctx, vec!["--flag", "/rec/a"]);
    }

    #[test]
    fn test_scan_imports_args() {
        let cmd = ProcessorCommand::parse("proc");
        assert_eq!(cmd.scan_imports_args(None), vec!["--scan-imports"]);
    }

    #[tokio::test]
    async fn test_streams_both_stdout_and_stderr() {
        let mut handle = sh("printf out; printf err >&2").unwrap();
        let combined = drain(&mut handle).await;
        assert!(combined.contains("out"));
        assert!(combined.contains("err"));

        let result = handle.wait().await;
        assert!(result.success());
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_result_not_an_error() {
        let mut handle = sh("exit 3").unwrap();
        drain(&mut handle).await;
        let result = handle.wait().await;
        assert!(!result.success());
        assert_eq!(result.exit_code, Some(3));
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_error() {
        let err = start("meetsync-no-such-binary-xyzzy", &[], None).unwrap_err();
        assert!(matches!(err, LaunchError::NotFound(_)));

        let err = start("/nonexistent/path/to/processor", &[], None).unwrap_err();
        assert!(matches!(err, LaunchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_delivers_terminal_result() {
        let mut handle = sh("sleep 30").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
        drain(&mut handle).await;
        let result = handle.wait().await;
        assert!(result.cancelled);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_cancel_after_exit_reports_natural_exit() {
        let mut handle = sh("exit 0").unwrap();
        drain(&mut handle).await;
        // Child is done by the time we cancel; wait still resolves once.
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
        let result = handle.wait().await;
        // Race between the two outcomes is acceptable; either way the
        // exit code of the finished process is observed.
        assert_eq!(result.exit_code, Some(0));
    }
}
