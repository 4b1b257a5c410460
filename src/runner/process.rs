//! Process runner implementation
//!
//! Stages each submission in its own temp dir and executes it as a fresh child
//! process group. No filesystem or network confinement is applied.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ExecutionResult, Runner};
use crate::error::{JudgeError, Result};
use crate::languages::LanguageConfig;

/// How long to wait for output pipes to close once the process group is gone
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Runner that executes submissions directly as child processes
pub struct ProcessRunner {
    language: LanguageConfig,
    /// Parent directory for per-run temp dirs (system temp dir if unset)
    scratch_root: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(language: LanguageConfig) -> Self {
        Self {
            language,
            scratch_root: None,
        }
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn language(&self) -> &LanguageConfig {
        &self.language
    }

    /// Write the submission into a uniquely named temp dir
    fn stage(&self, code: &str) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("judge-");

        let workspace = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(JudgeError::Staging)?;

        std::fs::write(workspace.path().join(&self.language.source_file), code)
            .map_err(JudgeError::Staging)?;

        Ok(workspace)
    }

    /// Run a submission, returning infrastructure faults as errors
    pub async fn execute(
        &self,
        code: &str,
        input: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        // The temp dir is removed when `workspace` drops, on every path out of here.
        let workspace = self.stage(code)?;
        let program = self.language.program()?;

        debug!(
            "Running {} submission in {:?} (timeout {:?})",
            self.language.name,
            workspace.path(),
            timeout
        );

        let mut cmd = Command::new(program);
        cmd.args(self.language.args())
            .envs(self.language.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(workspace.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // New process group so the whole tree can be killed at once.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| JudgeError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id();

        let stdin_writer = feed_stdin(&mut child, input);
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let waited = tokio::time::timeout(timeout, child.wait()).await;

        let exit_status = match waited {
            Ok(Ok(status)) => {
                // The leader is already reaped. Linux keeps the group id reserved
                // while any member is alive, so this reaches only leftovers of
                // this run, or nothing.
                if let Some(pid) = pid {
                    kill_group(pid);
                }
                Some(status)
            }
            Ok(Err(e)) => {
                terminate(&mut child, pid).await;
                stdin_writer.abort();
                stdout_reader.abort();
                stderr_reader.abort();
                return Err(JudgeError::Wait(e));
            }
            Err(_) => {
                // Leader not reaped yet, so the group id still belongs to this run.
                terminate(&mut child, pid).await;
                None
            }
        };
        stdin_writer.abort();

        let stdout = collect(stdout_reader).await;
        let stderr = collect(stderr_reader).await;

        let result = match exit_status {
            Some(status) if status.success() => ExecutionResult::success(stdout, stderr),
            Some(status) => {
                debug!("Submission exited with {}", status);
                ExecutionResult::runtime_error(stdout, stderr)
            }
            None => {
                warn!(
                    "Submission exceeded {}s deadline and was killed",
                    timeout.as_secs()
                );
                ExecutionResult::timeout(stdout, timeout)
            }
        };

        Ok(result)
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, code: &str, input: &str, timeout: Duration) -> ExecutionResult {
        match self.execute(code, input, timeout).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Execution infrastructure failure: {}", e);
                ExecutionResult::system_error(e)
            }
        }
    }
}

/// Write the whole input to the child's stdin, then close it
fn feed_stdin(child: &mut Child, input: &str) -> JoinHandle<()> {
    let stdin = child.stdin.take();
    let input = input.as_bytes().to_vec();

    tokio::spawn(async move {
        let Some(mut stdin) = stdin else {
            return;
        };
        if let Err(e) = stdin.write_all(&input).await {
            // The program may exit without consuming its input.
            debug!("stdin closed before input was fully written: {}", e);
        }
    })
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!("Output pipe read failed after {} bytes: {}", buf.len(), e);
            }
        }
        buf
    })
}

/// Decode captured bytes as UTF-8 regardless of the host locale
async fn collect(mut reader: JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut reader).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            warn!("Output reader task failed: {}", e);
            String::new()
        }
        Err(_) => {
            warn!("Output pipe still open after process group was killed");
            reader.abort();
            String::new()
        }
    }
}

/// SIGKILL the child's process group, then reap the still-unreaped leader
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_group(pid);
    }

    let _ = child.start_kill();
    if let Err(e) = child.wait().await {
        warn!("Failed to reap child process: {}", e);
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // ESRCH means nothing is left in the group.
    let _ = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}
