//! Execution Engine - Compiler and Program Processes
//!
//! **Core Responsibility:**
//! Build a source file with the external compiler and run the resulting
//! executable, capturing raw outputs.
//!
//! **Critical Architectural Boundary:**
//! - Engine knows HOW to build and run (child processes, pipes, timeouts)
//! - Engine does NOT know about forbidden constructs
//! - Engine does NOT evaluate correctness
//! - Engine returns raw outputs for the Evaluator to judge
//!
//! Every child is spawned with `kill_on_drop` and is killed explicitly when
//! its timeout elapses.
//!
//! Merged capture is stdout followed by stderr, not interleaved in write order.

use serde::Serialize;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub const SOURCE_FILE_NAME: &str = "main.cpp";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Compilation did not finish within {} ms", .0.as_millis())]
    Timeout(Duration),

    /// Compiler output, verbatim
    #[error("{0}")]
    CompilerDiagnostics(String),

    #[error("File {} was not created!", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("Failed to launch compiler '{program}': {source}")]
    CompilerLaunch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while building: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to start program {}: {source}", path.display())]
    LaunchFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Program did not finish within {} ms", .0.as_millis())]
    DidNotExit(Duration),

    #[error("I/O error while running program: {0}")]
    Io(#[from] io::Error),
}

/// Result of a successful compile
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    pub source_path: PathBuf,
    pub executable_path: PathBuf,
    /// Whatever the compiler printed on stdout (warnings fail the build via stderr)
    pub diagnostics: String,
    pub compile_time_ms: u64,
}

/// Which streams end up in `CapturedOutput::output`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCapture {
    StdoutOnly,
    /// stderr appended after stdout
    Merged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    pub output: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
}

/// How the external compiler is invoked
#[derive(Debug, Clone)]
pub struct CompilerCommand {
    pub program: String,
    /// Placed before the source path
    pub args: Vec<String>,
}

impl CompilerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

/// Build-and-run backend used by the orchestrator.
///
/// Lets the orchestration state machine run without a real compiler.
pub trait Toolchain {
    fn compile(
        &self,
        source: &Path,
        executable: &Path,
    ) -> impl Future<Output = Result<BuildArtifact, BuildError>> + Send;

    fn run(
        &self,
        executable: &Path,
        stdin: &str,
        capture: OutputCapture,
    ) -> impl Future<Output = Result<CapturedOutput, RunError>> + Send;
}

/// Production toolchain: real compiler, real child processes
#[derive(Debug, Clone)]
pub struct ProcessToolchain {
    compiler: CompilerCommand,
    compile_timeout: Option<Duration>,
    run_timeout: Option<Duration>,
}

impl ProcessToolchain {
    pub fn new(
        compiler: CompilerCommand,
        compile_timeout: Option<Duration>,
        run_timeout: Option<Duration>,
    ) -> Self {
        Self {
            compiler,
            compile_timeout,
            run_timeout,
        }
    }
}

impl Toolchain for ProcessToolchain {
    async fn compile(&self, source: &Path, executable: &Path) -> Result<BuildArtifact, BuildError> {
        compile(&self.compiler, source, executable, self.compile_timeout).await
    }

    async fn run(
        &self,
        executable: &Path,
        stdin: &str,
        capture: OutputCapture,
    ) -> Result<CapturedOutput, RunError> {
        run(executable, stdin, self.run_timeout, capture).await
    }
}

/// Per-invocation scratch directory, removed on drop.
///
/// The UUID suffix keeps concurrent runs from sharing files.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create() -> io::Result<Self> {
        let path = std::env::temp_dir().join(format!("cpptest-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        debug!(path = %path.display(), "Created scratch directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        // Best-effort cleanup, never panic in Drop
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}

/// Write source text to disk, creating the parent directory if needed
pub async fn write_source(path: &Path, source: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, source).await
}

/// Compile `source` into `executable`.
///
/// Runs `<compiler> [args..] <source> -o <executable>` from the source's
/// directory. Any stderr output, even with exit code 0, fails the build.
#[tracing::instrument(skip(compiler), fields(compiler = %compiler.program))]
pub async fn compile(
    compiler: &CompilerCommand,
    source: &Path,
    executable: &Path,
    timeout: Option<Duration>,
) -> Result<BuildArtifact, BuildError> {
    let source = absolutize(source)?;
    let executable = absolutize(executable)?;
    let workdir = parent_dir(&source);

    let start_time = Instant::now();

    let mut cmd = Command::new(&compiler.program);
    cmd.args(&compiler.args)
        .arg(&source)
        .arg("-o")
        .arg(&executable)
        .current_dir(&workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(
        workdir = %workdir.display(),
        args = ?compiler.args,
        "Spawning compiler"
    );

    let mut child = cmd.spawn().map_err(|source| BuildError::CompilerLaunch {
        program: compiler.program.clone(),
        source,
    })?;

    let output = match wait_with_timeout(&mut child, None, timeout).await? {
        Some(output) => output,
        None => {
            let limit = timeout.unwrap_or_default();
            warn!(timeout_ms = limit.as_millis() as u64, "Compilation timed out; compiler killed");
            return Err(BuildError::Timeout(limit));
        }
    };

    let compile_time_ms = start_time.elapsed().as_millis() as u64;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() || !stderr.trim().is_empty() {
        let diagnostics = if !stderr.trim().is_empty() {
            stderr
        } else if !stdout.trim().is_empty() {
            stdout
        } else {
            format!("Compiler exited with {}", output.status)
        };

        warn!(
            compile_time_ms,
            exit_code = ?output.status.code(),
            error_preview = diagnostics.lines().next().unwrap_or(""),
            "Compilation failed"
        );
        return Err(BuildError::CompilerDiagnostics(diagnostics));
    }

    if !executable.is_file() {
        warn!(executable = %executable.display(), "Compiler reported success but produced no executable");
        return Err(BuildError::ArtifactMissing(executable));
    }

    info!(compile_time_ms, "Compilation succeeded");

    Ok(BuildArtifact {
        source_path: source,
        executable_path: executable,
        diagnostics: stdout,
        compile_time_ms,
    })
}

/// Run a compiled program.
///
/// Non-empty `stdin` is written in full and the pipe closed; empty `stdin`
/// gives the child a closed input. A non-zero exit code is reported in the
/// captured output, not as an error.
#[tracing::instrument(skip(stdin), fields(stdin_bytes = stdin.len()))]
pub async fn run(
    executable: &Path,
    stdin: &str,
    timeout: Option<Duration>,
    capture: OutputCapture,
) -> Result<CapturedOutput, RunError> {
    let executable = absolutize(executable)?;
    let workdir = parent_dir(&executable);

    let stdin_mode = if stdin.is_empty() {
        Stdio::null()
    } else {
        Stdio::piped()
    };

    let start_time = Instant::now();

    let mut child = Command::new(&executable)
        .current_dir(&workdir)
        .stdin(stdin_mode)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::LaunchFailed {
            path: executable.clone(),
            source,
        })?;

    let input = (!stdin.is_empty()).then_some(stdin.as_bytes());

    let output = match wait_with_timeout(&mut child, input, timeout).await? {
        Some(output) => output,
        None => {
            let limit = timeout.unwrap_or_default();
            warn!(timeout_ms = limit.as_millis() as u64, "Program timed out; process killed");
            return Err(RunError::DidNotExit(limit));
        }
    };

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_code = output.status.code();

    if output.status.success() {
        debug!(execution_time_ms, "Program exited successfully");
    } else {
        warn!(execution_time_ms, exit_code = ?exit_code, "Program exited with failure status");
    }

    let output = match capture {
        OutputCapture::StdoutOnly => stdout,
        OutputCapture::Merged => stdout + &stderr,
    };

    Ok(CapturedOutput {
        output,
        stderr,
        exit_code,
        execution_time_ms,
    })
}

struct ProcessOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Wait for the child, killing it if `timeout` elapses first.
///
/// `Ok(None)` means the timeout fired.
async fn wait_with_timeout(
    child: &mut Child,
    input: Option<&[u8]>,
    timeout: Option<Duration>,
) -> io::Result<Option<ProcessOutput>> {
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, drive_child(child, input))
            .await
            .ok(),
        None => Some(drive_child(child, input).await),
    };

    match outcome {
        Some(result) => result.map(Some),
        None => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill timed-out process");
            }
            Ok(None)
        }
    }
}

/// Feed stdin, drain stdout/stderr and wait for exit, all concurrently so a
/// chatty child never blocks on a full pipe.
async fn drive_child(child: &mut Child, input: Option<&[u8]>) -> io::Result<ProcessOutput> {
    let stdin_pipe = child.stdin.take();
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let feed = async move {
        if let (Some(mut pipe), Some(data)) = (stdin_pipe, input) {
            match pipe.write_all(data).await {
                Ok(()) => {}
                // Child exited without reading everything
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
            }
            // pipe dropped here, closing the child's stdin
        }
        Ok::<(), io::Error>(())
    };

    let read_stdout = async {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<Vec<u8>, io::Error>(buf)
    };

    let read_stderr = async {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<Vec<u8>, io::Error>(buf)
    };

    let ((), stdout, stderr, status) =
        tokio::try_join!(feed, read_stdout, read_stderr, child.wait())?;

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
