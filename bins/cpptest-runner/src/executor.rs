//! Test Orchestrator - High-Level Run Sequencing
//!
//! **Responsibility:**
//! Drive one user action through forbidden check, build, run and comparison,
//! and turn the outcome into a single verdict.
//!
//! **Architecture:**
//! 1. Forbidden-construct check (forbidden.rs)
//! 2. Build and run through a `Toolchain` (engine.rs)
//! 3. Compare outputs (evaluator.rs)
//!
//! This module is the glue layer. The test record is only borrowed, never
//! modified, and every invocation gets its own source/executable pair.

use crate::engine::{
    self, BuildArtifact, BuildError, CapturedOutput, OutputCapture, ScratchDir, Toolchain,
    SOURCE_FILE_NAME,
};
use crate::evaluator::{self, Comparison};
use crate::forbidden;
use chrono::{DateTime, Utc};
use cpptest_common::types::{CaseMatching, TestRecord};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const EMPTY_SOURCE_MESSAGE: &str = "Please enter code before running.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    ForbiddenCheck,
    Building,
    Running,
    Comparing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Idle => "validation",
            Stage::ForbiddenCheck => "forbidden check",
            Stage::Building => "build",
            Stage::Running => "run",
            Stage::Comparing => "comparison",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed {
        expected: String,
        actual: String,
        exit_code: Option<i32>,
    },
    Aborted {
        stage: Stage,
        reason: String,
    },
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }

    /// Human-readable verdict
    pub fn message(&self) -> String {
        match self {
            Verdict::Passed => "✅ Test passed.".to_string(),
            Verdict::Failed {
                expected,
                actual,
                exit_code,
            } => {
                let mut message = format!(
                    "❌ Test failed.\n\nExpected:\n{}\n\nActual:\n{}",
                    expected, actual
                );
                if let Some(code) = exit_code.filter(|code| *code != 0) {
                    message.push_str(&format!("\n\nProgram exited with code {}", code));
                }
                message
            }
            Verdict::Aborted { stage, reason } => {
                format!("⚠ Aborted during {}:\n{}", stage, reason)
            }
        }
    }
}

/// Outcome of one "run with test" action
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub test: String,
    /// Last stage entered before the verdict
    pub stage: Stage,
    pub verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Failure of a plain compile-and-run action
#[derive(Debug, Clone, Error)]
#[error("{stage} failed: {reason}")]
pub struct RunFailure {
    pub stage: Stage,
    pub reason: String,
}

/// Where the source text is written before compiling
#[derive(Debug, Clone, Default)]
pub enum SourcePlacement {
    /// Fresh scratch directory, removed afterwards
    #[default]
    Scratch,
    /// User-chosen source path; the executable lands next to it
    SaveAs(PathBuf),
}

/// Source and executable paths for one invocation
struct Workspace {
    source: PathBuf,
    executable: PathBuf,
    _scratch: Option<ScratchDir>,
}

impl Workspace {
    fn prepare(placement: &SourcePlacement, exe_suffix: &str) -> std::io::Result<Self> {
        match placement {
            SourcePlacement::Scratch => {
                let scratch = ScratchDir::create()?;
                let source = scratch.path().join(SOURCE_FILE_NAME);
                let executable = scratch.path().join(format!("main{}", exe_suffix));
                Ok(Self {
                    source,
                    executable,
                    _scratch: Some(scratch),
                })
            }
            SourcePlacement::SaveAs(path) => Ok(Self {
                source: path.clone(),
                executable: executable_beside(path, exe_suffix),
                _scratch: None,
            }),
        }
    }
}

/// `dir/main.cpp` → `dir/main<suffix>`, never the source path itself
fn executable_beside(source: &Path, exe_suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string());

    let executable = source.with_file_name(format!("{}{}", stem, exe_suffix));
    if executable == source {
        source.with_file_name(format!("{}.out", stem))
    } else {
        executable
    }
}

/// Stage tracking and logging for a single run
struct RunTracker {
    run_id: Uuid,
    test: String,
    stage: Stage,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl RunTracker {
    fn start(test: &str) -> Self {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, test = %test, "Starting test run");
        Self {
            run_id,
            test: test.to_string(),
            stage: Stage::Idle,
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!(
            run_id = %self.run_id,
            stage = ?stage,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            "Entering stage"
        );
        self.stage = stage;
    }

    fn abort(self, reason: impl Into<String>) -> RunReport {
        let stage = self.stage;
        self.finish(Verdict::Aborted {
            stage,
            reason: reason.into(),
        })
    }

    fn finish(self, verdict: Verdict) -> RunReport {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;

        match &verdict {
            Verdict::Passed => {
                info!(run_id = %self.run_id, test = %self.test, elapsed_ms, "Test passed")
            }
            Verdict::Failed { .. } => {
                warn!(run_id = %self.run_id, test = %self.test, elapsed_ms, "Test failed")
            }
            Verdict::Aborted { stage, reason } => warn!(
                run_id = %self.run_id,
                test = %self.test,
                stage = ?stage,
                reason = reason.lines().next().unwrap_or(""),
                "Test run aborted"
            ),
        }

        RunReport {
            run_id: self.run_id,
            test: self.test,
            stage: self.stage,
            verdict,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed_ms,
        }
    }
}

pub struct TestOrchestrator<T> {
    toolchain: T,
    forbidden_case: CaseMatching,
    exe_suffix: String,
}

impl<T: Toolchain> TestOrchestrator<T> {
    pub fn new(toolchain: T, forbidden_case: CaseMatching, exe_suffix: impl Into<String>) -> Self {
        Self {
            toolchain,
            forbidden_case,
            exe_suffix: exe_suffix.into(),
        }
    }

    /// Check, build, run with the test's input and compare against its
    /// expected output.
    pub async fn run_with_test(
        &self,
        source: &str,
        record: &TestRecord,
        placement: &SourcePlacement,
    ) -> RunReport {
        let mut run = RunTracker::start(&record.name);

        if source.trim().is_empty() {
            return run.abort(EMPTY_SOURCE_MESSAGE);
        }

        run.enter(Stage::ForbiddenCheck);
        if let Some(token) = forbidden::check(source, &record.forbidden, self.forbidden_case) {
            return run.abort(format!("Code contains a forbidden construct: {}", token));
        }

        run.enter(Stage::Building);
        let (_workspace, artifact) = match self.build(source, placement).await {
            Ok(built) => built,
            Err(e) => return run.abort(e.to_string()),
        };

        run.enter(Stage::Running);
        let captured = match self
            .toolchain
            .run(&artifact.executable_path, &record.input, OutputCapture::StdoutOnly)
            .await
        {
            Ok(captured) => captured,
            Err(e) => return run.abort(e.to_string()),
        };

        run.enter(Stage::Comparing);
        let verdict = match evaluator::compare(&record.expected, &captured.output) {
            Comparison::Match => Verdict::Passed,
            Comparison::Mismatch { expected, actual } => Verdict::Failed {
                expected,
                actual,
                exit_code: captured.exit_code,
            },
        };

        run.finish(verdict)
    }

    /// Build and run without a test, stderr merged into the output
    pub async fn compile_and_run(
        &self,
        source: &str,
        stdin: &str,
        placement: &SourcePlacement,
    ) -> Result<CapturedOutput, RunFailure> {
        if source.trim().is_empty() {
            return Err(RunFailure {
                stage: Stage::Idle,
                reason: EMPTY_SOURCE_MESSAGE.to_string(),
            });
        }

        let (_workspace, artifact) = self.build(source, placement).await.map_err(|e| RunFailure {
            stage: Stage::Building,
            reason: e.to_string(),
        })?;

        self.toolchain
            .run(&artifact.executable_path, stdin, OutputCapture::Merged)
            .await
            .map_err(|e| RunFailure {
                stage: Stage::Running,
                reason: e.to_string(),
            })
    }

    /// The workspace must outlive the artifact's use: dropping it removes
    /// any scratch files.
    async fn build(
        &self,
        source: &str,
        placement: &SourcePlacement,
    ) -> Result<(Workspace, BuildArtifact), BuildError> {
        let workspace = Workspace::prepare(placement, &self.exe_suffix)?;
        engine::write_source(&workspace.source, source).await?;

        let artifact = self
            .toolchain
            .compile(&workspace.source, &workspace.executable)
            .await?;

        debug!(
            source = %artifact.source_path.display(),
            executable = %artifact.executable_path.display(),
            compile_time_ms = artifact.compile_time_ms,
            compiler_output = %artifact.diagnostics.trim(),
            "Build finished"
        );

        Ok((workspace, artifact))
    }
}
