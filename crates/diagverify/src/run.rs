use std::path::{Path, PathBuf};
use std::time::Duration;

use diagverify_compiler::{CompilerInvoker, InvokeError, InvokeOptions};
use diagverify_config::Config;
use diagverify_match::{match_diagnostics_with, MatchOptions};
use diagverify_output::build_report;
use diagverify_source::{read_file_content, scan_annotations, ScanError, TextError};
use diagverify_types::{RunErrorKind, RunOutcome, SuiteSummary, VerificationReport};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error(transparent)]
    Read(#[from] TextError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl VerifyError {
    pub fn kind(&self) -> RunErrorKind {
        match self {
            VerifyError::Read(_) => RunErrorKind::Io,
            VerifyError::Scan(_) => RunErrorKind::MalformedAnnotation,
            VerifyError::Invoke(e) if e.is_timeout() => RunErrorKind::Timeout,
            VerifyError::Invoke(InvokeError::Io(_)) => RunErrorKind::Io,
            VerifyError::Invoke(_) => RunErrorKind::Invocation,
        }
    }
}

/// Everything one verification run needs, shared read-only across runs.
#[derive(Debug, Clone)]
pub struct Harness {
    invoker: CompilerInvoker,
    options: InvokeOptions,
    match_options: MatchOptions,
}

impl Harness {
    pub fn new(invoker: CompilerInvoker, options: InvokeOptions, match_options: MatchOptions) -> Self {
        Self {
            invoker,
            options,
            match_options,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, InvokeError> {
        let invoker = CompilerInvoker::from_config(&config.compiler)?;
        let options = InvokeOptions {
            mode: config.compiler.mode,
            target_flags: config.compiler.target_flags.clone(),
            timeout: Duration::from_secs(config.harness.timeout_seconds),
        };
        let match_options = MatchOptions {
            ignore_unexpected_notes: config.harness.ignore_unexpected_notes,
        };
        Ok(Self::new(invoker, options, match_options))
    }

    /// Scans, compiles and matches one fixture. Failures that prevent a
    /// verdict come back as [`RunOutcome::Errored`].
    pub async fn verify_file(&self, path: &Path) -> RunOutcome {
        let file = path.display().to_string();
        match self.try_verify(path, &file).await {
            Ok(report) => {
                info!("{} {}", report.verdict(), file);
                RunOutcome::Verified { report }
            }
            Err(e) => {
                info!("ERROR {}: {}", file, e);
                RunOutcome::Errored {
                    file,
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }

    async fn try_verify(&self, path: &Path, file: &str) -> Result<VerificationReport, VerifyError> {
        let source = read_file_content(path)?;
        let expectations = scan_annotations(&source)?;
        debug!("{}: {} expectation(s)", file, expectations.len());

        let invocation = self.invoker.invoke(path, &self.options).await?;
        debug!(
            "{}: compiler exited {} with {} diagnostic(s)",
            file,
            invocation.exit_code,
            invocation.diagnostics.len()
        );

        let results =
            match_diagnostics_with(&expectations, &invocation.diagnostics, self.match_options);
        Ok(build_report(file, &results))
    }

    /// Verifies `files` with at most `jobs` compilers in flight. Outcomes
    /// keep the order of `files`.
    pub async fn verify_suite(&self, files: Vec<PathBuf>, jobs: usize) -> SuiteSummary {
        let outcomes: Vec<RunOutcome> = stream::iter(files)
            .map(|path| async move { self.verify_file(&path).await })
            .buffered(jobs.max(1))
            .collect()
            .await;

        let mut summary = SuiteSummary::default();
        for outcome in outcomes {
            summary.add(outcome);
        }
        summary
    }
}

pub fn outcome_exit_code(outcome: &RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Verified { report } if report.passed() => 0,
        RunOutcome::Verified { .. } => 1,
        RunOutcome::Errored { .. } => 2,
    }
}

pub fn suite_exit_code(summary: &SuiteSummary) -> u8 {
    if summary.errored > 0 {
        2
    } else if summary.failed > 0 {
        1
    } else {
        0
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
