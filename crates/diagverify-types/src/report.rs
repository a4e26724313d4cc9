use serde::{Deserialize, Serialize};

use crate::{DiagnosticKind, MatchStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDetail {
    pub status: MatchStatus,
    pub line: u32,
    pub kind: DiagnosticKind,
    /// The expected pattern for missing results, the emitted message otherwise.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub file: String,
    pub matched_count: usize,
    pub missing_count: usize,
    pub unexpected_count: usize,
    #[serde(default)]
    pub details: Vec<ReportDetail>,
}

impl VerificationReport {
    pub fn verdict(&self) -> Verdict {
        if self.missing_count == 0 && self.unexpected_count == 0 {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict() == Verdict::Pass
    }
}

/// Why a fixture could not be verified at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    MalformedAnnotation,
    Invocation,
    Timeout,
    Io,
}

impl RunErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunErrorKind::MalformedAnnotation => "malformed annotation",
            RunErrorKind::Invocation => "invocation error",
            RunErrorKind::Timeout => "timeout",
            RunErrorKind::Io => "io error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Verified {
        report: VerificationReport,
    },
    Errored {
        file: String,
        kind: RunErrorKind,
        message: String,
    },
}

impl RunOutcome {
    pub fn file(&self) -> &str {
        match self {
            RunOutcome::Verified { report } => &report.file,
            RunOutcome::Errored { file, .. } => file,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub runs: Vec<RunOutcome>,
}

impl SuiteSummary {
    pub fn add(&mut self, outcome: RunOutcome) {
        match &outcome {
            RunOutcome::Verified { report } if report.passed() => self.passed += 1,
            RunOutcome::Verified { .. } => self.failed += 1,
            RunOutcome::Errored { .. } => self.errored += 1,
        }
        self.runs.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(missing: usize, unexpected: usize) -> VerificationReport {
        VerificationReport {
            file: "t.swift".to_string(),
            matched_count: 3,
            missing_count: missing,
            unexpected_count: unexpected,
            details: vec![],
        }
    }

    #[test]
    fn test_verdict() {
        assert_eq!(report(0, 0).verdict(), Verdict::Pass);
        assert_eq!(report(1, 0).verdict(), Verdict::Fail);
        assert_eq!(report(0, 1).verdict(), Verdict::Fail);
    }

    #[test]
    fn test_report_field_names() {
        let value = serde_json::to_value(report(1, 0)).unwrap();
        assert_eq!(value["matchedCount"], 3);
        assert_eq!(value["missingCount"], 1);
        assert_eq!(value["unexpectedCount"], 0);
        assert_eq!(value["file"], "t.swift");
    }

    #[test]
    fn test_suite_summary_counts() {
        let mut summary = SuiteSummary::default();
        summary.add(RunOutcome::Verified { report: report(0, 0) });
        summary.add(RunOutcome::Verified { report: report(0, 2) });
        summary.add(RunOutcome::Errored {
            file: "b.swift".to_string(),
            kind: RunErrorKind::Timeout,
            message: "timed out".to_string(),
        });
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.total(), 3);
    }
}
