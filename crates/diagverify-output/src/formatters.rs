use diagverify_types::{
    Expectation, MatchStatus, ReportDetail, RunOutcome, SuiteSummary, VerificationReport,
};

pub fn format_expectations(file: &str, expectations: &[Expectation]) -> String {
    if expectations.is_empty() {
        return format!("{}: no annotations", file);
    }
    expectations
        .iter()
        .map(|e| {
            let relocated = if e.line != e.annotation_line {
                format!(" (annotated on line {})", e.annotation_line)
            } else {
                String::new()
            };
            format!(
                "{}:{}: expected {} {}{}",
                file, e.line, e.kind, e.pattern, relocated
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_detail(file: &str, detail: &ReportDetail) -> String {
    match detail.status {
        MatchStatus::Missing => format!(
            "{}:{}: missing {} {}",
            file, detail.line, detail.kind, detail.text
        ),
        MatchStatus::Unexpected => format!(
            "{}:{}: unexpected {}: {}",
            file, detail.line, detail.kind, detail.text
        ),
        MatchStatus::Matched => format!(
            "{}:{}: matched {}: {}",
            file, detail.line, detail.kind, detail.text
        ),
    }
}

pub fn format_report(report: &VerificationReport) -> String {
    let mut lines: Vec<String> = report
        .details
        .iter()
        .filter(|d| d.status != MatchStatus::Matched)
        .map(|d| format_detail(&report.file, d))
        .collect();

    lines.push(format!(
        "{} {}: {} matched, {} missing, {} unexpected",
        report.verdict(),
        report.file,
        report.matched_count,
        report.missing_count,
        report.unexpected_count
    ));

    lines.join("\n")
}

pub fn format_run_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Verified { report } => format_report(report),
        RunOutcome::Errored {
            file,
            kind,
            message,
        } => format!("ERROR {}: {}: {}", file, kind.as_str(), message),
    }
}

pub fn format_suite_summary(summary: &SuiteSummary) -> String {
    let mut lines = Vec::new();
    for run in &summary.runs {
        match run {
            RunOutcome::Verified { report } if report.passed() => {
                lines.push(format!("PASS {}", report.file));
            }
            _ => lines.push(format_run_outcome(run)),
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{} passed, {} failed, {} errored",
        summary.passed, summary.failed, summary.errored
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagverify_types::{DiagnosticKind, RunErrorKind};

    #[test]
    fn test_format_expectations() {
        let mut relocated = Expectation::substring(12, DiagnosticKind::Note, "declared here");
        relocated.annotation_line = 11;
        let expectations = vec![
            Expectation::substring(8, DiagnosticKind::Warning, "always returns true"),
            relocated,
        ];
        assert_eq!(
            format_expectations("t.swift", &expectations),
            "t.swift:8: expected warning {{always returns true}}\n\
             t.swift:12: expected note {{declared here}} (annotated on line 11)"
        );
        assert_eq!(format_expectations("t.swift", &[]), "t.swift: no annotations");
    }

    fn detail(status: MatchStatus, line: u32, kind: DiagnosticKind, text: &str) -> ReportDetail {
        ReportDetail {
            status,
            line,
            kind,
            text: text.to_string(),
        }
    }

    fn failing_report() -> VerificationReport {
        VerificationReport {
            file: "t.swift".to_string(),
            matched_count: 1,
            missing_count: 1,
            unexpected_count: 1,
            details: vec![
                detail(MatchStatus::Matched, 9, DiagnosticKind::Warning, "always returns true"),
                detail(
                    MatchStatus::Missing,
                    25,
                    DiagnosticKind::Error,
                    "{{cannot force unwrap}}",
                ),
                detail(
                    MatchStatus::Unexpected,
                    18,
                    DiagnosticKind::Warning,
                    "always returns false",
                ),
            ],
        }
    }

    #[test]
    fn test_format_report_lists_mismatches() {
        let output = format_report(&failing_report());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "t.swift:25: missing error {{cannot force unwrap}}",
                "t.swift:18: unexpected warning: always returns false",
                "FAIL t.swift: 1 matched, 1 missing, 1 unexpected",
            ]
        );
    }

    #[test]
    fn test_format_passing_report() {
        let report = VerificationReport {
            file: "ok.swift".to_string(),
            matched_count: 2,
            missing_count: 0,
            unexpected_count: 0,
            details: vec![],
        };
        assert_eq!(
            format_report(&report),
            "PASS ok.swift: 2 matched, 0 missing, 0 unexpected"
        );
    }

    #[test]
    fn test_format_errored_outcome() {
        let outcome = RunOutcome::Errored {
            file: "slow.swift".to_string(),
            kind: RunErrorKind::Timeout,
            message: "Compiler 'swiftc' timed out after 5s".to_string(),
        };
        assert_eq!(
            format_run_outcome(&outcome),
            "ERROR slow.swift: timeout: Compiler 'swiftc' timed out after 5s"
        );
    }

    #[test]
    fn test_format_suite_summary() {
        let mut summary = SuiteSummary::default();
        summary.add(RunOutcome::Verified {
            report: VerificationReport {
                file: "a.swift".to_string(),
                matched_count: 1,
                missing_count: 0,
                unexpected_count: 0,
                details: vec![],
            },
        });
        summary.add(RunOutcome::Verified {
            report: failing_report(),
        });

        let output = format_suite_summary(&summary);
        assert!(output.starts_with("PASS a.swift\n"));
        assert!(output.contains("t.swift:25: missing error"));
        assert!(output.ends_with("\n\n1 passed, 1 failed, 0 errored"));
    }

    #[test]
    fn test_empty_suite() {
        assert_eq!(
            format_suite_summary(&SuiteSummary::default()),
            "0 passed, 0 failed, 0 errored"
        );
    }
}
