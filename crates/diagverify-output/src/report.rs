use diagverify_types::{MatchResult, MatchStatus, ReportDetail, VerificationReport};

/// Tallies match results into a report. Details keep the order of `results`.
pub fn build_report(file: &str, results: &[MatchResult]) -> VerificationReport {
    let mut report = VerificationReport {
        file: file.to_string(),
        matched_count: 0,
        missing_count: 0,
        unexpected_count: 0,
        details: Vec::with_capacity(results.len()),
    };

    for result in results {
        match result.status {
            MatchStatus::Matched => report.matched_count += 1,
            MatchStatus::Missing => report.missing_count += 1,
            MatchStatus::Unexpected => report.unexpected_count += 1,
        }
        if let Some(detail) = detail_for(result) {
            report.details.push(detail);
        }
    }

    report
}

fn detail_for(result: &MatchResult) -> Option<ReportDetail> {
    match (result.status, &result.expectation, &result.diagnostic) {
        (MatchStatus::Missing, Some(expectation), _) => Some(ReportDetail {
            status: result.status,
            line: expectation.line,
            kind: expectation.kind,
            text: expectation.pattern.to_string(),
        }),
        (_, _, Some(diagnostic)) => Some(ReportDetail {
            status: result.status,
            line: diagnostic.line,
            kind: diagnostic.kind,
            text: diagnostic.message.clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagverify_types::{Diagnostic, DiagnosticKind, Expectation, Verdict};

    const ALWAYS_TRUE: &str = "comparing non-optional value to nil always returns true";

    #[test]
    fn test_all_matched_passes() {
        let results = vec![
            MatchResult::matched(
                Expectation::substring(8, DiagnosticKind::Warning, ALWAYS_TRUE),
                Diagnostic::new(8, DiagnosticKind::Warning, ALWAYS_TRUE),
            ),
            MatchResult::matched(
                Expectation::substring(9, DiagnosticKind::Warning, ALWAYS_TRUE),
                Diagnostic::new(9, DiagnosticKind::Warning, ALWAYS_TRUE),
            ),
        ];
        let report = build_report("nil_value_to_optional.swift", &results);
        assert_eq!(report.matched_count, 2);
        assert_eq!(report.verdict(), Verdict::Pass);
        assert_eq!(report.details.len(), 2);
    }

    #[test]
    fn test_missing_detail_uses_pattern() {
        let results = vec![MatchResult::missing(Expectation::substring(
            25,
            DiagnosticKind::Error,
            "cannot force unwrap",
        ))];
        let report = build_report("t.swift", &results);
        assert_eq!(report.missing_count, 1);
        assert_eq!(report.verdict(), Verdict::Fail);
        assert_eq!(report.details[0].line, 25);
        assert_eq!(report.details[0].text, "{{cannot force unwrap}}");
    }

    #[test]
    fn test_unexpected_detail_uses_message() {
        let results = vec![MatchResult::unexpected(Diagnostic::new(
            18,
            DiagnosticKind::Warning,
            "always returns false",
        ))];
        let report = build_report("t.swift", &results);
        assert_eq!(report.unexpected_count, 1);
        assert_eq!(report.details[0].status, MatchStatus::Unexpected);
        assert_eq!(report.details[0].text, "always returns false");
    }
}
