//! Reconciles expected diagnostics with the ones the compiler emitted.
//!
//! Matching is greedy: each expectation, in line order, binds the earliest
//! emitted diagnostic on the same line with the same kind whose message
//! satisfies its pattern, and both leave the pool. No backtracking is done,
//! so a pattern that is a substring of several same-line messages can claim
//! one a later expectation needed.

use std::collections::HashMap;

use diagverify_types::{Diagnostic, DiagnosticKind, Expectation, MatchResult};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    /// Drop unbound notes instead of reporting them as unexpected.
    pub ignore_unexpected_notes: bool,
}

pub fn match_diagnostics(
    expectations: &[Expectation],
    diagnostics: &[Diagnostic],
) -> Vec<MatchResult> {
    match_diagnostics_with(expectations, diagnostics, MatchOptions::default())
}

/// Returns matched and missing results in expectation order, then unexpected
/// results in emission order.
pub fn match_diagnostics_with(
    expectations: &[Expectation],
    diagnostics: &[Diagnostic],
    options: MatchOptions,
) -> Vec<MatchResult> {
    let mut candidates: HashMap<(u32, DiagnosticKind), Vec<usize>> = HashMap::new();
    for (idx, diagnostic) in diagnostics.iter().enumerate() {
        candidates
            .entry((diagnostic.line, diagnostic.kind))
            .or_default()
            .push(idx);
    }

    let mut bound = vec![false; diagnostics.len()];
    let mut results = Vec::with_capacity(expectations.len() + diagnostics.len());

    for expectation in expectations {
        let found = candidates
            .get(&(expectation.line, expectation.kind))
            .and_then(|indices| {
                indices.iter().copied().find(|&idx| {
                    !bound[idx] && expectation.pattern.is_match(&diagnostics[idx].message)
                })
            });

        match found {
            Some(idx) => {
                bound[idx] = true;
                results.push(MatchResult::matched(
                    expectation.clone(),
                    diagnostics[idx].clone(),
                ));
            }
            None => {
                debug!(
                    "line {}: no {} matching {}",
                    expectation.line, expectation.kind, expectation.pattern
                );
                results.push(MatchResult::missing(expectation.clone()));
            }
        }
    }

    for (idx, diagnostic) in diagnostics.iter().enumerate() {
        if bound[idx] {
            continue;
        }
        if options.ignore_unexpected_notes && diagnostic.kind == DiagnosticKind::Note {
            debug!("line {}: ignoring unexpected note", diagnostic.line);
            continue;
        }
        results.push(MatchResult::unexpected(diagnostic.clone()));
    }

    results
}
