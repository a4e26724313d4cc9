use serde::{Deserialize, Serialize};

use crate::{Diagnostic, Expectation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Unexpected,
    Missing,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Unexpected => "unexpected",
            MatchStatus::Missing => "missing",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reconciled entry: an expectation, a diagnostic, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub expectation: Option<Expectation>,
    pub diagnostic: Option<Diagnostic>,
    pub status: MatchStatus,
}

impl MatchResult {
    pub fn matched(expectation: Expectation, diagnostic: Diagnostic) -> Self {
        Self {
            expectation: Some(expectation),
            diagnostic: Some(diagnostic),
            status: MatchStatus::Matched,
        }
    }

    pub fn missing(expectation: Expectation) -> Self {
        Self {
            expectation: Some(expectation),
            diagnostic: None,
            status: MatchStatus::Missing,
        }
    }

    pub fn unexpected(diagnostic: Diagnostic) -> Self {
        Self {
            expectation: None,
            diagnostic: Some(diagnostic),
            status: MatchStatus::Unexpected,
        }
    }

    /// Line the result refers to: the diagnostic's line if present, else the expectation's.
    pub fn line(&self) -> u32 {
        self.diagnostic
            .as_ref()
            .map(|d| d.line)
            .or_else(|| self.expectation.as_ref().map(|e| e.line))
            .unwrap_or(0)
    }
}
