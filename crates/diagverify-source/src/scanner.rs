//! Extraction of `expected-<kind> {{...}}` annotations from fixture text.
//!
//! A marker is `expected-error`, `expected-warning` or `expected-note`,
//! optionally suffixed with `-re` (the fragment is a regex) and an `@`
//! line target: `@+N` / `@-N` relative to the annotation line, or `@N`
//! absolute. The message fragment follows in `{{` `}}`.

use std::collections::VecDeque;
use std::sync::OnceLock;

use diagverify_types::{DiagnosticKind, Expectation, MessagePattern, RegexPattern};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("malformed annotation at line {line}, column {column}: {reason}")]
    MalformedAnnotation {
        line: u32,
        column: usize,
        reason: String,
    },
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"expected-(error|warning|note)(-re)?(?:@([+-])?(\d+))?")
            .expect("marker regex is valid")
    })
}

fn relocated_marker_regex() -> &'static Regex {
    static RELOCATED: OnceLock<Regex> = OnceLock::new();
    RELOCATED.get_or_init(|| {
        Regex::new(r"expected-(?:error|warning|note)(?:-re)?@").expect("marker regex is valid")
    })
}

/// Scans fixture text for expected-diagnostic annotations.
///
/// Each call to [`AnnotationScanner::iter`] starts a fresh pass over the text.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationScanner<'a> {
    source: &'a str,
}

impl<'a> AnnotationScanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn iter(&self) -> Annotations<'a> {
        Annotations::new(self.source)
    }

    pub fn scan(&self) -> Result<Vec<Expectation>, ScanError> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &AnnotationScanner<'a> {
    type Item = Result<Expectation, ScanError>;
    type IntoIter = Annotations<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub fn scan_annotations(source: &str) -> Result<Vec<Expectation>, ScanError> {
    AnnotationScanner::new(source).scan()
}

/// Lazy iterator over the expectations of one text, in ascending target line.
///
/// Without `@` targets, annotation order is line order and lines are scanned
/// on demand. With them, a target can point behind lines already scanned, so
/// the whole text is scanned and sorted before the first item is yielded.
/// A malformed annotation ends the iteration after yielding its error.
pub struct Annotations<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    pending: VecDeque<Expectation>,
    relocated: bool,
    sorted: Option<std::vec::IntoIter<Expectation>>,
    done: bool,
}

impl<'a> Annotations<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().enumerate(),
            pending: VecDeque::new(),
            relocated: relocated_marker_regex().is_match(source),
            sorted: None,
            done: false,
        }
    }
}

impl Iterator for Annotations<'_> {
    type Item = Result<Expectation, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(sorted) = self.sorted.as_mut() {
            return sorted.next().map(Ok);
        }

        loop {
            if !self.relocated {
                if let Some(expectation) = self.pending.pop_front() {
                    return Some(Ok(expectation));
                }
            }

            match self.lines.next() {
                Some((index, line)) => match scan_line(line, index as u32 + 1) {
                    Ok(found) => self.pending.extend(found),
                    Err(e) => {
                        self.done = true;
                        self.pending.clear();
                        return Some(Err(e));
                    }
                },
                None if self.relocated => {
                    let mut all: Vec<Expectation> = self.pending.drain(..).collect();
                    // Stable: same-line expectations keep marker order.
                    all.sort_by_key(|e| e.line);
                    let mut sorted = all.into_iter();
                    let first = sorted.next();
                    self.sorted = Some(sorted);
                    return first.map(Ok);
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

fn is_run_directive(line: &str) -> bool {
    line.trim_start().starts_with("// RUN:")
}

fn scan_line(line: &str, line_no: u32) -> Result<Vec<Expectation>, ScanError> {
    let mut found = Vec::new();
    if is_run_directive(line) {
        return Ok(found);
    }
    let mut pos = 0;

    while let Some(caps) = marker_regex().captures_at(line, pos) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        let column = whole.start() + 1;
        let rest = &line[whole.end()..];

        // `expected-errors`, `expected-error-foo`: not a marker.
        if rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            pos = whole.end();
            continue;
        }

        let malformed = |reason: String| ScanError::MalformedAnnotation {
            line: line_no,
            column,
            reason,
        };

        // The marker regex consumes any well-formed `@` target, so a leftover
        // `@` is a target it could not parse.
        if rest.starts_with('@') {
            let target: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
            return Err(malformed(format!(
                "invalid line target '{}' after expected-{}",
                target, &caps[1]
            )));
        }

        let kind: DiagnosticKind = caps[1].parse().map_err(malformed)?;
        let is_regex = caps.get(2).is_some();
        let target = resolve_target(
            line_no,
            caps.get(3).map(|m| m.as_str()),
            caps.get(4).map(|m| m.as_str()),
        )
        .map_err(malformed)?;

        let after = rest.trim_start();
        let Some(body) = after.strip_prefix("{{") else {
            return Err(malformed(format!(
                "expected-{} is missing its {{{{message}}}}",
                kind
            )));
        };
        let Some(close) = body.find("}}") else {
            return Err(malformed(format!(
                "unterminated {{{{message}}}} after expected-{}",
                kind
            )));
        };
        let fragment = &body[..close];

        let pattern = if is_regex {
            let re = RegexPattern::new(fragment)
                .map_err(|e| malformed(format!("invalid regex '{}': {}", fragment, e)))?;
            MessagePattern::Regex(re)
        } else {
            MessagePattern::Substring(fragment.to_string())
        };

        debug!("line {}: expected {} {} (target line {})", line_no, kind, pattern, target);
        found.push(Expectation {
            line: target,
            kind,
            pattern,
            annotation_line: line_no,
        });

        pos = line.len() - body.len() + close + 2;
    }

    Ok(found)
}

fn resolve_target(line_no: u32, sign: Option<&str>, amount: Option<&str>) -> Result<u32, String> {
    let Some(amount) = amount else {
        return Ok(line_no);
    };
    let n: u32 = amount
        .parse()
        .map_err(|_| format!("line offset '{}' is out of range", amount))?;

    let target = match sign {
        Some("+") => line_no.checked_add(n),
        Some("-") => line_no.checked_sub(n),
        _ => Some(n),
    };

    match target {
        Some(t) if t >= 1 => Ok(t),
        _ => Err(format!(
            "line target {}{} does not name a line of the file",
            sign.unwrap_or(""),
            amount
        )),
    }
}
