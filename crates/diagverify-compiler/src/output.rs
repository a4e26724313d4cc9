use std::sync::OnceLock;

use diagverify_types::{Diagnostic, DiagnosticKind, OutputFormat};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

fn located_regex() -> &'static Regex {
    static LOCATED: OnceLock<Regex> = OnceLock::new();
    LOCATED.get_or_init(|| {
        Regex::new(
            r"^(?P<file>.*?):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<kind>fatal error|error|warning|note|remark):\s?(?P<msg>.*)$",
        )
        .expect("diagnostic regex is valid")
    })
}

fn unlocated_regex() -> &'static Regex {
    static UNLOCATED: OnceLock<Regex> = OnceLock::new();
    UNLOCATED.get_or_init(|| {
        Regex::new(r"^(?P<kind>fatal error|error|warning|note|remark):\s?(?P<msg>.*)$")
            .expect("diagnostic regex is valid")
    })
}

#[derive(Debug, Deserialize)]
struct JsonDiagnostic {
    #[serde(default)]
    line: u32,
    #[serde(alias = "severity", alias = "level")]
    kind: String,
    message: String,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default, alias = "path")]
    file: Option<String>,
}

/// Maps a compiler severity word onto a diagnostic kind.
///
/// Severities outside error/warning/note (remarks, ignored) yield `None`.
pub fn kind_from_severity(severity: &str) -> Option<DiagnosticKind> {
    match severity.trim().to_ascii_lowercase().as_str() {
        "error" | "fatal error" | "fatal" => Some(DiagnosticKind::Error),
        "warning" => Some(DiagnosticKind::Warning),
        "note" => Some(DiagnosticKind::Note),
        _ => None,
    }
}

/// Parses one line of compiler output. Lines that are not diagnostics yield `None`.
pub fn parse_diagnostic_line(line: &str, format: OutputFormat) -> Option<Diagnostic> {
    let line = line.trim_end_matches(['\r', '\n']);
    match format {
        OutputFormat::Json => parse_json_line(line),
        OutputFormat::Text => parse_text_line(line),
        OutputFormat::Auto if line.trim_start().starts_with('{') => {
            parse_json_line(line).or_else(|| parse_text_line(line))
        }
        OutputFormat::Auto => parse_text_line(line),
    }
}

/// Parses a whole output stream, preserving emission order.
pub fn parse_diagnostics(output: &str, format: OutputFormat) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| parse_diagnostic_line(line, format))
        .collect()
}

fn parse_json_line(line: &str) -> Option<Diagnostic> {
    let raw: JsonDiagnostic = match serde_json::from_str(line.trim()) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("not a JSON diagnostic ({}): {}", e, line);
            return None;
        }
    };
    let Some(kind) = kind_from_severity(&raw.kind) else {
        debug!("ignoring diagnostic of kind '{}'", raw.kind);
        return None;
    };
    Some(Diagnostic {
        line: raw.line,
        kind,
        message: raw.message,
        column: raw.column,
        file: raw.file,
    })
}

fn parse_text_line(line: &str) -> Option<Diagnostic> {
    if let Some(caps) = located_regex().captures(line) {
        let kind = kind_from_severity(&caps["kind"])?;
        let line_no: u32 = caps["line"].parse().ok()?;
        let mut diagnostic = Diagnostic::new(line_no, kind, caps["msg"].trim_end())
            .with_file(caps["file"].trim());
        if let Some(col) = caps.name("col").and_then(|c| c.as_str().parse().ok()) {
            diagnostic = diagnostic.with_column(col);
        }
        return Some(diagnostic);
    }

    let caps = unlocated_regex().captures(line)?;
    let kind = kind_from_severity(&caps["kind"])?;
    Some(Diagnostic::new(0, kind, caps["msg"].trim_end()))
}
