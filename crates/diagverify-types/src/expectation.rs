use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::DiagnosticKind;

/// What an expectation requires of a diagnostic's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePattern {
    Substring(String),
    Regex(RegexPattern),
}

impl MessagePattern {
    pub fn is_match(&self, message: &str) -> bool {
        match self {
            MessagePattern::Substring(s) => message.contains(s.as_str()),
            MessagePattern::Regex(re) => re.0.is_match(message),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessagePattern::Substring(s) => s,
            MessagePattern::Regex(re) => re.as_str(),
        }
    }
}

impl std::fmt::Display for MessagePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessagePattern::Substring(s) => write!(f, "{{{{{}}}}}", s),
            MessagePattern::Regex(re) => write!(f, "re{{{{{}}}}}", re.as_str()),
        }
    }
}

/// A compiled regex that compares and serializes by its source text.
#[derive(Debug, Clone)]
pub struct RegexPattern(Regex);

impl RegexPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(RegexPattern)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RegexPattern {}

impl Serialize for RegexPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RegexPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        RegexPattern::new(&source).map_err(serde::de::Error::custom)
    }
}

/// An expected diagnostic parsed from a fixture annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    /// Line the diagnostic is expected on (1-based).
    pub line: u32,
    pub kind: DiagnosticKind,
    pub pattern: MessagePattern,
    /// Line the annotation was written on. Differs from `line` only for `@` offsets.
    pub annotation_line: u32,
}

impl Expectation {
    pub fn new(line: u32, kind: DiagnosticKind, pattern: MessagePattern) -> Self {
        Self {
            line,
            kind,
            pattern,
            annotation_line: line,
        }
    }

    pub fn substring(line: u32, kind: DiagnosticKind, text: impl Into<String>) -> Self {
        Self::new(line, kind, MessagePattern::Substring(text.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_pattern() {
        let pattern = MessagePattern::Substring("always returns".to_string());
        assert!(pattern.is_match("comparing non-optional value to nil always returns true"));
        assert!(!pattern.is_match("cannot force unwrap value"));
    }

    #[test]
    fn test_empty_substring_matches_anything() {
        let pattern = MessagePattern::Substring(String::new());
        assert!(pattern.is_match("whatever the compiler says"));
    }

    #[test]
    fn test_regex_pattern_serializes_as_source() {
        let pattern = MessagePattern::Regex(RegexPattern::new("type '.'$").unwrap());
        let json = serde_json::to_string(&pattern).unwrap();
        assert_eq!(json, r#"{"regex":"type '.'$"}"#);

        let back: MessagePattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pattern);
        assert!(back.is_match("non-optional type 'D'"));
    }

    #[test]
    fn test_display() {
        let pattern = MessagePattern::Substring("X".to_string());
        assert_eq!(pattern.to_string(), "{{X}}");
    }
}
