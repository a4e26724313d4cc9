use std::path::{Path, PathBuf};

use diagverify_types::{CompileMode, OutputFormat};

#[derive(Debug, Clone)]
pub struct CompilerPreset {
    pub name: &'static str,
    pub command: &'static [&'static str],
    pub parse_only_flags: &'static [&'static str],
    pub full_check_flags: &'static [&'static str],
    pub output_format: OutputFormat,
    pub fixture_extension: &'static str,
}

impl CompilerPreset {
    pub fn mode_flags(&self, mode: CompileMode) -> &'static [&'static str] {
        match mode {
            CompileMode::ParseOnly => self.parse_only_flags,
            CompileMode::FullCheck => self.full_check_flags,
        }
    }
}

static SWIFTC: CompilerPreset = CompilerPreset {
    name: "swiftc",
    command: &["swiftc", "-diagnostic-style=llvm"],
    parse_only_flags: &["-parse"],
    full_check_flags: &["-typecheck"],
    output_format: OutputFormat::Text,
    fixture_extension: "swift",
};

static SWIFT_FRONTEND: CompilerPreset = CompilerPreset {
    name: "swift-frontend",
    command: &["swift-frontend", "-frontend", "-diagnostic-style=llvm"],
    parse_only_flags: &["-parse"],
    full_check_flags: &["-typecheck"],
    output_format: OutputFormat::Text,
    fixture_extension: "swift",
};

// clang has no separate parse-only stage; both modes stop after semantic analysis.
static CLANG: CompilerPreset = CompilerPreset {
    name: "clang",
    command: &["clang", "-fno-color-diagnostics", "-fno-caret-diagnostics"],
    parse_only_flags: &["-fsyntax-only"],
    full_check_flags: &["-fsyntax-only"],
    output_format: OutputFormat::Text,
    fixture_extension: "c",
};

static ALL_PRESETS: &[&CompilerPreset] = &[&SWIFTC, &SWIFT_FRONTEND, &CLANG];

pub fn get_preset(name: &str) -> Option<&'static CompilerPreset> {
    ALL_PRESETS.iter().copied().find(|p| p.name == name)
}

pub fn all_presets() -> &'static [&'static CompilerPreset] {
    ALL_PRESETS
}

pub fn get_extended_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let extra_paths = [
        format!("{}/.local/bin", home),
        format!("{}/.cargo/bin", home),
        format!("{}/.swiftly/bin", home),
        "/usr/local/bin".to_string(),
        "/opt/homebrew/bin".to_string(),
    ];
    let current_path = std::env::var("PATH").unwrap_or_default();
    format!("{}:{}", extra_paths.join(":"), current_path)
}

/// Resolves a compiler program to an executable path.
///
/// Programs containing a path separator are taken as paths; bare names are
/// looked up on the extended `PATH`.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        let path = Path::new(program);
        return path.is_file().then(|| path.to_path_buf());
    }

    get_extended_path()
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_preset() {
        let preset = get_preset("swift-frontend").unwrap();
        assert_eq!(preset.command[0], "swift-frontend");
        assert_eq!(preset.mode_flags(CompileMode::ParseOnly), &["-parse"]);
        assert_eq!(preset.mode_flags(CompileMode::FullCheck), &["-typecheck"]);
        assert!(get_preset("javac").is_none());
    }

    #[test]
    fn test_preset_names_are_unique() {
        let mut names: Vec<_> = all_presets().iter().map(|p| p.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all_presets().len());
    }

    #[test]
    fn test_resolve_program() {
        assert!(resolve_program("sh").is_some());
        assert!(resolve_program("definitely-not-a-compiler-4921").is_none());
        assert!(resolve_program("/nonexistent/dir/swiftc").is_none());
    }
}
