use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use diagverify_config::CompilerConfig;
use diagverify_types::{CompileMode, Diagnostic, OutputFormat, DEFAULT_TIMEOUT_SECS};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::InvokeError;
use crate::output::parse_diagnostics;
use crate::presets::{get_extended_path, get_preset, resolve_program};

const FILE_PLACEHOLDER: &str = "{file}";
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub mode: CompileMode,
    pub target_flags: Vec<String>,
    pub timeout: Duration,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            mode: CompileMode::default(),
            target_flags: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// What one compiler run produced.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub exit_code: i32,
    /// Diagnostics for the file under test, in emission order.
    pub diagnostics: Vec<Diagnostic>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the compiler under test. Holds only read-only configuration, so one
/// invoker can serve many concurrent runs.
#[derive(Debug, Clone)]
pub struct CompilerInvoker {
    command: Vec<String>,
    parse_only_flags: Vec<String>,
    full_check_flags: Vec<String>,
    output_format: OutputFormat,
    accepted_exit_codes: Vec<i32>,
    isolate_workdir: bool,
}

impl CompilerInvoker {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            parse_only_flags: Vec::new(),
            full_check_flags: Vec::new(),
            output_format: OutputFormat::Auto,
            accepted_exit_codes: vec![0, 1],
            isolate_workdir: true,
        }
    }

    /// Builds an invoker from the `[compiler]` config section.
    ///
    /// An explicit `command` wins over the preset's command, but the preset
    /// still supplies mode flags and output format.
    pub fn from_config(config: &CompilerConfig) -> Result<Self, InvokeError> {
        let preset = match &config.preset {
            Some(name) => {
                Some(get_preset(name).ok_or_else(|| InvokeError::UnknownPreset(name.clone()))?)
            }
            None => None,
        };

        let command: Vec<String> = if !config.command.is_empty() {
            config.command.clone()
        } else if let Some(preset) = preset {
            preset.command.iter().map(|s| s.to_string()).collect()
        } else {
            return Err(InvokeError::NoCommand);
        };

        let to_owned =
            |flags: &[&str]| -> Vec<String> { flags.iter().map(|s| s.to_string()).collect() };
        let (parse_only_flags, full_check_flags) = match preset {
            Some(p) => (to_owned(p.parse_only_flags), to_owned(p.full_check_flags)),
            None => (Vec::new(), Vec::new()),
        };

        let output_format = config
            .output_format
            .or(preset.map(|p| p.output_format))
            .unwrap_or_default();

        Ok(Self {
            command,
            parse_only_flags,
            full_check_flags,
            output_format,
            accepted_exit_codes: config.accepted_exit_codes.clone(),
            isolate_workdir: config.isolate_workdir,
        })
    }

    pub fn with_mode_flags(mut self, parse_only: Vec<String>, full_check: Vec<String>) -> Self {
        self.parse_only_flags = parse_only;
        self.full_check_flags = full_check;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_accepted_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.accepted_exit_codes = codes;
        self
    }

    pub fn with_isolated_workdir(mut self, isolate: bool) -> Self {
        self.isolate_workdir = isolate;
        self
    }

    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("")
    }

    /// Full argument list (excluding the program) for compiling `file`.
    pub fn build_args(&self, file: &Path, options: &InvokeOptions) -> Vec<String> {
        let mode_flags = match options.mode {
            CompileMode::ParseOnly => &self.parse_only_flags,
            CompileMode::FullCheck => &self.full_check_flags,
        };
        let file_str = file.to_string_lossy();

        let mut args: Vec<String> = self
            .command
            .iter()
            .skip(1)
            .chain(mode_flags)
            .chain(&options.target_flags)
            .cloned()
            .collect();

        if args.iter().any(|a| a.contains(FILE_PLACEHOLDER)) {
            for arg in &mut args {
                *arg = arg.replace(FILE_PLACEHOLDER, &file_str);
            }
        } else {
            args.push(file_str.into_owned());
        }
        args
    }

    pub async fn invoke(
        &self,
        file: &Path,
        options: &InvokeOptions,
    ) -> Result<Invocation, InvokeError> {
        if self.command.is_empty() {
            return Err(InvokeError::NoCommand);
        }
        let program_name = self.program().to_string();
        let program = resolve_program(&program_name).ok_or_else(|| InvokeError::NotFound {
            program: program_name.clone(),
        })?;

        // The child may run elsewhere, so hand it an absolute path.
        let file = std::fs::canonicalize(file)?;
        let args = self.build_args(&file, options);

        let workdir = if self.isolate_workdir {
            Some(tempfile::Builder::new().prefix("diagverify-").tempdir()?)
        } else {
            None
        };

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PATH", get_extended_path())
            .kill_on_drop(true);
        // Own process group, so a timeout can also reach whatever the compiler forks.
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &workdir {
            cmd.current_dir(dir.path());
        }

        info!("Running {} {}", program.display(), args.join(" "));

        let mut child = cmd.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                InvokeError::NotFound {
                    program: program_name.clone(),
                }
            } else {
                InvokeError::Spawn {
                    program: program_name.clone(),
                    source,
                }
            }
        })?;

        let child_id = child.id();
        let mut stdout_task = spawn_reader(child.stdout.take());
        let mut stderr_task = spawn_reader(child.stderr.take());

        // One deadline covers both the exit and the end of output: a forked
        // process can hold the pipes open after the compiler itself exits.
        let finished = tokio::time::timeout(options.timeout, async {
            let status = child.wait().await?;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "{} exceeded {}s on {}, killing it",
                    program_name,
                    options.timeout.as_secs(),
                    file.display()
                );
                kill_process_group(child_id);
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill {}: {}", program_name, e);
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(InvokeError::Timeout {
                    program: program_name,
                    timeout: options.timeout,
                });
            }
        };

        let Some(exit_code) = status.code() else {
            return Err(InvokeError::InternalFault {
                program: program_name,
                status: describe_signal(&status),
                stderr_tail: tail(&stderr, STDERR_TAIL_LINES),
            });
        };
        if !self.accepted_exit_codes.contains(&exit_code) {
            return Err(InvokeError::InternalFault {
                program: program_name,
                status: format!("exit code {}", exit_code),
                stderr_tail: tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        let diagnostics = self.collect_diagnostics(&file, &stderr, &stdout);
        debug!(
            "{} exited with {} and {} diagnostics for {}",
            program_name,
            exit_code,
            diagnostics.len(),
            file.display()
        );

        Ok(Invocation {
            exit_code,
            diagnostics,
            stdout,
            stderr,
        })
    }

    /// Stderr diagnostics come first, then stdout ones; diagnostics attributed
    /// to other files are dropped.
    fn collect_diagnostics(&self, file: &Path, stderr: &str, stdout: &str) -> Vec<Diagnostic> {
        let file_name = file.file_name();
        parse_diagnostics(stderr, self.output_format)
            .into_iter()
            .chain(parse_diagnostics(stdout, self.output_format))
            .filter(|d| match &d.file {
                Some(reported) => {
                    let reported_path = Path::new(reported);
                    let same = if reported_path.is_absolute() {
                        std::fs::canonicalize(reported_path)
                            .map(|p| p.as_path() == file)
                            .unwrap_or(false)
                    } else {
                        reported_path.file_name() == file_name
                    };
                    if !same {
                        debug!("Dropping diagnostic for other file {}: {}", reported, d.message);
                    }
                    same
                }
                None => true,
            })
            .collect()
    }
}

fn spawn_reader<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            if let Err(e) = stream.read_to_end(&mut buf).await {
                debug!("Error reading compiler output: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(unix)]
fn kill_process_group(leader: Option<u32>) {
    let Some(pid) = leader.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if unsafe { libc::kill(-pid, libc::SIGKILL) } != 0 {
        debug!(
            "Failed to kill process group {}: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: Option<u32>) {}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(unix)]
fn describe_signal(status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("signal {}", signal),
        None => status.to_string(),
    }
}

#[cfg(not(unix))]
fn describe_signal(status: &std::process::ExitStatus) -> String {
    status.to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use diagverify_types::DiagnosticKind;
    use std::path::PathBuf;

    fn sh(script: &str) -> CompilerInvoker {
        // `sh -c SCRIPT NAME FILE`: the fixture path arrives as $1.
        CompilerInvoker::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "stand-in".to_string(),
        ])
    }

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("t.swift");
        std::fs::write(&path, "_ = d! // expected-error {{cannot force unwrap}}\n").unwrap();
        path
    }

    fn options(timeout_ms: u64) -> InvokeOptions {
        InvokeOptions {
            timeout: Duration::from_millis(timeout_ms),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_args_appends_file() {
        let invoker = CompilerInvoker::new(vec!["swiftc".into(), "-diagnostic-style=llvm".into()])
            .with_mode_flags(vec!["-parse".into()], vec!["-typecheck".into()]);
        let opts = InvokeOptions {
            mode: CompileMode::ParseOnly,
            target_flags: vec!["-target".into(), "arm64-apple-macosx13".into()],
            ..Default::default()
        };
        let args = invoker.build_args(Path::new("/f/t.swift"), &opts);
        assert_eq!(
            args,
            vec![
                "-diagnostic-style=llvm",
                "-parse",
                "-target",
                "arm64-apple-macosx13",
                "/f/t.swift"
            ]
        );
    }

    #[test]
    fn test_build_args_placeholder() {
        let invoker = CompilerInvoker::new(vec!["cc".into(), "--input={file}".into(), "-q".into()]);
        let args = invoker.build_args(Path::new("/f/t.c"), &InvokeOptions::default());
        assert_eq!(args, vec!["--input=/f/t.c", "-q"]);
    }

    #[test]
    fn test_from_config_uses_preset() {
        let config = CompilerConfig {
            preset: Some("swiftc".to_string()),
            ..Default::default()
        };
        let invoker = CompilerInvoker::from_config(&config).unwrap();
        assert_eq!(invoker.program(), "swiftc");
        let args = invoker.build_args(Path::new("a.swift"), &InvokeOptions::default());
        assert!(args.contains(&"-typecheck".to_string()));
    }

    #[test]
    fn test_from_config_errors() {
        assert!(matches!(
            CompilerInvoker::from_config(&CompilerConfig::default()),
            Err(InvokeError::NoCommand)
        ));
        let config = CompilerConfig {
            preset: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            CompilerInvoker::from_config(&config),
            Err(InvokeError::UnknownPreset(_))
        ));
    }

    #[tokio::test]
    async fn test_collects_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let file = fixture(dir.path());
        let invoker = sh(
            r#"echo "$1:1:6: error: cannot force unwrap value of non-optional type 'D'" >&2
echo "other.swift:3:1: warning: not ours" >&2
exit 1"#,
        );
        let result = invoker.invoke(&file, &options(5000)).await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].line, 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::Error);
    }

    #[tokio::test]
    async fn test_unreachable_binary() {
        let dir = tempfile::tempdir().unwrap();
        let file = fixture(dir.path());
        let invoker = CompilerInvoker::new(vec!["no-such-compiler-8812".to_string()]);
        let err = invoker.invoke(&file, &options(5000)).await.unwrap_err();
        assert!(matches!(err, InvokeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unaccepted_exit_code_is_fault() {
        let dir = tempfile::tempdir().unwrap();
        let file = fixture(dir.path());
        let invoker = sh("echo 'Stack dump:' >&2; exit 134");
        let err = invoker.invoke(&file, &options(5000)).await.unwrap_err();
        match err {
            InvokeError::InternalFault { status, stderr_tail, .. } => {
                assert_eq!(status, "exit code 134");
                assert!(stderr_tail.contains("Stack dump"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_signal_is_fault() {
        let dir = tempfile::tempdir().unwrap();
        let file = fixture(dir.path());
        let invoker = sh("kill -SEGV $$");
        let err = invoker.invoke(&file, &options(5000)).await.unwrap_err();
        assert!(matches!(err, InvokeError::InternalFault { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let file = fixture(dir.path());
        let invoker = sh("sleep 30");
        let start = std::time::Instant::now();
        let err = invoker.invoke(&file, &options(200)).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_timeout_covers_forked_children() {
        let dir = tempfile::tempdir().unwrap();
        let file = fixture(dir.path());
        // The background sleep keeps stdout open after sh exits.
        let invoker = sh("sleep 8 & exit 0");
        let start = std::time::Instant::now();
        let err = invoker.invoke(&file, &options(500)).await.unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_absolute_paths_to_other_files_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let file = fixture(dir.path());
        let other_dir = dir.path().join("Other");
        std::fs::create_dir(&other_dir).unwrap();
        let other = other_dir.join("t.swift");
        std::fs::write(&other, "").unwrap();

        let invoker = sh(&format!(
            r#"echo "{}:2:1: warning: same name, other file" >&2
echo "$1:1:6: error: cannot force unwrap" >&2
echo "t.swift:1:1: note: relative paths match by name" >&2"#,
            other.display()
        ));
        let result = invoker.invoke(&file, &options(5000)).await.unwrap();
        let kinds: Vec<DiagnosticKind> = result.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::Error, DiagnosticKind::Note]);
    }

    #[tokio::test]
    async fn test_runs_in_isolated_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let file = fixture(dir.path());
        let invoker = sh(r#"echo "$1:1: note: cwd=$(pwd)" >&2"#);
        let result = invoker.invoke(&file, &options(5000)).await.unwrap();
        let message = &result.diagnostics[0].message;
        assert!(message.contains("diagverify-"), "{message}");
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }
}
