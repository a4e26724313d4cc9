use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use diagverify_compiler::get_preset;
use diagverify_config::{get_config_path, Config};
use diagverify_output::*;
use diagverify_source::{discover_fixtures, read_file_content, scan_annotations};
use diagverify_types::CompileMode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod run;

use run::{default_jobs, outcome_exit_code, suite_exit_code, Harness};

const MAIN_HELP: &str = r#"diagverify checks that a compiler emits exactly the diagnostics a test
fixture says it should. Fixtures carry annotations in comments:

    markUsed(t != nil) // expected-warning {{always returns true}}

Each annotation must be matched by a diagnostic of the same kind on the same
line whose message contains the fragment, and every diagnostic the compiler
emits must be claimed by an annotation. Use `expected-error-re {{...}}` for a
regex fragment and `expected-note@+1 {{...}}` to target another line.

`diagverify run-test FILE` verifies one fixture and exits 0 on PASS, 1 on
FAIL and 2 when the fixture could not be verified (malformed annotation,
compiler crash or timeout). `diagverify run-suite DIR` does the same for every
fixture under DIR.

The compiler comes from `[compiler]` in the config file (see `diagverify
config`), from --compiler, or from DIAGVERIFY_COMPILER."#;

#[derive(Parser)]
#[command(name = "diagverify")]
#[command(about = MAIN_HELP)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Output as JSON")]
    json: bool,

    #[arg(long, global = true, value_name = "PATH", help = "Config file to use instead of ~/.config/diagverify/config.toml")]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "DIAGVERIFY_COMPILER",
        value_name = "PATH",
        help = "Compiler executable; replaces the program of the configured command or preset"
    )]
    compiler: Option<String>,

    #[arg(
        long = "target-flag",
        global = true,
        value_name = "FLAG",
        allow_hyphen_values = true,
        help = "Extra compiler flag (repeatable), e.g. --target-flag=-sdk"
    )]
    target_flags: Vec<String>,

    #[arg(short, long, global = true, action = ArgAction::Count, help = "More logging on stderr (-v info, -vv debug, -vvv trace)")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Verify the diagnostics of one annotated fixture.")]
    RunTest {
        #[arg(help = "Fixture file")]
        file: PathBuf,
        #[arg(long, value_name = "MODE", help = "Compile mode: parse-only or full-check")]
        mode: Option<CompileMode>,
        #[arg(long, value_name = "N", help = "Kill the compiler after N seconds")]
        timeout_seconds: Option<u64>,
    },

    #[command(about = "Verify every fixture under a directory.")]
    RunSuite {
        #[arg(help = "Directory to search for fixtures")]
        dir: PathBuf,
        #[arg(long, help = "Fixture file extension (default: the preset's, else swift)")]
        extension: Option<String>,
        #[arg(short, long, help = "Maximum number of concurrent compiler runs")]
        jobs: Option<usize>,
        #[arg(long, value_name = "MODE", help = "Compile mode: parse-only or full-check")]
        mode: Option<CompileMode>,
        #[arg(long, value_name = "N", help = "Kill each compiler run after N seconds")]
        timeout_seconds: Option<u64>,
    },

    #[command(about = "Print the expectations found in a fixture.")]
    Scan {
        #[arg(help = "Fixture file")]
        file: PathBuf,
    },

    #[command(about = "Print config file location and contents.")]
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run_cli(cli: Cli) -> Result<u8> {
    let config_path = cli.config.clone().unwrap_or_else(get_config_path);
    let mut config = Config::load_from(&config_path)?;
    init_logging(&config.harness.log_level, cli.verbose);
    debug!("Loaded config from {}", config_path.display());

    apply_overrides(&mut config, &cli);

    match cli.command {
        Commands::RunTest {
            file,
            mode,
            timeout_seconds,
        } => {
            apply_run_overrides(&mut config, mode, timeout_seconds);
            handle_run_test(&config, cli.json, &file).await
        }
        Commands::RunSuite {
            dir,
            extension,
            jobs,
            mode,
            timeout_seconds,
        } => {
            apply_run_overrides(&mut config, mode, timeout_seconds);
            handle_run_suite(&config, cli.json, &dir, extension, jobs).await
        }
        Commands::Scan { file } => handle_scan(cli.json, &file),
        Commands::Config => handle_config(&config_path, &config, cli.json),
    }
}

fn init_logging(configured: &str, verbose: u8) {
    let level = match verbose {
        0 => configured,
        1 => more_verbose(configured, "info"),
        2 => more_verbose(configured, "debug"),
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn more_verbose<'a>(a: &'a str, b: &'a str) -> &'a str {
    let rank = |level: &str| match level.to_ascii_lowercase().as_str() {
        "off" => 0,
        "error" => 1,
        "warn" => 2,
        "info" => 3,
        "debug" => 4,
        "trace" => 5,
        _ => 2,
    };
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

/// Folds the global flags into the loaded config. Flags win over the file.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(compiler) = &cli.compiler {
        let compiler_config = &mut config.compiler;
        if compiler_config.command.is_empty() {
            if let Some(preset) = compiler_config.preset.as_deref().and_then(get_preset) {
                compiler_config.command = preset.command.iter().map(|s| s.to_string()).collect();
            }
        }
        match compiler_config.command.first_mut() {
            Some(program) => *program = compiler.clone(),
            None => compiler_config.command.push(compiler.clone()),
        }
    }
    config
        .compiler
        .target_flags
        .extend(cli.target_flags.iter().cloned());
}

fn apply_run_overrides(config: &mut Config, mode: Option<CompileMode>, timeout_seconds: Option<u64>) {
    if let Some(mode) = mode {
        config.compiler.mode = mode;
    }
    if let Some(secs) = timeout_seconds {
        config.harness.timeout_seconds = secs;
    }
}

async fn handle_run_test(config: &Config, json_output: bool, file: &Path) -> Result<u8> {
    let harness = Harness::from_config(config)?;
    let outcome = harness.verify_file(file).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", format_run_outcome(&outcome));
    }
    Ok(outcome_exit_code(&outcome))
}

async fn handle_run_suite(
    config: &Config,
    json_output: bool,
    dir: &Path,
    extension: Option<String>,
    jobs: Option<usize>,
) -> Result<u8> {
    let harness = Harness::from_config(config)?;

    let extension = extension
        .or_else(|| {
            config
                .compiler
                .preset
                .as_deref()
                .and_then(get_preset)
                .map(|p| p.fixture_extension.to_string())
        })
        .unwrap_or_else(|| "swift".to_string());
    let extension = extension.trim_start_matches('.');

    let files = discover_fixtures(dir, extension);
    if files.is_empty() {
        return Err(anyhow!(
            "No *.{} fixtures found under {}",
            extension,
            dir.display()
        ));
    }

    let jobs = jobs.or(config.harness.jobs).unwrap_or_else(default_jobs);
    if jobs == 0 {
        warn!("--jobs 0 runs one fixture at a time");
    }
    debug!("Verifying {} fixture(s) with {} job(s)", files.len(), jobs);

    let summary = harness.verify_suite(files, jobs).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", format_suite_summary(&summary));
    }
    Ok(suite_exit_code(&summary))
}

fn handle_scan(json_output: bool, file: &Path) -> Result<u8> {
    let source = read_file_content(file)?;
    let expectations = scan_annotations(&source)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&expectations)?);
    } else {
        println!(
            "{}",
            format_expectations(&file.display().to_string(), &expectations)
        );
    }
    Ok(0)
}

fn handle_config(config_path: &Path, config: &Config, json_output: bool) -> Result<u8> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(0);
    }

    println!("Config file: {}", config_path.display());
    println!();

    if config_path.exists() {
        println!("{}", std::fs::read_to_string(config_path)?);
    } else {
        println!("(file does not exist, using defaults)");
    }

    println!();
    println!("Effective configuration:");
    println!();
    println!("{}", config.to_toml()?);
    Ok(0)
}
