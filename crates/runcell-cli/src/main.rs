//! Runcell CLI
//!
//! A command-line front end for the runcell execution engine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use runcell::{
    BinaryStatus, Config, EXAMPLE_CONFIG, Engine, ExecutionRequest, ExecutionResult,
    ResourceLimits,
};
use tokio::io::AsyncReadExt;
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "runcell")]
#[command(about = "Run code snippets against locally installed toolchains")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: runcell.toml)
        #[arg(short, long, default_value = "runcell.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a program (compile if needed, then execute)
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., c, python, java)
        #[arg(short, long)]
        language: String,

        /// Input file, or "-" for stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Wall clock limit for the run stage in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a source file against the language's content rules without running it
    Check {
        /// Source file to check
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID
        #[arg(short, long)]
        language: String,
    },

    /// Probe every configured toolchain
    Toolchains {
        /// Print the statuses as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available languages
    Languages,

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init { output, force } = &cli.command {
        return init_config(output, *force).await;
    }

    // Load configuration
    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using default configuration");
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let engine = Engine::new(config);

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Run {
            source,
            language,
            input,
            timeout_ms,
            json,
        } => run_execute(&engine, &source, &language, input.as_deref(), timeout_ms, json).await,
        Commands::Check { source, language } => run_check(&engine, &source, &language).await,
        Commands::Toolchains { json } => list_toolchains(&engine, json).await,
        Commands::Languages => {
            list_languages(&engine);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(engine.config());
            Ok(())
        }
    }
}

async fn read_source(source: &Path) -> Result<String> {
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("failed to read source file '{}'", source.display()))
}

async fn read_input(input: Option<&Path>) -> Result<Option<String>> {
    match input {
        None => Ok(None),
        Some(path) if path == Path::new("-") => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("failed to read input from stdin")?;
            Ok(Some(buffer))
        }
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map(Some)
            .with_context(|| format!("failed to read input file '{}'", path.display())),
    }
}

async fn run_execute(
    engine: &Engine,
    source: &Path,
    language_id: &str,
    input: Option<&Path>,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<()> {
    let code = read_source(source).await?;
    let input = read_input(input).await?;

    let mut request = ExecutionRequest::new(language_id, code);
    request.input = input;
    // Only include explicitly-specified values so they don't override per-language defaults
    if let Some(ms) = timeout_ms {
        request = request.with_limits(ResourceLimits::unset().with_wall_time_ms(ms));
    }

    info!(language = language_id, "running program");
    let result = engine
        .execute(&request)
        .await
        .context("request rejected")?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&result).context("failed to serialize result")?;
        println!("{rendered}");
    } else {
        print_result(&result);
    }

    // Exit with appropriate code
    if result.is_success() {
        Ok(())
    } else {
        std::process::exit(result.exit_code.unwrap_or(1));
    }
}

fn print_result(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }

    // Log execution info via tracing (stderr), keeping stdout clean for piping
    info!(
        status = result.status.label(),
        stage = ?result.stage,
        duration = format_args!("{}ms", result.duration_ms),
        exit_code = result.exit_code,
        signal = result.signal,
        timed_out = result.timed_out,
        "execution result"
    );
}

async fn run_check(engine: &Engine, source: &Path, language_id: &str) -> Result<()> {
    let code = read_source(source).await?;
    let language = engine
        .check(&ExecutionRequest::new(language_id, code))
        .context("check failed")?;

    println!("'{}' passes the {} content rules", source.display(), language.name);
    Ok(())
}

async fn list_toolchains(engine: &Engine, json: bool) -> Result<()> {
    let statuses = engine.log_toolchain_report().await;

    if json {
        let rendered =
            serde_json::to_string_pretty(&statuses).context("failed to serialize statuses")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Toolchains:\n");
    for status in &statuses {
        println!("  {}", describe_status(status));
    }
    Ok(())
}

fn describe_status(status: &BinaryStatus) -> String {
    let path = status.resolved_path.display();
    if status.available {
        let version = status
            .version
            .as_deref()
            .and_then(|v| v.lines().next())
            .unwrap_or("");
        format!("{:<10} ok       {path}  {version}", status.name)
    } else {
        let error = status.error.as_deref().unwrap_or("unavailable");
        let hint = status.hint.as_deref().unwrap_or("");
        format!("{:<10} missing  {path}  {error}; {hint}", status.name)
    }
}

fn list_languages(engine: &Engine) {
    println!("Available languages:\n");

    for language in engine.languages() {
        let lang_type = if language.compiled {
            "compiled"
        } else {
            "interpreted"
        };
        println!(
            "  {:<12} {} ({}, uses {})",
            language.id,
            language.name,
            lang_type,
            language.tools.join(", ")
        );
    }
}

fn show_config(config: &Config) {
    println!("Work root: {}", config.work_root().display());
    println!("Max code size: {} bytes", config.max_code_bytes);
    println!("Max input size: {} bytes", config.max_input_bytes);
    println!();
    println!("Default resource limits:");
    println!(
        "  Wall time limit: {:?} ms",
        config.default_limits.wall_time_ms
    );
    println!(
        "  Memory limit: {:?} KB (advisory)",
        config.default_limits.memory_limit
    );
    println!("  Max output: {:?} KB", config.default_limits.max_output);
    println!();
    println!("Toolchains:");
    for id in config.toolchain_ids() {
        if let Ok(tool) = config.get_toolchain(id) {
            println!("  {:<10} {}", id, tool.program);
        }
    }
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
