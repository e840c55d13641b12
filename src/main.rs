#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use subtrans::AppError;
use subtrans::app_config::{Config, LogLevel};
use subtrans::database::{DatabaseConnection, Repository};
use subtrans::translation::TranslationService;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a text file, one subtitle line per line
    Translate(TranslateArgs),

    /// Inspect or maintain the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions for subtrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show entry count, hit total and file size
    Stats,

    /// Remove echoed translations and, optionally, stale entries
    Prune {
        /// Also remove entries not used for this many days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Remove every cached translation
    Clear,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input text file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (default: <input stem>.<target>.<ext> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Send one request per line instead of batches
    #[arg(long)]
    no_batch: bool,
}

/// subtrans - batched subtitle translation with a local LLM
#[derive(Parser, Debug)]
#[command(name = "subtrans")]
#[command(version)]
#[command(about = "Batched subtitle line translation with caching")]
#[command(long_about = "subtrans translates subtitle lines through a local Ollama server.

Repeated lines are translated once, lines are sent in numbered batches, every
translation is checked before use and cached in SQLite so later runs are free.

EXAMPLES:
    subtrans translate lines.txt                    # Translate using default config
    subtrans translate -s en -t es lines.txt        # English to Spanish
    subtrans translate -m qwen2:7b --no-batch x.txt # One request per line
    subtrans cache stats                            # Show cache statistics
    subtrans cache prune --days 90                  # Drop stale and echoed entries
    subtrans completions bash > subtrans.bash       # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default
    one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Filtering happens through set_max_level once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subtrans", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => {
            let config = load_config(&cli.config_path, cli.log_level)?;
            run_translate(config, args).await
        }
        Commands::Cache { action } => {
            let config = load_config(&cli.config_path, cli.log_level)?;
            run_cache(&config, action).await
        }
    }
}

/// Load the config file and apply the log level, CLI first
fn load_config(path: &Path, cli_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = Config::load_or_create(path)?;
    if let Some(level) = cli_level {
        config.log_level = level.into();
    }
    log::set_max_level(config.log_level.to_level_filter());
    Ok(config)
}

async fn run_translate(mut config: Config, args: TranslateArgs) -> Result<()> {
    if let Some(source) = args.source_language {
        config.source_language = source;
    }
    if let Some(target) = args.target_language {
        config.target_language = target;
    }
    if let Some(model) = args.model {
        config.backend.model = model;
    }
    if args.no_batch {
        config.pipeline.batch_enabled = false;
    }
    config.validate().context("Configuration validation failed")?;

    let content = read_input(&args.input)?;
    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input, &config.target_language));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the request in flight and keeping untranslated lines");
            on_interrupt.cancel();
        }
    });

    let source_language = config.source_language.clone();
    let target_language = config.target_language.clone();
    let service = TranslationService::from_config(config)?.with_cancellation(cancel);

    if let Err(e) = service.backend().test_connection().await {
        warn!("Backend check failed ({}), lines that cannot be translated keep their text", e);
    }

    info!(
        "🚀 subtrans: {} lines, {} → {} with {}",
        lines.len(),
        source_language,
        target_language,
        service.backend().engine_id()
    );

    let progress_bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lines ({percent}%) {msg} {eta}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar.set_message("Translating");

    let pb = progress_bar.clone();
    let mut session = service.session_with_progress(Arc::new(move |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    }))?;

    let outcome = session
        .translate_document_detailed(&lines, &source_language, &target_language)
        .await;
    progress_bar.finish_with_message("Done");

    let mut text = outcome.lines.join("\n");
    if content.ends_with('\n') {
        text.push('\n');
    }
    std::fs::write(&output, text)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    info!("{}", outcome.report.summary());
    info!("Cache: {}", service.cache_stats());
    info!("Success: {}", output.display());
    Ok(())
}

async fn run_cache(config: &Config, action: CacheAction) -> Result<()> {
    let path = match &config.cache.database_path {
        Some(path) => path.clone(),
        None => DatabaseConnection::default_database_path()?,
    };
    let repo = Repository::open(&path)
        .map_err(|e| AppError::Cache(format!("{}: {:#}", path.display(), e)))?;

    match action {
        CacheAction::Stats => {
            println!("{}", path.display());
            println!("{}", repo.get_cache_stats()?);
        }
        CacheAction::Prune { days } => {
            let identical = repo.prune_identical()?;
            let stale = match days {
                Some(days) => repo.prune_older_than(days)?,
                None => 0,
            };
            repo.optimize().await?;
            info!("Removed {} echoed and {} stale entries", identical, stale);
        }
        CacheAction::Clear => {
            let removed = repo.clear_cache()?;
            repo.optimize().await?;
            info!("Removed {} entries", removed);
        }
    }

    Ok(())
}

/// Read the whole input file
fn read_input(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path)
        .map_err(|e| AppError::File(format!("Failed to read input file {}: {}", path.display(), e)))
}

/// `<dir>/<stem>.<target>.<ext>`, with `txt` when the input has no extension
fn default_output_path(input: &Path, target_language: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "output".to_string());
    let extension = input.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_else(|| "txt".to_string());
    input.with_file_name(format!("{}.{}.{}", stem, target_language, extension))
}
