// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sitelingo::app_config::{self, CacheBackend, Config};
use sitelingo::cache::{self, FlushOptions, GitBranchCache};
use sitelingo::file_utils::FileManager;
use sitelingo::orchestrator::Orchestrator;
use sitelingo::translation::TranslationClient;

/// CLI Wrapper for CacheBackend to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliCacheBackend {
    Github,
    Local,
}

impl From<CliCacheBackend> for CacheBackend {
    fn from(cli_backend: CliCacheBackend) -> Self {
        match cli_backend {
            CliCacheBackend::Github => CacheBackend::GitHub,
            CliCacheBackend::Local => CacheBackend::Local,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a built site into every target language (default command)
    Translate(TranslateArgs),

    /// Manage the translation cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Generate shell completions for sitelingo
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Download the cache into the local mirror
    Fetch,

    /// Commit and push the local mirror
    Push {
        /// Rebuild the cache branch without history
        #[arg(long)]
        force_recreate: bool,
    },

    /// Upload one file to the cache branch unless it is unchanged
    Put {
        /// Path of the file on the cache branch
        #[arg(value_name = "KEY")]
        key: String,

        /// Local file to upload
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "sitelingo.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Args, Debug, Clone)]
struct TranslateOptions {
    /// Target languages, comma separated (e.g. 'es,fr,pt-BR')
    #[arg(short, long, value_delimiter = ',')]
    target_languages: Vec<String>,

    /// Canonical base URL of the published site
    #[arg(short, long)]
    base_url: Option<String>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the translation service
    #[arg(long, env = "SITELINGO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Cache backend to use
    #[arg(long, value_enum)]
    cache_backend: Option<CliCacheBackend>,

    /// Push cache changes at the end of the run
    #[arg(long)]
    publish: bool,

    /// Rebuild the cache branch without history when publishing
    #[arg(long, requires = "publish")]
    force_recreate: bool,

    /// Seconds after which cached translations are refreshed (0 = never)
    #[arg(long)]
    recheck_window: Option<u64>,

    /// Number of pages translated concurrently
    #[arg(long)]
    batch_size: Option<usize>,

    /// Exit with an error when any page failed
    #[arg(long)]
    strict: bool,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Directory of the built site
    #[arg(value_name = "SITE_DIR")]
    site_dir: PathBuf,

    #[command(flatten)]
    options: TranslateOptions,
}

/// SiteLingo - static site localization with AI
///
/// Translates the HTML pages of a built static site through an
/// OpenAI-compatible API and keeps translations in a git-backed cache.
#[derive(Parser, Debug)]
#[command(name = "sitelingo")]
#[command(version)]
#[command(about = "AI-powered static site localization")]
#[command(long_about = "SiteLingo translates the pages of a built static site and writes them under <SITE_DIR>/<lang>/.

EXAMPLES:
    sitelingo ./public                          # Translate using default config
    sitelingo -t es,fr ./public                 # Translate into Spanish and French
    sitelingo --publish ./public                # Push cache changes after the run
    sitelingo --cache-backend local ./public    # Keep the cache on this machine
    sitelingo cache fetch                       # Download the cache into the mirror
    sitelingo cache put es/meta.json meta.json  # Upload a single cache file
    sitelingo completions bash > sitelingo.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in sitelingo.json by default. You can specify a
    different config file with --config-path. If the config file doesn't exist,
    a default one will be created automatically.

ENVIRONMENT:
    SITELINGO_API_KEY / OPENAI_API_KEY   Translation API key
    GITHUB_TOKEN                         Token for the cache repository")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory of the built site
    #[arg(value_name = "SITE_DIR")]
    site_dir: Option<PathBuf>,

    #[command(flatten)]
    global: GlobalOptions,

    #[command(flatten)]
    translate: TranslateOptions,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and emoji prefix for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "❌ "),
            Level::Warn => ("1;33", "🚧 "),
            Level::Info => ("1;32", " "),
            Level::Debug => ("1;36", "🔍 "),
            Level::Trace => ("1;35", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Dependencies below warn stay quiet
        if record.level() > Level::Warn && !record.target().starts_with("sitelingo") {
            return;
        }

        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (color, emoji) = Self::style_for_level(record.level());
        let _ = writeln!(
            std::io::stderr(),
            "\x1B[{}m{} {} {}\x1B[0m",
            color,
            now,
            emoji,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The ceiling stays at trace; the effective level is set once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();
    let global = cli.global.clone();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "sitelingo", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(&global, &args.site_dir, args.options).await,
        Some(Commands::Cache(command)) => run_cache(&global, command).await,
        None => {
            // Default behavior - use top-level args
            let site_dir = cli
                .site_dir
                .ok_or_else(|| anyhow!("SITE_DIR is required when no subcommand is specified"))?;
            run_translate(&global, &site_dir, cli.translate).await
        }
    }
}

/// Load the config file, creating a default one when it does not exist
fn load_config(global: &GlobalOptions) -> Result<Config> {
    let config_path = &global.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(log_level) = &global.log_level {
        config.log_level = log_level.clone().into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    config.apply_env_overrides();
    Ok(config)
}

fn apply_translate_options(config: &mut Config, options: TranslateOptions) {
    if !options.target_languages.is_empty() {
        config.site.target_languages = options.target_languages;
    }
    if let Some(base_url) = options.base_url {
        config.site.base_url = base_url;
    }
    if let Some(model) = options.model {
        config.translation.model = model;
    }
    if let Some(api_key) = options.api_key {
        config.translation.api_key = api_key;
    }
    if let Some(backend) = options.cache_backend {
        config.cache.backend = backend.into();
    }
    if options.publish {
        config.cache.publish = true;
    }
    if options.force_recreate {
        config.cache.force_recreate = true;
    }
    if let Some(window) = options.recheck_window {
        config.cache.recheck_window_secs = window;
    }
    if let Some(batch_size) = options.batch_size {
        config.orchestration.batch_size = batch_size;
    }
    if options.strict {
        config.orchestration.strict = true;
    }
}

fn progress_bar() -> ProgressBar {
    let progress_bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({percent}%) {eta}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar
}

async fn run_translate(global: &GlobalOptions, site_dir: &Path, options: TranslateOptions) -> Result<()> {
    let mut config = load_config(global)?;
    apply_translate_options(&mut config, options);
    config.validate().context("Configuration validation failed")?;

    if !FileManager::dir_exists(site_dir) {
        return Err(anyhow!("Site directory does not exist: {:?}", site_dir));
    }

    let store = cache::store_from_config(&config.cache)
        .await
        .context("Failed to set up the translation cache")?;
    let client = TranslationClient::from_config(&config.translation, &config.site);

    let documents = FileManager::discover_documents(site_dir, &config.target_languages())?;
    if documents.is_empty() {
        warn!("No HTML documents found in {:?}", site_dir);
        return Ok(());
    }
    let sitemap = FileManager::read_optional(site_dir.join(&config.site.sitemap_path))?;

    let progress = progress_bar();
    let callback_bar = progress.clone();
    let orchestrator = Orchestrator::new(&config, client, store)?.with_progress(Arc::new(move |done: usize, total: usize| {
        callback_bar.set_length(total as u64);
        callback_bar.set_position(done as u64);
    }));

    info!(
        "Translating {} documents from {} into {}",
        documents.len(),
        config.site.source_language,
        orchestrator.languages().join(", ")
    );
    let report = orchestrator.run(documents, sitemap).await?;
    progress.finish_and_clear();

    FileManager::write_report(site_dir, &config.site.sitemap_path, &report)?;

    for line in report.summary.to_string().lines() {
        info!("{}", line);
    }
    if let Some(flush_error) = &report.flush_error {
        error!("Translation cache was not published: {}", flush_error);
    }

    if config.orchestration.strict && report.has_failures() {
        return Err(anyhow!(
            "{} of {} tasks failed (strict mode)",
            report.summary.total_failures(),
            report.summary.tasks
        ));
    }
    Ok(())
}

async fn run_cache(global: &GlobalOptions, command: CacheCommands) -> Result<()> {
    let config = load_config(global)?;
    config.validate_cache().context("Configuration validation failed")?;

    match command {
        CacheCommands::Fetch => {
            let store = cache::store_from_config(&config.cache).await?;
            let state = store.fetch().await.context("Failed to fetch translation cache")?;
            info!("Translation cache is {:?} at {:?}", state, store.mirror().root());
        }
        CacheCommands::Push { force_recreate } => {
            let store = cache::store_from_config(&config.cache).await?;
            let options = FlushOptions {
                valid_keys: None,
                force_recreate: force_recreate || config.cache.force_recreate,
            };
            let outcome = store.flush(&options).await.context("Failed to push translation cache")?;
            info!("Cache flush: {:?}", outcome);
        }
        CacheCommands::Put { key, file } => {
            let content = std::fs::read(&file).context(format!("Failed to read file: {:?}", file))?;
            match config.cache.backend {
                CacheBackend::GitHub => {
                    let branch_cache = GitBranchCache::from_config(&config.cache);
                    let uploaded = branch_cache
                        .put_remote_file(&key, &content)
                        .await
                        .context(format!("Failed to upload {}", key))?;
                    if !uploaded {
                        info!("{} already up to date on {}", key, branch_cache.branch());
                    }
                }
                CacheBackend::Local => {
                    let target = config.cache.resolved_mirror_dir().join(&key);
                    if let Some(parent) = target.parent() {
                        FileManager::ensure_dir(parent)?;
                    }
                    std::fs::write(&target, &content).context(format!("Failed to write file: {:?}", target))?;
                    info!("Stored {} in the local cache", key);
                }
            }
        }
    }
    Ok(())
}
