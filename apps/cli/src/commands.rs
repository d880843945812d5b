//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use courseforge_core::pipeline::{
    ConvertRequest, PipelineOptions, PipelineSummary, ProgressReporter,
};
use courseforge_core::Format;
use courseforge_shared::{AppConfig, config_file_path, init_config, load_config, load_config_from};
use courseforge_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// courseforge — convert course directories into storage documents.
#[derive(Parser)]
#[command(
    name = "courseforge",
    version,
    about = "Resolve course directories and convert them to documents, search indexes and books.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.courseforge/courseforge.toml).
    #[arg(long, env = "COURSEFORGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Conversion service URL, overriding `converter.http_url`.
    #[arg(long, env = "COURSEFORGE_CONVERTER_URL", global = true, hide_env_values = true)]
    pub converter_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert a course from one format to another.
    Convert {
        /// Source format: eocs or olx.
        #[arg(long, default_value = "eocs")]
        from_format: Format,

        /// Source location (path or file:// URI).
        #[arg(long)]
        from_uri: String,

        /// Target format: eocs, olx, docs, store or book.
        #[arg(long)]
        to_format: Format,

        /// Target location (path or file:// URI).
        #[arg(long)]
        to_uri: String,

        /// Replace an existing target.
        #[arg(long)]
        force: bool,

        /// Skip reading vertical timestamps from git history.
        #[arg(long)]
        no_git_timestamps: bool,
    },

    /// Read a course and report its shape without writing anything.
    Verify {
        /// Course format: eocs or olx.
        #[arg(long, default_value = "eocs")]
        format: Format,

        /// Course location (path or file:// URI).
        #[arg(long)]
        uri: String,
    },

    /// Full-text search over a document store written by `convert --to-format store`.
    Search {
        /// Database file.
        #[arg(long)]
        db: PathBuf,

        /// Course language; selects the search index.
        #[arg(long, default_value = "en")]
        language: String,

        /// Search terms.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value = "10")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "courseforge=info",
        1 => "courseforge=debug",
        _ => "courseforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Convert {
            from_format,
            from_uri,
            to_format,
            to_uri,
            force,
            no_git_timestamps,
        } => {
            let request = ConvertRequest {
                from_format,
                from_uri,
                to_format,
                to_uri,
                force,
            };
            cmd_convert(&config, &request, no_git_timestamps).await
        }
        Command::Verify { format, uri } => cmd_verify(&config, format, &uri).await,
        Command::Search {
            db,
            language,
            query,
            limit,
        } => cmd_search(&config, &db, &language, &query, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(cli.config.as_deref(), force).await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

/// Load the config file and apply global flag overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) if path.exists() => load_config_from(path)?,
        Some(_) => AppConfig::default(),
        None => load_config()?,
    };
    if let Some(url) = &cli.converter_url {
        config.converter.http_url = url.clone();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_convert(config: &AppConfig, request: &ConvertRequest, no_git_timestamps: bool) -> Result<()> {
    let mut options = PipelineOptions::from(config);
    if no_git_timestamps {
        options.git_timestamps = false;
    }
    let converter = courseforge_convert::from_settings(&config.converter)?;

    info!(
        from = %request.from_format,
        to = %request.to_format,
        force = request.force,
        "converting course"
    );

    let reporter = CliProgress::new();
    let summary =
        courseforge_core::pipeline::convert(request, converter, &options, &reporter).await?;

    println!();
    println!("  Course converted successfully!");
    print_course(&summary);
    if let Some(target) = &summary.target {
        println!("  Target:      {} ({})", target.display(), request.to_format);
    }
    if let Some(docs) = &summary.documents {
        println!(
            "  Documents:   {} units, {} sections, {} cards, {} exams, {} questions",
            docs.units, docs.sections, docs.cards, docs.exams, docs.questions
        );
    }
    if let Some(stored) = &summary.stored {
        println!(
            "  Stored:      {} new, {} updated, {} unchanged, {} search docs",
            stored.inserted, stored.updated, stored.unchanged, stored.search_docs
        );
    }
    if options.git_timestamps {
        println!("  Timestamps:  {} verticals", summary.timestamped);
    }
    println!("  Time:        {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_verify(config: &AppConfig, format: Format, uri: &str) -> Result<()> {
    let options = PipelineOptions::from(config);
    let converter = courseforge_convert::from_settings(&config.converter)?;

    let reporter = CliProgress::new();
    let summary =
        courseforge_core::pipeline::verify(format, uri, converter, &options, &reporter).await?;

    println!();
    println!("  Course is valid.");
    print_course(&summary);
    println!("  Time:        {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_search(config: &AppConfig, db: &Path, language: &str, query: &str, limit: u32) -> Result<()> {
    let storage = Storage::open_readonly(db).await?;
    let index_name = config.storage.index_name(language);
    let hits = storage.search(&index_name, query, limit).await?;

    if hits.is_empty() {
        println!("No results for '{query}' in {index_name}.");
        return Ok(());
    }
    for hit in &hits {
        println!("{:<8} {}  ({})", hit.doc_type, hit.title, hit.id);
        if !hit.headline.is_empty() {
            println!("         {}", hit.headline);
        }
    }
    Ok(())
}

async fn cmd_config_init(path: Option<&Path>, force: bool) -> Result<()> {
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if target.exists() && !force {
        return Err(eyre!(
            "config file already exists at '{}' (pass --force to overwrite)",
            target.display()
        ));
    }
    let path = init_config(Some(&target))?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_course(summary: &PipelineSummary) {
    println!("  Course:      {} ({})", summary.course_name, summary.course_id);
    println!(
        "  Contents:    {} chapters, {} sequentials, {} verticals, {} blocks",
        summary.stats.chapters,
        summary.stats.sequentials,
        summary.stats.verticals,
        summary.stats.blocks
    );
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    extracted: AtomicUsize,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            extracted: AtomicUsize::new(0),
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn vertical_extracted(&self, display_name: &str, failed: bool) {
        let n = self.extracted.fetch_add(1, Ordering::Relaxed) + 1;
        if failed {
            self.spinner.println(format!("  ✗ {display_name}: extraction failed"));
        }
        self.spinner
            .set_message(format!("Extracting [{n}] {display_name}"));
    }

    fn done(&self, _summary: &PipelineSummary) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_convert() {
        let cli = Cli::try_parse_from([
            "courseforge",
            "convert",
            "--from-uri",
            "./course",
            "--to-format",
            "docs",
            "--to-uri",
            "./out",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Command::Convert {
                from_format,
                to_format,
                force,
                no_git_timestamps,
                ..
            } => {
                assert_eq!(from_format, Format::Eocs);
                assert_eq!(to_format, Format::Docs);
                assert!(force);
                assert!(!no_git_timestamps);
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(
            Cli::try_parse_from([
                "courseforge",
                "verify",
                "--format",
                "olx",
                "--uri",
                "x",
            ])
            .is_err()
        );
    }

    #[test]
    fn converter_url_overrides_config() {
        let cli = Cli::try_parse_from([
            "courseforge",
            "--config",
            "/nonexistent/courseforge.toml",
            "--converter-url",
            "http://converter.test:9000/",
            "config",
            "show",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.converter.http_url, "http://converter.test:9000/");
    }
}
