//! Application configuration for courseforge.
//!
//! User config lives at `~/.courseforge/courseforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CourseError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "courseforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".courseforge";

// ---------------------------------------------------------------------------
// Config structs (matching courseforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub converter: ConverterSettings,

    #[serde(default)]
    pub documents: DocumentsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub git: GitConfig,
}

/// How the numeric `NN_` directory prefix is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixPolicy {
    /// The prefix only has to parse; ordering comes from the walk.
    #[default]
    Hint,
    /// The prefix must equal the entity's 0-based position among its siblings.
    Strict,
}

/// `[resolver]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Number of verticals extracted concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub prefix_policy: PrefixPolicy,

    /// Directory names pruned from the walk.
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,

    /// Order blocks by file name instead of directory listing order.
    #[serde(default = "default_true")]
    pub sort_blocks: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            prefix_policy: PrefixPolicy::default(),
            ignored_dirs: default_ignored_dirs(),
            sort_blocks: true,
        }
    }
}

fn default_concurrency() -> usize {
    5
}
fn default_ignored_dirs() -> Vec<String> {
    [".git", ".hg", ".bzr", ".idea", ".vscode", ".", "assets", "drafts"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_true() -> bool {
    true
}

/// Which text-conversion backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterBackend {
    /// A long-running conversion service reached over HTTP.
    #[default]
    Http,
    /// A child process speaking JSON lines on stdin/stdout.
    Bridge,
}

/// `[converter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterSettings {
    #[serde(default)]
    pub backend: ConverterBackend,

    #[serde(default = "default_http_url")]
    pub http_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_bridge_cmd")]
    pub bridge_cmd: String,

    #[serde(default = "default_bridge_script")]
    pub bridge_script: String,

    /// Working directory the bridge process is started in.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Run `make_md` and `unescape_md` in-process.
    #[serde(default)]
    pub local_markdown: bool,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            backend: ConverterBackend::default(),
            http_url: default_http_url(),
            timeout_secs: default_timeout_secs(),
            bridge_cmd: default_bridge_cmd(),
            bridge_script: default_bridge_script(),
            working_dir: default_working_dir(),
            local_markdown: false,
        }
    }
}

fn default_http_url() -> String {
    "http://localhost:6222/".into()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_bridge_cmd() -> String {
    "node".into()
}
fn default_bridge_script() -> String {
    "showdownjs/bridge.js".into()
}
fn default_working_dir() -> String {
    ".".into()
}

/// `[documents]` section: business constants used by the denormalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Base URL of the embedded code editor.
    #[serde(default = "default_editor_url")]
    pub editor_url: String,

    #[serde(default = "default_exam_creator_id")]
    pub exam_creator_id: String,

    #[serde(default = "default_exam_pass_mark_pct")]
    pub exam_pass_mark_pct: u32,

    #[serde(default = "default_verified_cert_cost")]
    pub verified_cert_cost: u32,

    /// Used when a course does not declare `est_minutes`.
    #[serde(default = "default_est_minutes")]
    pub default_est_minutes: i64,

    #[serde(default = "default_attempts_allowed_per_day")]
    pub attempts_allowed_per_day: u32,

    /// Editor height when a REPL config does not set one.
    #[serde(default = "default_editor_height")]
    pub editor_height: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            editor_url: default_editor_url(),
            exam_creator_id: default_exam_creator_id(),
            exam_pass_mark_pct: default_exam_pass_mark_pct(),
            verified_cert_cost: default_verified_cert_cost(),
            default_est_minutes: default_est_minutes(),
            attempts_allowed_per_day: default_attempts_allowed_per_day(),
            editor_height: default_editor_height(),
        }
    }
}

fn default_editor_url() -> String {
    "https://repl.exlcode.com/embed".into()
}
fn default_exam_creator_id() -> String {
    "1ejFaqz00nJy".into()
}
fn default_exam_pass_mark_pct() -> u32 {
    75
}
fn default_verified_cert_cost() -> u32 {
    30
}
fn default_est_minutes() -> i64 {
    600
}
fn default_attempts_allowed_per_day() -> u32 {
    2
}
fn default_editor_height() -> String {
    "500px".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Search index base name; the full name is `<base>_<language>`.
    #[serde(default = "default_search_base_index")]
    pub search_base_index: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            search_base_index: default_search_base_index(),
        }
    }
}

impl StorageConfig {
    /// Search index name for a course language.
    pub fn index_name(&self, language: &str) -> String {
        format!("{}_{}", self.search_base_index, language)
    }
}

fn default_search_base_index() -> String {
    "learn".into()
}

/// `[git]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Enrich verticals with created/updated timestamps from git history.
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { timestamps: true }
    }
}

// ---------------------------------------------------------------------------
// Resolve options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime resolver options.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub concurrency: usize,
    pub prefix_policy: PrefixPolicy,
    pub ignored_dirs: Vec<String>,
    pub sort_blocks: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ResolveOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.resolver.concurrency.max(1),
            prefix_policy: config.resolver.prefix_policy,
            ignored_dirs: config.resolver.ignored_dirs.clone(),
            sort_blocks: config.resolver.sort_blocks,
        }
    }
}

impl ResolveOptions {
    /// Whether a directory name is pruned from the walk.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored_dirs.iter().any(|d| d == name)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.courseforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CourseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.courseforge/courseforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CourseError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CourseError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path` (or the default location).
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| CourseError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| CourseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CourseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
