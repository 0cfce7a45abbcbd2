/*!
 * Configuration handling for dirprompt
 */

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

use crate::types::{DatabaseDescriptor, DatabaseKind, NetworkCredentials, PromptFields};
use crate::{bail, Result};

/// Extensions embedded in the report when the settings do not say otherwise
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".html", ".css", ".js", ".php", ".py", ".java", ".sql", ".c", ".cpp", ".cu", ".h", ".json",
    ".xml", ".md",
];

/// Folder names never listed nor descended into by default
pub const DEFAULT_EXCLUDED_FOLDERS: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    "venv",
    "__pycache__",
    "modelo_entrenado",
    ".venv",
];

/// Levels below the root that are still expanded
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Folder name prefix selecting projects for bulk generation
pub const DEFAULT_PROJECT_PREFIX: &str = "jocarsa-";

/// Normalize one extension: trimmed, lowercase, leading dot.
///
/// Returns `None` for blank input.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered.starts_with('.') {
        Some(lowered)
    } else {
        Some(format!(".{}", lowered))
    }
}

/// Filters applied to one scan.
///
/// Built once from the settings and passed by value into every scan, so two
/// scans never observe a half-applied edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    allowed_extensions: Vec<String>,
    excluded_folders: BTreeSet<String>,
    /// Directories deeper than this below the root are listed but not expanded
    pub max_depth: usize,
}

impl ScanConfig {
    /// Create a configuration, normalizing both lists
    pub fn new<E, X>(extensions: E, excluded: X) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        X: IntoIterator,
        X::Item: AsRef<str>,
    {
        let allowed: BTreeSet<String> = extensions
            .into_iter()
            .filter_map(|e| normalize_extension(e.as_ref()))
            .collect();
        let excluded_folders = excluded
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        Self {
            allowed_extensions: allowed.into_iter().collect(),
            excluded_folders,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Allowed extensions, sorted and deduplicated
    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn excluded_folders(&self) -> &BTreeSet<String> {
        &self.excluded_folders
    }

    /// Exact-name match against the excluded folders
    pub fn is_excluded(&self, folder_name: &str) -> bool {
        self.excluded_folders.contains(folder_name)
    }

    /// Whether a file name ends with one of the allowed extensions (case-insensitive)
    pub fn is_allowed_file(&self, file_name: &str) -> bool {
        let lowered = file_name.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|ext| lowered.ends_with(ext.as_str()))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS, DEFAULT_EXCLUDED_FOLDERS)
    }
}

/// Command-line arguments for dirprompt
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "dirprompt",
    version = env!("CARGO_PKG_VERSION"),
    about = "Generate a Markdown prompt from a project folder",
    long_about = "Writes a directory map, the contents of every source file and optionally a database schema into one Markdown document, ready to paste into an LLM prompt."
)]
pub struct Args {
    /// Project folder to scan (the container folder with --batch)
    #[clap(required_unless_present_any = ["generate", "test_db"])]
    pub source_root: Option<PathBuf>,

    /// Folder where the report is written
    #[clap(required_unless_present_any = ["generate", "test_db"])]
    pub dest_folder: Option<PathBuf>,

    /// Context field placed at the top of the prompt
    #[clap(long, default_value = "")]
    pub context: String,

    /// Objective field
    #[clap(long, default_value = "")]
    pub objective: String,

    /// Constraints field
    #[clap(long, default_value = "")]
    pub constraints: String,

    /// Desired output format field
    #[clap(long, default_value = "")]
    pub output_format: String,

    /// SQLite database whose schema is appended
    #[clap(long, value_name = "FILE", conflicts_with = "mysql_host")]
    pub sqlite: Option<PathBuf>,

    /// MySQL server whose schema is appended
    #[clap(long, value_name = "HOST", requires_all = ["mysql_user", "mysql_password", "mysql_database"])]
    pub mysql_host: Option<String>,

    /// MySQL user
    #[clap(long)]
    pub mysql_user: Option<String>,

    /// MySQL password
    #[clap(long)]
    pub mysql_password: Option<String>,

    /// MySQL database name
    #[clap(long)]
    pub mysql_database: Option<String>,

    /// Comma-separated allowed extensions (overrides the settings file for this run)
    #[clap(long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Comma-separated excluded folder names (overrides the settings file for this run)
    #[clap(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Deepest folder level that is still expanded
    #[clap(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Write a .txt file instead of .md
    #[clap(long)]
    pub txt: bool,

    /// Generate one prompt per project folder inside SOURCE_ROOT
    #[clap(long)]
    pub batch: bool,

    /// Folder name prefix used by --batch
    #[clap(long, default_value = DEFAULT_PROJECT_PREFIX)]
    pub prefix: String,

    /// Only test the database connection and print its structure
    #[clap(long)]
    pub test_db: bool,

    /// Copy the generated report to the system clipboard
    #[clap(long)]
    pub clip: bool,

    /// Settings file (defaults to the user config folder)
    #[clap(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress, summary and logs
    #[clap(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Prompt fields as given on the command line
    pub fn fields(&self) -> PromptFields {
        PromptFields {
            context: self.context.clone(),
            objective: self.objective.clone(),
            constraints: self.constraints.clone(),
            output_format: self.output_format.clone(),
        }
        .trimmed()
    }

    /// Database selected on the command line, if any.
    ///
    /// Incomplete MySQL credentials are rejected here, before any work starts.
    pub fn database(&self) -> Result<Option<DatabaseDescriptor>> {
        if let Some(path) = &self.sqlite {
            return Ok(Some(DatabaseDescriptor::Embedded { path: path.clone() }));
        }
        if self.mysql_host.is_none() {
            return Ok(None);
        }

        let credentials = NetworkCredentials {
            host: self.mysql_host.clone().unwrap_or_default(),
            user: self.mysql_user.clone().unwrap_or_default(),
            password: self.mysql_password.clone().unwrap_or_default(),
            database: self.mysql_database.clone().unwrap_or_default(),
        };
        if !credentials.is_complete() {
            bail!(
                InvalidInput,
                "all {} connection fields (host, user, password, database) are required",
                DatabaseKind::Mysql
            );
        }
        Ok(Some(DatabaseDescriptor::Networked(credentials)))
    }

    /// Apply the per-run overrides on top of the configuration from the settings
    pub fn scan_config(&self, base: ScanConfig) -> ScanConfig {
        let config = match (self.extensions.is_empty(), self.exclude.is_empty()) {
            (true, true) => base,
            (false, true) => ScanConfig::new(&self.extensions, base.excluded_folders()),
            (true, false) => ScanConfig::new(base.allowed_extensions(), &self.exclude),
            (false, false) => ScanConfig::new(&self.extensions, &self.exclude),
        };
        config.with_max_depth(self.max_depth)
    }

    /// Extension of the written report
    pub fn output_extension(&self) -> &'static str {
        if self.txt {
            "txt"
        } else {
            "md"
        }
    }
}

/// Command-line arguments for the HTTP server
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "dirprompt-server",
    version = env!("CARGO_PKG_VERSION"),
    about = "Serve the dirprompt JSON API"
)]
pub struct ServerArgs {
    /// Address to listen on
    #[clap(long, default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Settings file (defaults to the user config folder)
    #[clap(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Folder holding the reports/ and prompts/ output folders
    #[clap(long, default_value = ".")]
    pub output_root: PathBuf,

    /// Seconds a single folder walk may run
    #[clap(long, default_value_t = 120)]
    pub walk_timeout: u64,

    /// Concurrent walks allowed over the same project folder
    #[clap(long, default_value_t = 2)]
    pub max_walks_per_root: usize,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable logging
    #[clap(short, long)]
    pub quiet: bool,
}

/// Map `-q` / `-v` flags to a log level
pub fn log_level(quiet: bool, verbose: u8) -> log::LevelFilter {
    if quiet {
        return log::LevelFilter::Off;
    }
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_normalized() {
        let config = ScanConfig::new(["PY", " .Js ", "", "py", "md"], ["target"]);
        assert_eq!(config.allowed_extensions(), &[".js", ".md", ".py"]);
    }

    #[test]
    fn excluded_names_are_trimmed_and_exact() {
        let config = ScanConfig::new([".py"], [" node_modules ", "", "build"]);
        assert!(config.is_excluded("node_modules"));
        assert!(config.is_excluded("build"));
        assert!(!config.is_excluded("build2"));
        assert!(!config.is_excluded("Node_Modules"));
    }

    #[test]
    fn allowed_file_match_is_case_insensitive() {
        let config = ScanConfig::default();
        assert!(config.is_allowed_file("Main.PY"));
        assert!(config.is_allowed_file("index.html"));
        assert!(!config.is_allowed_file("notes.txt"));
        assert!(!config.is_allowed_file("py"));
    }

    #[test]
    fn cli_overrides_replace_settings_lists() {
        let args = Args::parse_from(["dirprompt", "src", "out", "--extensions", "rs,toml"]);
        let config = args.scan_config(ScanConfig::default());
        assert_eq!(config.allowed_extensions(), &[".rs", ".toml"]);
        assert!(config.is_excluded(".git"));
    }

    #[test]
    fn incomplete_mysql_credentials_are_rejected() {
        let args = Args::parse_from([
            "dirprompt",
            "src",
            "out",
            "--mysql-host",
            "localhost",
            "--mysql-user",
            "root",
            "--mysql-password",
            " ",
            "--mysql-database",
            "shop",
        ]);
        assert!(args.database().is_err());
    }

    #[test]
    fn sqlite_selection_builds_embedded_descriptor() {
        let args = Args::parse_from(["dirprompt", "src", "out", "--sqlite", "app.db"]);
        let db = args.database().unwrap();
        assert_eq!(
            db,
            Some(DatabaseDescriptor::Embedded {
                path: PathBuf::from("app.db")
            })
        );
    }

    #[test]
    fn positionals_optional_for_completions() {
        let args = Args::parse_from(["dirprompt", "--generate", "bash"]);
        assert!(args.source_root.is_none());
        assert_eq!(args.generate, Some(Shell::Bash));
    }
}
