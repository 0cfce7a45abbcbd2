/*!
 * Core types and data structures for dirprompt
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of a directory entry, resolved through symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Directory (or symlink to one)
    Directory,
    /// Regular file (or symlink to one)
    File,
    /// Sockets, broken links and anything else
    Other,
}

/// One entry of a directory listing
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Base name of the entry
    pub name: String,
    /// Full path of the entry
    pub path: PathBuf,
    /// Entry kind
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Outcome of listing a directory
#[derive(Debug)]
pub enum DirListing {
    /// Entries sorted by name
    Entries(Vec<DirEntry>),
    /// The directory could not be listed
    Unreadable(io::Error),
}

/// Outcome of reading a file as text
#[derive(Debug)]
pub enum FileContent {
    /// Decoded text; invalid UTF-8 sequences are replaced
    Text(String),
    /// The file exists but holds no bytes
    Empty,
    /// The file could not be read
    Unreadable(io::Error),
}

/// Database backend selector
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// Embedded file-based store
    #[default]
    Sqlite,
    /// Networked server-based store
    Mysql,
}

/// Credentials for the networked backend
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredentials {
    #[serde(rename = "server", default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

impl NetworkCredentials {
    /// All four fields are filled in
    pub fn is_complete(&self) -> bool {
        [&self.host, &self.user, &self.password, &self.database]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

impl fmt::Debug for NetworkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Where the schema report comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseDescriptor {
    /// SQLite database file
    Embedded { path: PathBuf },
    /// MySQL server
    Networked(NetworkCredentials),
}

impl DatabaseDescriptor {
    pub fn kind(&self) -> DatabaseKind {
        match self {
            Self::Embedded { .. } => DatabaseKind::Sqlite,
            Self::Networked(_) => DatabaseKind::Mysql,
        }
    }
}

/// Free-text fields placed at the top of the prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptFields {
    #[serde(alias = "contexto")]
    pub context: String,
    #[serde(alias = "objetivo")]
    pub objective: String,
    #[serde(alias = "restricciones")]
    pub constraints: String,
    #[serde(alias = "formato")]
    pub output_format: String,
}

impl PromptFields {
    /// Copy with surrounding whitespace removed from every field
    pub fn trimmed(&self) -> Self {
        Self {
            context: self.context.trim().to_string(),
            objective: self.objective.trim().to_string(),
            constraints: self.constraints.trim().to_string(),
            output_format: self.output_format.trim().to_string(),
        }
    }
}

/// Everything needed to render one prompt
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    /// Free-text fields
    pub fields: PromptFields,
    /// Project folder to scan
    pub root: Option<PathBuf>,
    /// Database whose schema is appended
    pub database: Option<DatabaseDescriptor>,
}
