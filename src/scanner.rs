/*!
 * Directory and file scanning functionality
 *
 * Two depth-first renderings of the same tree share this module: the
 * directory map (a `tree`-style listing) and the interleaved report (folder
 * headings mixed with fenced file contents). Both sort entries by name at
 * every level and skip excluded folders by exact name.
 */

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use indicatif::ProgressBar;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::report::FileReportInfo;
use crate::types::{DirEntry, DirListing, EntryKind, FileContent};
use crate::utils::language_tag;
use crate::walk::{CancelToken, Descend, WalkGuard};

const TEE: &str = "├── ";
const CORNER: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

/// Scanner statistics
#[derive(Debug, Clone, Default)]
pub struct ScanStatistics {
    /// Files whose contents were embedded
    pub files_embedded: usize,
    /// Folders rendered in the interleaved report
    pub folders_visited: usize,
    /// Allowed files that could not be read
    pub unreadable_files: usize,
    /// Total number of lines embedded
    pub total_lines: usize,
    /// Total number of characters embedded
    pub total_chars: usize,
    /// Details for each embedded file
    pub file_details: BTreeMap<String, FileReportInfo>,
}

/// List a directory, sorted by name.
///
/// Kinds are resolved through symlinks, so a link to a folder counts as a
/// folder. Entries that vanish while listing are skipped.
pub fn list_dir(dir: &Path) -> DirListing {
    let mut entries = Vec::new();

    for item in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        match item {
            Ok(entry) => {
                let path = entry.path().to_path_buf();
                let kind = if path.is_dir() {
                    EntryKind::Directory
                } else if path.is_file() {
                    EntryKind::File
                } else {
                    EntryKind::Other
                };
                entries.push(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path,
                    kind,
                });
            }
            Err(e) if e.depth() == 0 => return DirListing::Unreadable(e.into()),
            Err(e) => log::debug!("Skipping entry in {}: {}", dir.display(), e),
        }
    }

    DirListing::Entries(entries)
}

/// Read a file as text, replacing invalid UTF-8 instead of failing
pub fn read_file(path: &Path) -> FileContent {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => FileContent::Empty,
        Ok(bytes) => FileContent::Text(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => FileContent::Unreadable(e),
    }
}

/// Scanner for a project folder
pub struct Scanner {
    /// Filters for this scan
    config: ScanConfig,
    /// Progress bar
    pub progress: Arc<ProgressBar>,
    /// Stop signal checked at every folder
    cancel: CancelToken,
    /// Scanner statistics
    statistics: Mutex<ScanStatistics>,
}

impl Scanner {
    /// Create a new scanner
    pub fn new(config: ScanConfig, progress: Arc<ProgressBar>) -> Self {
        Self {
            config,
            progress,
            cancel: CancelToken::new(),
            statistics: Mutex::new(ScanStatistics::default()),
        }
    }

    /// Stop the walks of this scanner when `cancel` fires
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Get scanner statistics
    pub fn get_statistics(&self) -> ScanStatistics {
        self.stats().clone()
    }

    fn stats(&self) -> MutexGuard<'_, ScanStatistics> {
        self.statistics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Render the directory map of `root`.
    ///
    /// The first line is the absolute root path; every other line is one
    /// non-excluded entry drawn with tree connectors. Folders that cannot be
    /// listed show no children.
    pub fn directory_map(&self, root: &Path) -> Result<String> {
        let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        let mut lines = vec![absolute.display().to_string()];
        let mut guard = WalkGuard::new(&self.cancel, self.config.max_depth, root);

        self.map_level(root, "", 1, &mut guard, &mut lines)?;

        Ok(lines.join("\n"))
    }

    fn map_level(
        &self,
        dir: &Path,
        prefix: &str,
        depth: usize,
        guard: &mut WalkGuard<'_>,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        guard.check()?;

        let entries = match list_dir(dir) {
            DirListing::Entries(entries) => entries,
            DirListing::Unreadable(e) => {
                log::debug!("Cannot list {}: {}", dir.display(), e);
                return Ok(());
            }
        };
        let visible: Vec<DirEntry> = entries
            .into_iter()
            .filter(|e| !(e.is_dir() && self.config.is_excluded(&e.name)))
            .collect();

        let last_index = visible.len().saturating_sub(1);
        for (i, entry) in visible.iter().enumerate() {
            let is_last = i == last_index;
            let connector = if is_last { CORNER } else { TEE };
            lines.push(format!("{}{}{}", prefix, connector, entry.name));

            if !entry.is_dir() {
                continue;
            }
            match guard.descend(&entry.path, depth) {
                Descend::Enter(real) => {
                    let continuation = if is_last { SPACE } else { PIPE };
                    let child_prefix = format!("{}{}", prefix, continuation);
                    guard.enter(real);
                    let result = self.map_level(&entry.path, &child_prefix, depth + 1, guard, lines);
                    guard.leave();
                    result?;
                }
                other => log::debug!("Not expanding {}: {:?}", entry.path.display(), other),
            }
        }

        Ok(())
    }

    /// Render the interleaved report of `root`, starting with a heading of
    /// `depth` markers (at least one).
    ///
    /// Per folder: the heading, then every allowed file in name order as a
    /// bold label plus fenced contents, then every non-excluded subfolder in
    /// name order, each fully expanded before the next.
    pub fn interleaved_report(&self, root: &Path, depth: usize) -> Result<String> {
        let mut lines = Vec::new();
        let mut guard = WalkGuard::new(&self.cancel, self.config.max_depth, root);

        self.interleave_level(root, depth.max(1), 1, &mut guard, &mut lines)?;

        Ok(lines.join("\n"))
    }

    fn interleave_level(
        &self,
        dir: &Path,
        heading: usize,
        depth: usize,
        guard: &mut WalkGuard<'_>,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        guard.check()?;

        let folder_name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        lines.push(format!("{} {}", "#".repeat(heading), folder_name));
        self.stats().folders_visited += 1;
        self.progress.set_message(format!("📂 {}", folder_name));

        let entries = match list_dir(dir) {
            DirListing::Entries(entries) => entries,
            DirListing::Unreadable(e) => {
                log::warn!("Cannot list {}: {}", dir.display(), e);
                lines.push(format!("Error listing folder: {}", e));
                return Ok(());
            }
        };

        for entry in entries
            .iter()
            .filter(|e| e.is_file() && self.config.is_allowed_file(&e.name))
        {
            self.embed_file(entry, lines);
        }

        for entry in entries
            .iter()
            .filter(|e| e.is_dir() && !self.config.is_excluded(&e.name))
        {
            match guard.descend(&entry.path, depth) {
                Descend::Enter(real) => {
                    guard.enter(real);
                    let result =
                        self.interleave_level(&entry.path, heading + 1, depth + 1, guard, lines);
                    guard.leave();
                    result?;
                }
                Descend::TooDeep => log::warn!(
                    "Depth limit {} reached, not expanding {}",
                    self.config.max_depth,
                    entry.path.display()
                ),
                other => log::debug!("Not expanding {}: {:?}", entry.path.display(), other),
            }
        }

        Ok(())
    }

    /// Append the label and fenced contents of one file
    fn embed_file(&self, entry: &DirEntry, lines: &mut Vec<String>) {
        self.progress.inc(1);

        let body = match read_file(&entry.path) {
            FileContent::Text(text) => {
                let mut stats = self.stats();
                let info = FileReportInfo {
                    lines: text.lines().count(),
                    chars: text.chars().count(),
                };
                stats.files_embedded += 1;
                stats.total_lines += info.lines;
                stats.total_chars += info.chars;
                stats
                    .file_details
                    .insert(entry.path.display().to_string(), info);
                text
            }
            FileContent::Empty => {
                let mut stats = self.stats();
                stats.files_embedded += 1;
                stats
                    .file_details
                    .insert(entry.path.display().to_string(), FileReportInfo::default());
                String::new()
            }
            FileContent::Unreadable(e) => {
                log::warn!("Cannot read {}: {}", entry.path.display(), e);
                self.stats().unreadable_files += 1;
                format!("Error reading file: {}", e)
            }
        };

        lines.push(format!("**{}**", entry.name));
        lines.push(format!("```{}", language_tag(&entry.name)));
        lines.push(body);
        lines.push("```".to_string());
    }
}
