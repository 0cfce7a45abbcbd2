/*!
 * Utility functions for dirprompt
 */

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use walkdir::WalkDir;

use crate::config::ScanConfig;

/// Fence language tag per lowercase extension
pub static LANGUAGE_TAGS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (".html", "html"),
        (".css", "css"),
        (".js", "js"),
        (".php", "php"),
        (".py", "python"),
        (".java", "java"),
        (".sql", "sql"),
        (".c", "c"),
        (".cpp", "cpp"),
        (".cu", "cuda"),
        (".h", "c"),
        (".json", "json"),
        (".xml", "xml"),
        (".md", "markdown"),
    ])
});

/// Fence tag for a file name, from its last extension; empty when unknown
pub fn language_tag(file_name: &str) -> &'static str {
    let Some(ext) = Path::new(file_name).extension() else {
        return "";
    };
    let key = format!(".{}", ext.to_string_lossy().to_lowercase());
    LANGUAGE_TAGS.get(key.as_str()).copied().unwrap_or("")
}

/// Count the files a scan will embed, for progress tracking
pub fn count_files(dir: &Path, config: &ScanConfig) -> u64 {
    WalkDir::new(dir)
        .follow_links(true)
        .max_depth(config.max_depth.saturating_add(1))
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && config.is_excluded(&entry.file_name().to_string_lossy()))
        })
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_file()
                && config.is_allowed_file(&entry.file_name().to_string_lossy())
        })
        .count() as u64
}

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Rough LLM token estimate: four characters per token
pub fn estimate_tokens(chars: usize) -> usize {
    chars / 4
}
