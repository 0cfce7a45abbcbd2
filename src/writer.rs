/*!
 * Saving generated prompts
 */

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rayon::prelude::*;

use crate::error::{PromptError, Result};
use crate::prompt::PromptGenerator;
use crate::scanner::{list_dir, ScanStatistics};
use crate::types::{DirListing, PromptFields};

/// Base name used when there is no project folder to name the file after
pub const FALLBACK_BASE_NAME: &str = "report";

/// `{root basename}_{YYYYMMDDHHMMSS}.{extension}`
pub fn output_file_name(root: Option<&Path>, extension: &str, now: DateTime<Local>) -> String {
    let base = root
        .and_then(|r| std::path::absolute(r).ok())
        .and_then(|r| r.file_name().map(|n| n.to_string_lossy().into_owned()))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| FALLBACK_BASE_NAME.to_string());
    format!("{}_{}.{}", base, now.format("%Y%m%d%H%M%S"), extension)
}

/// Create `dir` and its parents if needed
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| PromptError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `text` byte for byte to `dir/file_name`, creating `dir` first
pub fn save_text(dir: &Path, file_name: &str, text: &str) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, text.as_bytes()).map_err(|source| PromptError::Write {
        path: path.clone(),
        source,
    })?;
    log::info!("Wrote {} ({} bytes)", path.display(), text.len());
    Ok(path)
}

/// Result of a bulk generation
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Written prompt files, in folder name order
    pub saved: Vec<PathBuf>,
    /// `folder: reason` for every project that failed
    pub errors: Vec<String>,
    /// Statistics summed over all projects
    pub statistics: ScanStatistics,
}

/// Immediate subfolders of `container` whose names start with `prefix`, sorted
pub fn batch_targets(container: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    match list_dir(container) {
        DirListing::Entries(entries) => Ok(entries
            .into_iter()
            .filter(|e| e.is_dir() && e.name.starts_with(prefix))
            .map(|e| e.path)
            .collect()),
        DirListing::Unreadable(e) => Err(PromptError::Io(e)),
    }
}

/// Render and write one prompt per project folder, in parallel.
///
/// A failing project is recorded and the others continue; a cancelled or
/// timed-out walk stops the whole batch.
pub fn write_batch(
    generator: &PromptGenerator,
    container: &Path,
    prefix: &str,
    fields: &PromptFields,
    schema: Option<&str>,
    out_dir: &Path,
) -> Result<BatchOutcome> {
    let targets = batch_targets(container, prefix)?;
    ensure_dir(out_dir)?;
    log::info!(
        "Generating {} prompts from {}",
        targets.len(),
        container.display()
    );

    let results: Vec<(String, Result<(PathBuf, ScanStatistics)>)> = targets
        .par_iter()
        .map(|target| {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let result = generator
                .render(fields, Some(target), schema)
                .and_then(|prompt| {
                    let path = save_text(out_dir, &format!("{}.txt", name), &prompt.text)?;
                    Ok((path, prompt.statistics))
                });
            (name, result)
        })
        .collect();

    let mut outcome = BatchOutcome::default();
    for (name, result) in results {
        match result {
            Ok((path, stats)) => {
                outcome.saved.push(path);
                merge_statistics(&mut outcome.statistics, stats);
            }
            Err(e) if e.is_interrupted() => return Err(e),
            Err(e) => {
                log::warn!("Prompt for {} failed: {}", name, e);
                outcome.errors.push(format!("{}: {}", name, e));
            }
        }
    }

    Ok(outcome)
}

fn merge_statistics(total: &mut ScanStatistics, part: ScanStatistics) {
    total.files_embedded += part.files_embedded;
    total.folders_visited += part.folders_visited;
    total.unreadable_files += part.unreadable_files;
    total.total_lines += part.total_lines;
    total.total_chars += part.total_chars;
    total.file_details.extend(part.file_details);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn file_name_uses_folder_and_timestamp() {
        let name = output_file_name(Some(Path::new("/work/proj")), "md", fixed_time());
        assert_eq!(name, "proj_20240309070501.md");
    }

    #[test]
    fn file_name_falls_back_without_root() {
        let name = output_file_name(None, "txt", fixed_time());
        assert_eq!(name, "report_20240309070501.txt");
    }

    #[test]
    fn saved_text_is_byte_identical() {
        let dir = tempdir().unwrap();
        let text = "Contexto: ñandú\n\n```python\nx=1\n```\n\n";
        let path = save_text(&dir.path().join("reports"), "p.txt", text).unwrap();
        assert_eq!(fs::read(&path).unwrap(), text.as_bytes());
    }

    #[test]
    fn batch_writes_only_prefixed_projects() {
        let dir = tempdir().unwrap();
        let container = dir.path().join("projects");
        for name in ["jocarsa-a", "jocarsa-b", "other"] {
            fs::create_dir_all(container.join(name)).unwrap();
            fs::write(container.join(name).join("main.py"), "print(1)").unwrap();
        }
        fs::write(container.join("jocarsa-file.py"), "x").unwrap();
        let out = dir.path().join("prompts");

        let generator = PromptGenerator::new(ScanConfig::default());
        let fields = PromptFields {
            objective: "obj".to_string(),
            ..Default::default()
        };
        let outcome =
            write_batch(&generator, &container, "jocarsa-", &fields, None, &out).unwrap();

        assert_eq!(outcome.saved.len(), 2);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.statistics.files_embedded, 2);
        let a = fs::read_to_string(out.join("jocarsa-a.txt")).unwrap();
        assert!(a.starts_with("Objetivo: obj\n\n"));
        assert!(a.contains("# jocarsa-a"));
        assert!(!out.join("other.txt").exists());
    }

    #[test]
    fn batch_on_missing_container_fails() {
        let dir = tempdir().unwrap();
        let generator = PromptGenerator::new(ScanConfig::default());
        let result = write_batch(
            &generator,
            &dir.path().join("missing"),
            "jocarsa-",
            &PromptFields::default(),
            None,
            &dir.path().join("out"),
        );
        assert!(result.is_err());
    }
}
