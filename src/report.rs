/*!
 * Console summary of a finished run
 *
 * Rendered with the tabled crate after the CLI has written its output.
 */

use std::collections::BTreeMap;
use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::scanner::ScanStatistics;
use crate::utils::{estimate_tokens, format_file_size};

/// Size of one embedded file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReportInfo {
    /// Number of lines in the file
    pub lines: usize,
    /// Number of characters in the file
    pub chars: usize,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Written file, if any
    pub output_file: Option<String>,
    /// Bytes of the generated text
    pub output_bytes: u64,
    /// Wall time of scan plus write
    pub duration: Duration,
    /// Whether a schema section was appended
    pub schema_included: bool,
    /// Scanner statistics
    pub statistics: ScanStatistics,
}

/// Files listed individually before the table is cut to the largest ones
const FULL_LISTING_LIMIT: usize = 15;
const TOP_FILES: usize = 10;

/// Format a number with human-readable units
fn format_number(num: usize) -> String {
    if num >= 1_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else if num >= 1_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else {
        num.to_string()
    }
}

/// Keep the tail of a long path
fn shorten_path(path: &str, max_len: usize) -> String {
    let count = path.chars().count();
    if count <= max_len {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (max_len - 3)).collect();
    format!("...{}", tail)
}

fn styled(mut table: Table) -> String {
    table
        .with(Style::rounded())
        .with(Padding::new(1, 1, 0, 0))
        .with(Modify::new(Columns::new(..)).with(Alignment::left()));
    table.to_string()
}

fn summary_table(summary: &RunSummary) -> String {
    #[derive(Tabled)]
    struct SummaryRow {
        #[tabled(rename = "Metric")]
        key: &'static str,
        #[tabled(rename = "Value")]
        value: String,
    }

    let stats = &summary.statistics;
    let mut rows = vec![
        SummaryRow {
            key: "📂 Output File",
            value: summary
                .output_file
                .clone()
                .unwrap_or_else(|| "(not saved)".to_string()),
        },
        SummaryRow {
            key: "⏱️ Process Time",
            value: format!("{:.4?}", summary.duration),
        },
        SummaryRow {
            key: "📄 Files Embedded",
            value: format_number(stats.files_embedded),
        },
        SummaryRow {
            key: "🗂️ Folders",
            value: format_number(stats.folders_visited),
        },
        SummaryRow {
            key: "📝 Total Lines",
            value: format_number(stats.total_lines),
        },
        SummaryRow {
            key: "📦 LLM Tokens",
            value: format!(
                "{} tokens (estimated)",
                format_number(estimate_tokens(stats.total_chars))
            ),
        },
        SummaryRow {
            key: "💾 Output Size",
            value: format_file_size(summary.output_bytes),
        },
        SummaryRow {
            key: "🗄️ Database Schema",
            value: if summary.schema_included {
                "included".to_string()
            } else {
                "none".to_string()
            },
        },
    ];
    if stats.unreadable_files > 0 {
        rows.push(SummaryRow {
            key: "⚠️ Unreadable Files",
            value: format_number(stats.unreadable_files),
        });
    }

    styled(Table::new(rows))
}

fn files_table(details: &BTreeMap<String, FileReportInfo>) -> String {
    #[derive(Tabled)]
    struct FileRow {
        #[tabled(rename = "File Path")]
        path: String,
        #[tabled(rename = "Lines")]
        lines: String,
        #[tabled(rename = "Est. Tokens")]
        tokens: String,
    }

    let mut files: Vec<_> = details.iter().collect();
    files.sort_by(|(_, a), (_, b)| b.chars.cmp(&a.chars));
    if files.len() > FULL_LISTING_LIMIT {
        files.truncate(TOP_FILES);
    }

    let rows: Vec<FileRow> = files
        .into_iter()
        .map(|(path, info)| FileRow {
            path: shorten_path(path, 60),
            lines: format_number(info.lines),
            tokens: format_number(estimate_tokens(info.chars)),
        })
        .collect();

    styled(Table::new(rows))
}

/// Render the summary of a run: file table first, totals after
pub fn render_summary(summary: &RunSummary) -> String {
    let details = &summary.statistics.file_details;
    let files_title = if details.len() > FULL_LISTING_LIMIT {
        "📋  TOP 10 LARGEST FILES BY CHARACTER COUNT  📋"
    } else {
        "📋  EMBEDDED FILES"
    };

    format!(
        "{}\n{}\n\n{}\n{}",
        files_title,
        files_table(details),
        "✅  PROMPT COMPLETE",
        summary_table(summary)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with(files: usize) -> RunSummary {
        let mut statistics = ScanStatistics::default();
        for i in 0..files {
            statistics.file_details.insert(
                format!("src/file{:02}.py", i),
                FileReportInfo {
                    lines: i,
                    chars: i * 10,
                },
            );
        }
        statistics.files_embedded = files;
        RunSummary {
            output_file: Some("out/proj_20240101120000.md".to_string()),
            output_bytes: 2048,
            duration: Duration::from_millis(12),
            schema_included: false,
            statistics,
        }
    }

    #[test]
    fn small_runs_list_every_file() {
        let text = render_summary(&summary_with(3));
        assert!(text.contains("EMBEDDED FILES"));
        assert!(text.contains("src/file00.py"));
        assert!(text.contains("proj_20240101120000.md"));
        assert!(text.contains("2.00 KB"));
    }

    #[test]
    fn large_runs_keep_only_the_largest() {
        let text = render_summary(&summary_with(20));
        assert!(text.contains("TOP 10 LARGEST"));
        assert!(text.contains("src/file19.py"));
        assert!(!text.contains("src/file00.py"));
    }

    #[test]
    fn long_paths_keep_their_tail() {
        let long = format!("{}/main.py", "a".repeat(80));
        let short = shorten_path(&long, 20);
        assert_eq!(short.chars().count(), 20);
        assert!(short.ends_with("main.py"));
    }
}
