/*!
 * dirprompt - Generate a Markdown prompt from a project folder for LLM context
 *
 * This library renders a directory map, the contents of every source file
 * and optionally a database schema into a single Markdown document.
 */

pub mod clipboard;
pub mod config;
pub mod error;
pub mod prompt;
pub mod report;
pub mod scanner;
pub mod schema;
pub mod server;
pub mod settings;
pub mod types;
pub mod utils;
pub mod walk;
pub mod writer;


// Re-export main components for easier access
pub use config::ScanConfig;
pub use error::{PromptError, Result};
pub use prompt::{assemble, GeneratedPrompt, PromptGenerator};
pub use report::{render_summary, FileReportInfo, RunSummary};
pub use scanner::{ScanStatistics, Scanner};
pub use settings::{Settings, SettingsStore};
pub use types::{DatabaseDescriptor, DatabaseKind, NetworkCredentials, PromptFields, ReportRequest};
pub use utils::{count_files, format_file_size};
pub use walk::CancelToken;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
