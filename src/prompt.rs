/*!
 * Prompt assembly
 *
 * Concatenates, in a fixed order: the non-empty free-text fields, the
 * directory map, the interleaved report and the schema report.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::scanner::{ScanStatistics, Scanner};
use crate::schema::optional_schema_report;
use crate::types::{DatabaseDescriptor, PromptFields, ReportRequest};
use crate::walk::CancelToken;
use crate::writer::{write_batch, BatchOutcome};

const STRUCTURE_BANNER: &str = "\n===== Estructura del proyecto =====\n";
const CODE_BANNER: &str = "\n===== Reporte de código (Intercalado) =====\n";
const DATABASE_BANNER: &str = "\n===== Informe de base de datos =====\n";
const NO_PROJECT_NOTE: &str =
    "\n(No se ha seleccionado carpeta de proyecto para analizar código)\n\n";

/// The two renderings of a project folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSections {
    /// Directory map
    pub tree: String,
    /// Interleaved report
    pub interleaved: String,
}

/// Join the prompt parts in their fixed order.
///
/// Blank fields are left out. Without a project the two project sections
/// are replaced by a short note; without a schema there is no database
/// section at all.
pub fn assemble(
    fields: &PromptFields,
    project: Option<&ProjectSections>,
    schema: Option<&str>,
) -> String {
    let mut prompt = String::new();

    let labelled = [
        ("Contexto", &fields.context),
        ("Objetivo", &fields.objective),
        ("Restricciones", &fields.constraints),
        ("Formato de salida", &fields.output_format),
    ];
    for (label, value) in labelled {
        let value = value.trim();
        if !value.is_empty() {
            prompt.push_str(&format!("{}: {}\n\n", label, value));
        }
    }

    match project {
        Some(sections) => {
            prompt.push_str(STRUCTURE_BANNER);
            prompt.push_str(&format!("```\n{}\n```\n\n", sections.tree));
            prompt.push_str(CODE_BANNER);
            prompt.push_str(&sections.interleaved);
            prompt.push_str("\n\n");
        }
        None => prompt.push_str(NO_PROJECT_NOTE),
    }

    if let Some(schema) = schema.filter(|s| !s.is_empty()) {
        prompt.push_str(DATABASE_BANNER);
        prompt.push_str(schema);
    }

    prompt
}

/// A rendered prompt and what went into it
#[derive(Debug, Clone)]
pub struct GeneratedPrompt {
    pub text: String,
    pub statistics: ScanStatistics,
    pub schema_included: bool,
}

/// Runs the directory map, the interleaved report and the schema report
/// for a request, and assembles the result.
///
/// Holds its own copy of the scan filters; it does not know which front-end
/// is driving it.
#[derive(Debug, Clone)]
pub struct PromptGenerator {
    config: ScanConfig,
    progress: Arc<ProgressBar>,
    cancel: CancelToken,
}

impl PromptGenerator {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            progress: Arc::new(ProgressBar::hidden()),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn scanner(&self) -> Scanner {
        Scanner::new(self.config.clone(), Arc::clone(&self.progress)).with_cancel(self.cancel.clone())
    }

    /// Directory map and interleaved report of `root`
    pub fn render_project(&self, root: &Path) -> Result<(ProjectSections, ScanStatistics)> {
        let scanner = self.scanner();
        let tree = scanner.directory_map(root)?;
        let interleaved = scanner.interleaved_report(root, 1)?;
        Ok((ProjectSections { tree, interleaved }, scanner.get_statistics()))
    }

    /// Render a prompt with an already-fetched schema.
    ///
    /// A root that is not a folder is treated as "no project selected".
    pub fn render(
        &self,
        fields: &PromptFields,
        root: Option<&Path>,
        schema: Option<&str>,
    ) -> Result<GeneratedPrompt> {
        let (project, statistics) = match root.filter(|r| r.is_dir()) {
            Some(root) => {
                log::info!("Scanning {}", root.display());
                let (sections, statistics) = self.render_project(root)?;
                (Some(sections), statistics)
            }
            None => {
                if let Some(root) = root {
                    log::warn!("{} is not a folder, skipping project sections", root.display());
                }
                (None, ScanStatistics::default())
            }
        };

        Ok(GeneratedPrompt {
            text: assemble(fields, project.as_ref(), schema),
            statistics,
            schema_included: schema.is_some_and(|s| !s.is_empty()),
        })
    }

    /// Render the prompt for `request`; the folder walk runs on the blocking pool
    pub async fn generate(&self, request: &ReportRequest) -> Result<GeneratedPrompt> {
        let schema = optional_schema_report(request.database.as_ref()).await;

        let generator = self.clone();
        let fields = request.fields.clone();
        let root = request.root.clone();
        tokio::task::spawn_blocking(move || {
            generator.render(&fields, root.as_deref(), schema.as_deref())
        })
        .await?
    }

    /// Write one prompt per project folder of `container` whose name starts
    /// with `prefix` into `out_dir`. The schema is read once for all of them.
    pub async fn generate_batch(
        &self,
        container: &Path,
        prefix: &str,
        fields: &PromptFields,
        database: Option<&DatabaseDescriptor>,
        out_dir: &Path,
    ) -> Result<BatchOutcome> {
        let schema = optional_schema_report(database).await;

        let generator = self.clone();
        let container: PathBuf = container.to_path_buf();
        let prefix = prefix.to_string();
        let fields = fields.clone();
        let out_dir = out_dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            write_batch(
                &generator,
                &container,
                &prefix,
                &fields,
                schema.as_deref(),
                &out_dir,
            )
        })
        .await?
    }
}
