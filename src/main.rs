/*!
 * Command-line interface for dirprompt
 */

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use dirprompt::clipboard::copy_to_clipboard;
use dirprompt::config::{log_level, Args, ScanConfig};
use dirprompt::error::{Result, EXIT_FAILURE, EXIT_INTERRUPTED};
use dirprompt::report::{render_summary, RunSummary};
use dirprompt::schema::{test_connection, ConnectionTest};
use dirprompt::settings::{Settings, SettingsStore};
use dirprompt::types::{DatabaseDescriptor, ReportRequest};
use dirprompt::utils::count_files;
use dirprompt::walk::CancelToken;
use dirprompt::writer::{output_file_name, save_text};
use dirprompt::{error, PromptGenerator};

fn setup_logging(args: &Args) {
    env_logger::Builder::new()
        .filter_level(log_level(args.quiet, args.verbose))
        .format_timestamp(None)
        .init();
}

fn create_progress(args: &Args, root: &Path, config: &ScanConfig) -> Arc<ProgressBar> {
    if args.quiet {
        return Arc::new(ProgressBar::hidden());
    }

    let progress = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} {pos}/{len} ({percent}%) ⏱️  Elapsed: {elapsed_precise}",
    ) {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_prefix("📊 Setup");
    progress.set_message(format!("📂 Counting files in {}", root.display()));

    let total_files = count_files(root, config);
    progress.set_length(total_files);
    progress.set_prefix("📊 Processing");
    progress.set_message(format!("🔎 Found {} files to embed", total_files));

    Arc::new(progress)
}

/// Remember the folders of this run for the next one
fn remember_folders(store: Option<&SettingsStore>, args: &Args) {
    let Some(store) = store else { return };

    let mut patch = serde_json::Map::new();
    if let Some(source) = &args.source_root {
        patch.insert("ultima_carpeta_codigo".into(), json!(source.to_string_lossy()));
    }
    if let Some(dest) = &args.dest_folder {
        patch.insert("ultima_carpeta_guardar".into(), json!(dest.to_string_lossy()));
    }
    if let Some(sqlite) = &args.sqlite {
        patch.insert("sqlite_file".into(), json!(sqlite.to_string_lossy()));
        if let Some(parent) = sqlite.parent() {
            patch.insert("ultima_carpeta_sqlite".into(), json!(parent.to_string_lossy()));
        }
    }

    if let Err(e) = store.update(&serde_json::Value::Object(patch)) {
        log::warn!("Could not update settings: {}", e);
    }
}

async fn run_test_db(database: Option<DatabaseDescriptor>) -> Result<ExitCode> {
    let database = database
        .ok_or_else(|| error!(InvalidInput, "--test-db needs --sqlite or --mysql-host"))?;

    match test_connection(&database).await? {
        ConnectionTest::Structure(report) => {
            println!("{}", report);
            Ok(ExitCode::SUCCESS)
        }
        ConnectionTest::Unreadable(warning) => {
            eprintln!("[WARN] {}", warning);
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}

async fn run(args: Args, cancel: CancelToken) -> Result<ExitCode> {
    let settings_path = args.settings.clone().unwrap_or_else(Settings::default_path);
    let store = match SettingsStore::open(&settings_path) {
        Ok(store) => Some(store),
        Err(e) => {
            log::warn!("Settings unavailable, using defaults: {}", e);
            None
        }
    };

    let database = args.database()?;
    if args.test_db {
        return run_test_db(database).await;
    }

    let (Some(source), Some(dest)) = (args.source_root.clone(), args.dest_folder.clone()) else {
        return Err(error!(InvalidInput, "SOURCE_ROOT and DEST_FOLDER are required"));
    };
    if !source.is_dir() {
        return Err(error!(InvalidInput, "{} is not a folder", source.display()));
    }

    let base = store
        .as_ref()
        .map(SettingsStore::scan_config)
        .unwrap_or_default();
    let config = args.scan_config(base);
    let progress = create_progress(&args, &source, &config);
    let generator = PromptGenerator::new(config)
        .with_progress(Arc::clone(&progress))
        .with_cancel(cancel);

    let start_time = Instant::now();
    let fields = args.fields();

    let summary = if args.batch {
        let outcome = generator
            .generate_batch(&source, &args.prefix, &fields, database.as_ref(), &dest)
            .await;
        progress.finish_and_clear();
        let outcome = outcome?;

        for path in &outcome.saved {
            println!("[OK] {}", path.display());
        }
        for failure in &outcome.errors {
            eprintln!("[ERROR] {}", failure);
        }
        if outcome.saved.is_empty() && outcome.errors.is_empty() {
            eprintln!(
                "[WARN] no folders starting with '{}' in {}",
                args.prefix,
                source.display()
            );
        }

        RunSummary {
            output_file: Some(dest.display().to_string()),
            output_bytes: 0,
            duration: start_time.elapsed(),
            schema_included: false,
            statistics: outcome.statistics,
        }
    } else {
        let request = ReportRequest {
            fields,
            root: Some(source.clone()),
            database,
        };
        let prompt = generator.generate(&request).await;
        progress.finish_and_clear();
        let prompt = prompt?;

        let file_name = output_file_name(Some(&source), args.output_extension(), Local::now());
        let path = save_text(&dest, &file_name, &prompt.text)?;
        println!("[OK] {}", path.display());

        if args.clip {
            match copy_to_clipboard(&prompt.text) {
                Ok(()) => log::info!("Copied the report to the clipboard"),
                Err(e) => eprintln!("[WARN] {}", e),
            }
        }

        RunSummary {
            output_file: Some(path.display().to_string()),
            output_bytes: prompt.text.len() as u64,
            duration: start_time.elapsed(),
            schema_included: prompt.schema_included,
            statistics: prompt.statistics,
        }
    };

    remember_folders(store.as_ref(), &args);

    if !args.quiet {
        println!("{}", render_summary(&summary));
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(shell) = args.generate {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    setup_logging(&args);

    let cancel = CancelToken::new();
    tokio::select! {
        result = run(args, cancel.clone()) => match result {
            Ok(code) => code,
            Err(e) => {
                log::debug!("{:?}", e);
                eprintln!("[ERROR] {}", e);
                ExitCode::from(e.exit_code())
            }
        },
        Ok(()) = tokio::signal::ctrl_c() => {
            cancel.cancel();
            eprintln!("[INTERRUPT] cancelled by user");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}
