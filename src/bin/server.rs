use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use dirprompt::config::{log_level, ServerArgs};
use dirprompt::server::{self, AppState};
use dirprompt::settings::{Settings, SettingsStore};

fn setup_logging(args: &ServerArgs) {
    // A server logs its requests by default
    let level = match log_level(args.quiet, args.verbose) {
        log::LevelFilter::Off => log::LevelFilter::Off,
        level => level.max(log::LevelFilter::Info),
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_secs()
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

async fn run(args: ServerArgs) -> dirprompt::Result<()> {
    let settings_path = args.settings.clone().unwrap_or_else(Settings::default_path);
    let settings = SettingsStore::open(&settings_path)?;
    log::info!("Settings: {}", settings_path.display());

    let state = Arc::new(AppState::new(
        settings,
        args.output_root.clone(),
        Duration::from_secs(args.walk_timeout),
        args.max_walks_per_root,
    ));

    let listener = TcpListener::bind(args.bind).await?;
    server::serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = ServerArgs::parse();
    setup_logging(&args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("[ERROR] {}", e);
            ExitCode::from(2)
        }
    }
}
