/*!
 * JSON API over the prompt generator
 *
 * Thin adapter: requests are decoded, handed to [`PromptGenerator`] with a
 * snapshot of the settings, and the result is encoded back. Every request
 * works on its own copy of the filters, so a concurrent settings update
 * never changes a walk halfway.
 *
 * [`PromptGenerator`]: crate::prompt::PromptGenerator
 */

mod handlers;
mod limits;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use crate::error::PromptError;
use crate::settings::SettingsStore;

pub use limits::WalkLimiter;

/// Folder under the output root for single reports
pub const REPORTS_DIR: &str = "reports";
/// Folder under the output root for bulk prompts
pub const PROMPTS_DIR: &str = "prompts";

/// State shared by all handlers
#[derive(Debug)]
pub struct AppState {
    pub settings: SettingsStore,
    pub walks: WalkLimiter,
    pub walk_timeout: Duration,
    pub output_root: PathBuf,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        settings: SettingsStore,
        output_root: PathBuf,
        walk_timeout: Duration,
        max_walks_per_root: usize,
    ) -> Self {
        Self {
            settings,
            walks: WalkLimiter::new(max_walks_per_root),
            walk_timeout,
            output_root,
        }
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.output_root.join(REPORTS_DIR)
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.output_root.join(PROMPTS_DIR)
    }
}

/// Error body `{ "ok": false, "error": ... }` with a matching status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PromptError> for ApiError {
    fn from(err: PromptError) -> Self {
        let status = match &err {
            PromptError::InvalidInput(_) | PromptError::Json(_) | PromptError::Settings(_) => {
                StatusCode::BAD_REQUEST
            }
            PromptError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
            PromptError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            PromptError::Write { .. }
            | PromptError::CreateDir { .. }
            | PromptError::Io(_)
            | PromptError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("{}", err);
        } else {
            log::info!("Rejected request: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "ok": false, "error": self.message })),
        )
            .into_response()
    }
}

/// All API routes
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/api/config",
            get(handlers::get_config).post(handlers::update_config),
        )
        .route("/api/list_dir", get(handlers::list_dir))
        .route("/api/test_db", post(handlers::test_db))
        .route("/api/generate", post(handlers::generate))
        .route("/api/save_report", post(handlers::save_report))
        .route("/api/save_prompts", post(handlers::save_prompts))
        .route("/download/*path", get(handlers::download))
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: SharedState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
