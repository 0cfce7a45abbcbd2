//! Request handlers

use std::path::{Component, Path, PathBuf};

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OwnedSemaphorePermit;

use super::{ApiError, SharedState, PROMPTS_DIR, REPORTS_DIR};
use crate::config::DEFAULT_PROJECT_PREFIX;
use crate::prompt::PromptGenerator;
use crate::scanner::list_dir as read_listing;
use crate::schema::{test_connection, ConnectionTest};
use crate::settings::Settings;
use crate::types::{
    DatabaseDescriptor, DatabaseKind, DirListing, NetworkCredentials, PromptFields, ReportRequest,
};
use crate::walk::CancelToken;
use crate::writer::{output_file_name, save_text};

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Database part of a request body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseRequest {
    #[serde(alias = "db_mode")]
    pub mode: DatabaseKind,
    pub sqlite_path: String,
    pub mysql: NetworkCredentials,
}

impl DatabaseRequest {
    fn descriptor(&self) -> DatabaseDescriptor {
        match self.mode {
            DatabaseKind::Sqlite => DatabaseDescriptor::Embedded {
                path: PathBuf::from(self.sqlite_path.trim()),
            },
            DatabaseKind::Mysql => DatabaseDescriptor::Networked(self.mysql.clone()),
        }
    }
}

/// Body of `/api/generate` and `/api/save_prompts`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub fields: PromptFields,
    #[serde(alias = "carpeta_proyecto")]
    pub project_folder: String,
    #[serde(flatten)]
    pub database: DatabaseRequest,
}

impl GenerateRequest {
    fn folder(&self) -> Option<PathBuf> {
        let folder = self.project_folder.trim();
        (!folder.is_empty()).then(|| PathBuf::from(folder))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListDirQuery {
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveReportRequest {
    pub markdown: String,
    #[serde(alias = "carpeta_proyecto")]
    pub project_folder: String,
}

pub async fn get_config(State(state): State<SharedState>) -> Json<Settings> {
    Json(state.settings.snapshot())
}

pub async fn update_config(
    State(state): State<SharedState>,
    Json(patch): Json<Value>,
) -> ApiResult<Json<Settings>> {
    if !patch.is_object() {
        return Err(ApiError::bad_request("expected a JSON object"));
    }
    Ok(Json(state.settings.update(&patch)?))
}

pub async fn list_dir(
    State(state): State<SharedState>,
    Query(query): Query<ListDirQuery>,
) -> Json<Value> {
    let path = match query.path.trim() {
        "" => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        raw => PathBuf::from(raw),
    };
    let config = state.settings.scan_config();

    let listing = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || read_listing(&path)).await
    };
    let path_str = path.to_string_lossy().into_owned();

    match listing {
        Ok(DirListing::Entries(entries)) => {
            let dirs: Vec<Value> = entries
                .into_iter()
                .filter(|e| e.is_dir() && !config.is_excluded(&e.name))
                .map(|e| json!({ "name": e.name, "path": e.path.to_string_lossy() }))
                .collect();
            Json(json!({ "ok": true, "path": path_str, "dirs": dirs }))
        }
        Ok(DirListing::Unreadable(e)) => {
            Json(json!({ "ok": false, "error": e.to_string(), "path": path_str }))
        }
        Err(e) => Json(json!({ "ok": false, "error": e.to_string(), "path": path_str })),
    }
}

pub async fn test_db(Json(request): Json<DatabaseRequest>) -> ApiResult<Json<Value>> {
    match test_connection(&request.descriptor()).await? {
        ConnectionTest::Structure(report) => Ok(Json(json!({ "ok": true, "report": report }))),
        ConnectionTest::Unreadable(warning) => Err(ApiError::bad_request(warning)),
    }
}

fn walk_permit(state: &SharedState, root: &Path) -> ApiResult<OwnedSemaphorePermit> {
    state.walks.try_acquire(root).ok_or_else(|| {
        log::warn!("Too many walks over {}", root.display());
        ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            format!("{} is already being scanned, try again later", root.display()),
        )
    })
}

fn generator(state: &SharedState) -> PromptGenerator {
    PromptGenerator::new(state.settings.scan_config())
        .with_cancel(CancelToken::with_timeout(state.walk_timeout))
}

pub async fn generate(
    State(state): State<SharedState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<Value>> {
    let root = request.folder();
    let _permit = match root.as_deref().filter(|r| r.is_dir()) {
        Some(root) => Some(walk_permit(&state, root)?),
        None => None,
    };

    let report = ReportRequest {
        fields: request.fields.trimmed(),
        root,
        database: Some(request.database.descriptor()),
    };
    let prompt = generator(&state).generate(&report).await?;
    log::info!(
        "Generated {} bytes from {} files",
        prompt.text.len(),
        prompt.statistics.files_embedded
    );

    Ok(Json(json!({ "ok": true, "markdown": prompt.text })))
}

pub async fn save_report(
    State(state): State<SharedState>,
    Json(request): Json<SaveReportRequest>,
) -> ApiResult<Json<Value>> {
    let folder = PathBuf::from(request.project_folder.trim());
    let root = (!request.project_folder.trim().is_empty()).then_some(folder.as_path());
    let file_name = output_file_name(root, "txt", Local::now());

    let dir = state.reports_dir();
    let path = {
        let file_name = file_name.clone();
        tokio::task::spawn_blocking(move || save_text(&dir, &file_name, &request.markdown))
            .await
            .map_err(crate::error::PromptError::from)??
    };

    Ok(Json(json!({
        "ok": true,
        "path": path.to_string_lossy(),
        "filename": file_name,
    })))
}

pub async fn save_prompts(
    State(state): State<SharedState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<Value>> {
    let container = request
        .folder()
        .filter(|c| c.is_dir())
        .ok_or_else(|| ApiError::bad_request("select the folder containing the projects"))?;
    let _permit = walk_permit(&state, &container)?;

    let outcome = generator(&state)
        .generate_batch(
            &container,
            DEFAULT_PROJECT_PREFIX,
            &request.fields.trimmed(),
            Some(&request.database.descriptor()),
            &state.prompts_dir(),
        )
        .await?;

    Ok(Json(json!({
        "ok": true,
        "guardados": outcome.saved.len(),
        "errores": outcome.errors,
    })))
}

/// Resolve `reports/<file>` or `prompts/<file>` under the output root.
///
/// Only plain names are accepted below the first segment.
fn download_target(output_root: &Path, requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested);
    let mut components = requested.components();
    let folder = match components.next()? {
        Component::Normal(name) if name == REPORTS_DIR || name == PROMPTS_DIR => name,
        _ => return None,
    };

    let mut path = output_root.join(folder);
    let mut has_file = false;
    for component in components {
        match component {
            Component::Normal(name) => {
                path.push(name);
                has_file = true;
            }
            _ => return None,
        }
    }
    has_file.then_some(path)
}

pub async fn download(
    State(state): State<SharedState>,
    UrlPath(requested): UrlPath<String>,
) -> Response {
    let Some(path) = download_target(&state.output_root, &requested) else {
        log::info!("Refused download of {}", requested);
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().replace('"', ""))
                .unwrap_or_default();
            (
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", file_name),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            log::debug!("Download of {} failed: {}", path.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_accepts_only_output_folders() {
        let root = Path::new("/srv/out");
        assert_eq!(
            download_target(root, "reports/proj_20240101000000.txt"),
            Some(root.join("reports").join("proj_20240101000000.txt"))
        );
        assert!(download_target(root, "prompts/jocarsa-a.txt").is_some());
        assert_eq!(download_target(root, "reports"), None);
        assert_eq!(download_target(root, "secrets/key.txt"), None);
        assert_eq!(download_target(root, "reports/../config.json"), None);
        assert_eq!(download_target(root, "/etc/passwd"), None);
    }

    #[test]
    fn request_body_accepts_flat_fields() {
        let body = json!({
            "context": "ctx",
            "objective": "obj",
            "project_folder": " /tmp/proj ",
            "mode": "mysql",
            "mysql": { "server": "db", "user": "u", "password": "p", "database": "d" }
        });
        let request: GenerateRequest = serde_json::from_value(body).unwrap();

        assert_eq!(request.fields.context, "ctx");
        assert_eq!(request.folder(), Some(PathBuf::from("/tmp/proj")));
        match request.database.descriptor() {
            DatabaseDescriptor::Networked(credentials) => {
                assert_eq!(credentials.host, "db");
                assert!(credentials.is_complete());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn request_body_accepts_form_keys() {
        let body = json!({
            "contexto": "ctx",
            "objetivo": "obj",
            "restricciones": "none",
            "formato": "md",
            "carpeta_proyecto": "/tmp/proj",
            "db_mode": "mysql",
            "sqlite_path": "",
            "mysql": { "server": "db", "user": "u", "password": "p", "database": "d" }
        });
        let request: GenerateRequest = serde_json::from_value(body).unwrap();

        assert_eq!(
            request.fields,
            PromptFields {
                context: "ctx".to_string(),
                objective: "obj".to_string(),
                constraints: "none".to_string(),
                output_format: "md".to_string(),
            }
        );
        assert_eq!(request.folder(), Some(PathBuf::from("/tmp/proj")));
        assert_eq!(request.database.descriptor().kind(), DatabaseKind::Mysql);

        let save: SaveReportRequest =
            serde_json::from_value(json!({ "markdown": "x", "carpeta_proyecto": "/tmp/proj" }))
                .unwrap();
        assert_eq!(save.project_folder, "/tmp/proj");
    }

    #[test]
    fn empty_body_means_no_folder_and_sqlite() {
        let request: GenerateRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.folder(), None);
        assert_eq!(request.database.descriptor().kind(), DatabaseKind::Sqlite);
    }
}
