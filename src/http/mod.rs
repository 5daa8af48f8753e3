// pgsentinel/src/http/mod.rs
//! JSON API in front of the service: health, history, bucket listing and
//! the backup/restore triggers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::AppError;
use crate::logstore::BackupRecord;
use crate::service::Sentinel;
use crate::utils::format_megabytes;

const DEFAULT_LOG_LIMIT: i64 = 50;

pub fn router(service: Arc<Sentinel>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/logs", get(recent_logs))
        .route("/api/backups", get(list_backups))
        .route("/trigger-backup", post(trigger_backup))
        .route("/api/restore", post(restore))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub async fn serve(service: Arc<Sentinel>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

struct ApiError(AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::Configuration { .. } | AppError::InvalidSetting { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct LogEntry {
    #[serde(flatten)]
    record: BackupRecord,
    size: String,
}

async fn recent_logs(
    State(service): State<Arc<Sentinel>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, 500);
    let records = service.list_recent_logs(limit).await?;
    Ok(Json(
        records
            .into_iter()
            .map(|record| LogEntry {
                size: format_megabytes(record.size_bytes),
                record,
            })
            .collect(),
    ))
}

async fn list_backups(
    State(service): State<Arc<Sentinel>>,
) -> Result<Json<Vec<crate::storage::BackupObject>>, ApiError> {
    Ok(Json(service.list_backups().await?))
}

async fn trigger_backup(State(service): State<Arc<Sentinel>>) -> (StatusCode, Json<serde_json::Value>) {
    tokio::spawn(async move {
        let outcome = service.perform_backup().await;
        info!("Manual backup finished: {}", outcome.message);
    });
    (
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Backup triggered in background" })),
    )
}

#[derive(Debug, Deserialize)]
struct RestoreRequest {
    filename: String,
}

async fn restore(
    State(service): State<Arc<Sentinel>>,
    Json(request): Json<RestoreRequest>,
) -> Response {
    let outcome = service.perform_restore(&request.filename).await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(outcome)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::{R2_BUCKET_NAME, TEST_DATABASE_URL};
    use crate::testing::{FakeStore, FakeTools, MemoryLog, object, restore_settings};

    fn app(settings: crate::config::Settings, store: FakeStore, log: MemoryLog) -> Router {
        router(Arc::new(Sentinel::new(
            Arc::new(settings),
            Arc::new(FakeTools::dumping(2_097_152)),
            Arc::new(store),
            Arc::new(log),
        )))
    }

    async fn body_json(response: Response) -> anyhow::Result<serde_json::Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn test_health() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let response = app(restore_settings(dir.path()), FakeStore::default(), MemoryLog::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await?, json!({ "status": "ok" }));
        Ok(())
    }

    #[tokio::test]
    async fn test_backups_listing_is_newest_first() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FakeStore::with_objects(vec![
            object("backup_old.sql", 1, 100),
            object("backup_new.sql", 2, 300),
        ]);
        let response = app(restore_settings(dir.path()), store, MemoryLog::default())
            .oneshot(Request::builder().uri("/api/backups").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body[0]["filename"], "backup_new.sql");
        assert_eq!(body[1]["filename"], "backup_old.sql");
        Ok(())
    }

    #[tokio::test]
    async fn test_backups_listing_without_storage_settings() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = restore_settings(dir.path()).without(&[R2_BUCKET_NAME]);
        let response = app(settings, FakeStore::default(), MemoryLog::default())
            .oneshot(Request::builder().uri("/api/backups").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await?;
        assert!(body["error"].as_str().unwrap_or_default().contains(R2_BUCKET_NAME));
        Ok(())
    }

    #[tokio::test]
    async fn test_logs_include_display_size() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = MemoryLog::default();
        let service = Arc::new(Sentinel::new(
            Arc::new(restore_settings(dir.path())),
            Arc::new(FakeTools::dumping(2_097_152)),
            Arc::new(FakeStore::default()),
            Arc::new(log.clone()),
        ));
        assert!(service.perform_backup().await.success);

        let response = router(service)
            .oneshot(Request::builder().uri("/api/logs?limit=10").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body[0]["status"], "SUCCESS");
        assert_eq!(body[0]["size"], "2.0 MB");
        assert_eq!(body[0]["size_bytes"], 2_097_152);
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_refuses_production_target() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = restore_settings(dir.path())
            .with(TEST_DATABASE_URL, "postgres://app:pw@prod:5432/app");
        let store = FakeStore::default();
        let response = app(settings, store.clone(), MemoryLog::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/restore")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"filename":"backup_a.sql"}"#))?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await?;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], AppError::Safety.to_string());
        assert_eq!(store.connects(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_trigger_backup_is_accepted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let response = app(restore_settings(dir.path()), FakeStore::default(), MemoryLog::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/trigger-backup")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await?;
        assert_eq!(body["message"], "Backup triggered in background");
        Ok(())
    }
}
