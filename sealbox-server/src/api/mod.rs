//! HTTP surface of the item registry.

mod handlers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use sealbox_core::registry::ErrorBody;
use sealbox_core::{ItemRegistry, SealError};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub registry: Arc<dyn ItemRegistry>,
}

/// Registry failure rendered as `{ "message": ... }` with a matching status.
#[derive(Debug)]
pub struct ApiError(SealError);

impl From<SealError> for ApiError {
    fn from(err: SealError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SealError::Validation(_) | SealError::InvalidSchedule { .. } => {
                StatusCode::BAD_REQUEST
            }
            SealError::NotFound(_) => StatusCode::NOT_FOUND,
            SealError::LedgerIdConflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_client_error() {
            tracing::debug!("Rejected request: {}", self.0);
        } else {
            tracing::error!("Request failed: {}", self.0);
        }

        let body = Json(ErrorBody {
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn router(registry: Arc<dyn ItemRegistry>) -> Router {
    let state = Arc::new(AppState { registry });

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/:items",
            post(handlers::create_item).get(handlers::list_items),
        )
        .route("/api/:items/:id", get(handlers::get_item))
        .route(
            "/api/:items/:id/contract-id",
            patch(handlers::attach_ledger_id),
        )
        .route("/api/:items/:id/sync", post(handlers::sync_tally))
        .with_state(state)
}

pub struct ApiServer {
    registry: Arc<dyn ItemRegistry>,
    addr: SocketAddr,
}

impl ApiServer {
    pub fn new(registry: Arc<dyn ItemRegistry>, addr: SocketAddr) -> Self {
        Self { registry, addr }
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let app = router(self.registry).layer(TraceLayer::new_for_http());

        info!("Starting registry API on {}", self.addr);
        axum::Server::bind(&self.addr)
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use sealbox_core::{ManualClock, SqliteRegistry, Storage};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    async fn app() -> (Router, Arc<ManualClock>) {
        let storage = Arc::new(Storage::open_in_memory().await.unwrap());
        let clock = Arc::new(ManualClock::new(t0()));
        let registry = Arc::new(SqliteRegistry::new(storage, clock.clone()));
        (router(registry), clock)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn poll_body(commit_in: Duration, reveal_in: Duration) -> Value {
        json!({
            "title": "Lunch spot",
            "description": "Where do we eat on Friday?",
            "creatorAddress": "0xcreator",
            "commitDeadline": t0() + commit_in,
            "revealDeadline": t0() + reveal_in,
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_get_and_list() {
        let (app, _) = app().await;
        let body = poll_body(Duration::hours(1), Duration::hours(2));

        let (status, created) = send(&app, Method::POST, "/api/polls", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["contractItemId"], Value::Null);
        let id = created["id"].as_i64().unwrap();

        let (status, fetched) = send(&app, Method::GET, &format!("/api/polls/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Lunch spot");

        let (status, listed) = send(&app, Method::GET, "/api/polls", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        // polls and auctions are separate collections
        let (status, _) = send(&app, Method::GET, &format!("/api/auctions/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (app, _) = app().await;

        let backwards = poll_body(Duration::hours(2), Duration::hours(1));
        let (status, body) = send(&app, Method::POST, "/api/polls", Some(backwards)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("Invalid schedule"));

        let (status, _) = send(&app, Method::POST, "/api/polls", Some(json!({"title": 3}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/ballots", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_unknown_item() {
        let (app, _) = app().await;
        let (status, body) = send(&app, Method::GET, "/api/auctions/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_attach_ledger_id() {
        let (app, _) = app().await;
        let body = poll_body(Duration::hours(1), Duration::hours(2));
        let (_, created) = send(&app, Method::POST, "/api/polls", Some(body)).await;
        let uri = format!("/api/polls/{}/contract-id", created["id"]);

        let attach = json!({"contractItemId": 7, "transactionHash": "0xabc"});
        let (status, item) = send(&app, Method::PATCH, &uri, Some(attach.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["status"], "active");
        assert_eq!(item["contractItemId"], 7);

        let (status, _) = send(&app, Method::PATCH, &uri, Some(attach)).await;
        assert_eq!(status, StatusCode::OK);

        let other = json!({"contractItemId": 8, "transactionHash": "0xdef"});
        let (status, _) = send(&app, Method::PATCH, &uri, Some(other)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let missing = json!({"contractItemId": 1, "transactionHash": "0x1"});
        let (status, _) = send(&app, Method::PATCH, "/api/polls/999/contract-id", Some(missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sync_tally() {
        let (app, clock) = app().await;
        let body = poll_body(Duration::hours(1), Duration::hours(2));
        let (_, created) = send(&app, Method::POST, "/api/polls", Some(body)).await;
        let id = created["id"].as_i64().unwrap();
        let sync_uri = format!("/api/polls/{}/sync", id);
        let counts = json!({"counts": {"0": 1, "1": 2}});

        // not on the ledger yet
        let (status, _) = send(&app, Method::POST, &sync_uri, Some(counts.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let attach = json!({"contractItemId": 1, "transactionHash": "0xabc"});
        send(&app, Method::PATCH, &format!("/api/polls/{}/contract-id", id), Some(attach)).await;

        clock.set(t0() + Duration::minutes(90));
        let (status, item) = send(&app, Method::POST, &sync_uri, Some(counts)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["tally"]["1"], 2);

        // stale counts never lower the cache
        let stale = json!({"counts": {"1": 1}});
        let (_, item) = send(&app, Method::POST, &sync_uri, Some(stale)).await;
        assert_eq!(item["tally"]["1"], 2);
    }
}
