use super::{ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sealbox_core::registry::{AttachLedgerIdRequest, CreateItemRequest, SyncTallyRequest};
use sealbox_core::{ItemKind, SealError};
use serde_json::json;
use std::sync::Arc;

fn collection(segment: &str) -> ApiResult<ItemKind> {
    [ItemKind::Poll, ItemKind::Auction]
        .into_iter()
        .find(|kind| kind.path_segment() == segment)
        .ok_or_else(|| SealError::not_found(format!("Collection '{}'", segment)).into())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| SealError::validation(rejection.body_text()).into())
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Path(items): Path<String>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let kind = collection(&items)?;
    let request = body(payload)?;

    let item = state.registry.create(request.into_new_item(kind)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Path(items): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let kind = collection(&items)?;
    Ok(Json(state.registry.list(kind).await?))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path((items, id)): Path<(String, i64)>,
) -> ApiResult<impl IntoResponse> {
    let kind = collection(&items)?;
    Ok(Json(state.registry.get(kind, id).await?))
}

pub async fn attach_ledger_id(
    State(state): State<Arc<AppState>>,
    Path((items, id)): Path<(String, i64)>,
    payload: Result<Json<AttachLedgerIdRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let kind = collection(&items)?;
    let request = body(payload)?;

    let item = state
        .registry
        .attach_ledger_id(kind, id, request.contract_item_id, &request.transaction_hash)
        .await?;
    Ok(Json(item))
}

pub async fn sync_tally(
    State(state): State<Arc<AppState>>,
    Path((items, id)): Path<(String, i64)>,
    payload: Result<Json<SyncTallyRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let kind = collection(&items)?;
    let request = body(payload)?;

    let item = state.registry.sync_tally(kind, id, request.counts).await?;
    Ok(Json(item))
}
