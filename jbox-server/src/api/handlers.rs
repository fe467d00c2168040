//! HTTP request handlers
//!
//! Every queue mutation follows the same path: resolve the caller, check the
//! quota (if the action has one), mutate the queue, record the quota event,
//! then broadcast the new state.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use jbox_common::{OperationKind, QuotaRule};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::identity::Caller;
use crate::api::server::AppContext;
use crate::error::{Error, Result};
use crate::events::{JukeboxEvent, PlayDirection};
use crate::queue::engine::DEFAULT_PROMOTE_HISTORY_PAGE;
use crate::queue::{
    EnqueueRequest, PromoteOutcome, PromoteRecord, QueueEngine, QueueItem, QueueSnapshot, TrackInfo,
};
use crate::quota::QuotaStatus;
use crate::users::UserRecord;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Envelope for every JSON response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    fn ok_with_message(data: Option<T>, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.into()),
        })
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    ip: String,
    username: Option<String>,
    has_username: bool,
    is_host: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetUsernameRequest {
    username: String,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    users: Vec<UserRecord>,
    total: usize,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    from_index: usize,
    to_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    queue_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PromoteHistoryResponse {
    records: Vec<PromoteRecord>,
    total: usize,
}

#[derive(Debug, Serialize)]
pub struct AdminCheckResponse {
    is_host: bool,
    server_ip: String,
    client_ip: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuotaRequest {
    operation: String,
    window_secs: Option<i64>,
    max_operations: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QuotaRuleResponse {
    operation: OperationKind,
    rule: QuotaRule,
}

// ============================================================================
// Helpers
// ============================================================================

/// Run a queue mutation under a quota
///
/// The quota write lock is held from check to record, so concurrent requests
/// from one actor cannot both take the last slot. `op` returns the value plus
/// whether the action consumed quota.
async fn with_quota<T>(
    ctx: &AppContext,
    caller: &Caller,
    kind: OperationKind,
    payload: Option<String>,
    op: impl FnOnce(&mut QueueEngine) -> Result<(T, bool)>,
) -> Result<T> {
    let mut quota = ctx.state.quota.write().await;
    quota.check(&caller.ip, kind, caller.is_host)?;

    let (value, consumed) = {
        let mut queue = ctx.state.queue.write().await;
        op(&mut queue)?
    };

    if consumed {
        quota.record(&caller.ip, kind, payload)?;
    }
    Ok(value)
}

/// Display name for audit fields; falls back to the IP
async fn display_name(ctx: &AppContext, caller: &Caller) -> String {
    ctx.state
        .users
        .read()
        .await
        .username(&caller.ip)
        .map(str::to_string)
        .unwrap_or_else(|| caller.ip.clone())
}

fn positive_u64(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok()).filter(|v| *v > 0)
}

fn positive_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok()).filter(|v| *v > 0)
}

// ============================================================================
// Health
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "jbox-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
    })
}

// ============================================================================
// Users
// ============================================================================

/// GET /api/user/info
pub async fn user_info(State(ctx): State<AppContext>, caller: Caller) -> ApiResult<UserInfo> {
    let username = ctx.state.users.read().await.username(&caller.ip).map(str::to_string);
    Ok(ApiResponse::ok(UserInfo {
        has_username: username.is_some(),
        username,
        ip: caller.ip,
        is_host: caller.is_host,
    }))
}

/// POST /api/user/setname
pub async fn set_username(
    State(ctx): State<AppContext>,
    caller: Caller,
    Json(req): Json<SetUsernameRequest>,
) -> ApiResult<UserRecord> {
    let record = ctx.state.users.write().await.set_username(&caller.ip, &req.username)?;
    Ok(ApiResponse::ok(record))
}

/// GET /api/user/quota - caller's standing for every operation kind
pub async fn user_quota(
    State(ctx): State<AppContext>,
    caller: Caller,
) -> ApiResult<BTreeMap<OperationKind, QuotaStatus>> {
    let status = ctx.state.quota.read().await.status_all(&caller.ip, caller.is_host);
    Ok(ApiResponse::ok(status))
}

/// GET /api/user/all - host only
pub async fn all_users(State(ctx): State<AppContext>, caller: Caller) -> ApiResult<UserListResponse> {
    caller.require_host()?;
    let users = ctx.state.users.read().await.all();
    Ok(ApiResponse::ok(UserListResponse {
        total: users.len(),
        users,
    }))
}

// ============================================================================
// Queue
// ============================================================================

/// GET /api/queue
pub async fn get_queue(State(ctx): State<AppContext>) -> ApiResult<QueueSnapshot> {
    Ok(ApiResponse::ok(ctx.state.queue_snapshot().await))
}

/// GET /api/queue/history - played songs, oldest first
pub async fn get_history(State(ctx): State<AppContext>) -> ApiResult<Vec<QueueItem>> {
    let history: Vec<QueueItem> = ctx.state.queue.read().await.history().iter().cloned().collect();
    Ok(ApiResponse::ok(history))
}

/// POST /api/queue/add
///
/// Guests need a username first; consumes one `song` quota slot.
pub async fn add_to_queue(
    State(ctx): State<AppContext>,
    caller: Caller,
    Json(track): Json<TrackInfo>,
) -> ApiResult<QueueItem> {
    if track.id.trim().is_empty() || track.name.trim().is_empty() {
        return Err(Error::BadRequest("song id and name are required".to_string()));
    }

    let requested_by = match ctx.state.users.read().await.username(&caller.ip) {
        Some(name) => name.to_string(),
        None if caller.is_host => "host".to_string(),
        None => return Err(Error::Forbidden("set a username before requesting songs".to_string())),
    };

    let payload = Some(track.id.clone());
    let request = EnqueueRequest::new(track, requested_by, caller.ip.clone());
    let added = with_quota(&ctx, &caller, OperationKind::Song, payload, |queue| {
        Ok((queue.enqueue(request), true))
    })
    .await?;

    ctx.state.broadcast_queue_state().await;
    Ok(ApiResponse::ok(added))
}

/// DELETE /api/queue/:queue_id
///
/// Guests may only withdraw their own requests.
pub async fn remove_from_queue(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path(queue_id): Path<Uuid>,
) -> ApiResult<QueueItem> {
    let removed = {
        let mut queue = ctx.state.queue.write().await;
        if !caller.is_host {
            let owner = queue
                .find(queue_id)
                .map(|item| item.requested_ip.clone())
                .ok_or(crate::queue::QueueError::NotFound(queue_id))?;
            if owner != caller.ip {
                debug!("{} tried to remove {} owned by {}", caller.ip, queue_id, owner);
                return Err(Error::Forbidden("you can only remove your own requests".to_string()));
            }
        }
        queue.dequeue_by_queue_id(queue_id)?
    };

    ctx.state.broadcast_queue_state().await;
    Ok(ApiResponse::ok(removed))
}

/// POST /api/queue/next - consumes one `skip` quota slot
pub async fn play_next(State(ctx): State<AppContext>, caller: Caller) -> ApiResult<Option<QueueItem>> {
    let (current, snapshot) = with_quota(&ctx, &caller, OperationKind::Skip, None, |queue| {
        let current = queue.advance();
        Ok(((current, queue.snapshot()), true))
    })
    .await?;

    ctx.state
        .broadcast_event(JukeboxEvent::now_playing_changed(PlayDirection::Next, snapshot.clone()));
    ctx.state.broadcast_event(JukeboxEvent::queue_updated(snapshot));
    Ok(ApiResponse::ok(current))
}

/// POST /api/queue/previous - host only
pub async fn play_previous(State(ctx): State<AppContext>, caller: Caller) -> ApiResult<QueueItem> {
    caller.require_host()?;

    let (previous, snapshot) = {
        let mut queue = ctx.state.queue.write().await;
        let previous = queue.retreat();
        (previous, queue.snapshot())
    };

    let Some(previous) = previous else {
        return Ok(ApiResponse::ok_with_message(None, "no playback history"));
    };

    ctx.state
        .broadcast_event(JukeboxEvent::now_playing_changed(PlayDirection::Previous, snapshot.clone()));
    ctx.state.broadcast_event(JukeboxEvent::queue_updated(snapshot));
    Ok(ApiResponse::ok(previous))
}

/// POST /api/queue/clear - host only
pub async fn clear_queue(State(ctx): State<AppContext>, caller: Caller) -> ApiResult<QueueSnapshot> {
    caller.require_host()?;

    let snapshot = {
        let mut queue = ctx.state.queue.write().await;
        queue.clear();
        queue.snapshot()
    };

    ctx.state.broadcast_event(JukeboxEvent::queue_updated(snapshot.clone()));
    Ok(ApiResponse::ok(snapshot))
}

/// POST /api/queue/move - host only
pub async fn move_song(
    State(ctx): State<AppContext>,
    caller: Caller,
    Json(req): Json<MoveRequest>,
) -> ApiResult<QueueSnapshot> {
    caller.require_host()?;

    let snapshot = {
        let mut queue = ctx.state.queue.write().await;
        queue.move_song(req.from_index, req.to_index)?;
        queue.snapshot()
    };

    ctx.state.broadcast_event(JukeboxEvent::queue_updated(snapshot.clone()));
    Ok(ApiResponse::ok(snapshot))
}

/// POST /api/queue/promote
///
/// Consumes one `promote` quota slot unless the song was already next.
pub async fn promote_song(
    State(ctx): State<AppContext>,
    caller: Caller,
    Json(req): Json<PromoteRequest>,
) -> ApiResult<QueueSnapshot> {
    let promoted_by = display_name(&ctx, &caller).await;
    let payload = Some(req.queue_id.to_string());

    let (outcome, snapshot) = with_quota(&ctx, &caller, OperationKind::Promote, payload, |queue| {
        let outcome = queue.promote_song(req.queue_id, &promoted_by)?;
        let changed = outcome.changed();
        Ok(((outcome, queue.snapshot()), changed))
    })
    .await?;

    match outcome {
        PromoteOutcome::Promoted(_) => {
            ctx.state.broadcast_event(JukeboxEvent::queue_updated(snapshot.clone()));
            Ok(ApiResponse::ok(snapshot))
        }
        PromoteOutcome::AlreadyNext(_) => Ok(ApiResponse::ok_with_message(Some(snapshot), "song is already next")),
    }
}

// ============================================================================
// Administration
// ============================================================================

/// GET /api/admin/check
pub async fn admin_check(State(ctx): State<AppContext>, caller: Caller) -> ApiResult<AdminCheckResponse> {
    Ok(ApiResponse::ok(AdminCheckResponse {
        is_host: caller.is_host,
        server_ip: ctx.identity.server_ip().to_string(),
        client_ip: caller.ip,
    }))
}

/// GET /api/admin/promote-history?limit=N - host only
pub async fn promote_history(
    State(ctx): State<AppContext>,
    caller: Caller,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<PromoteHistoryResponse> {
    caller.require_host()?;

    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PROMOTE_HISTORY_PAGE);
    let records = ctx.state.queue.read().await.promote_history(limit);
    Ok(ApiResponse::ok(PromoteHistoryResponse {
        total: records.len(),
        records,
    }))
}

/// POST /api/admin/clear-promote-history - host only
pub async fn clear_promote_history(State(ctx): State<AppContext>, caller: Caller) -> ApiResult<()> {
    caller.require_host()?;
    ctx.state.queue.write().await.clear_promote_history();
    Ok(ApiResponse::ok_with_message(None, "promote history cleared"))
}

/// GET /api/admin/quota - host only
pub async fn get_quota_config(
    State(ctx): State<AppContext>,
    caller: Caller,
) -> ApiResult<BTreeMap<OperationKind, QuotaRule>> {
    caller.require_host()?;
    let config = ctx.state.quota.read().await.config().clone();
    Ok(ApiResponse::ok(config))
}

/// POST /api/admin/quota - host only
///
/// Zero, negative or missing values leave that setting unchanged.
pub async fn update_quota_config(
    State(ctx): State<AppContext>,
    caller: Caller,
    Json(req): Json<UpdateQuotaRequest>,
) -> ApiResult<QuotaRuleResponse> {
    caller.require_host()?;

    let (operation, rule) = {
        let mut quota = ctx.state.quota.write().await;
        let operation = quota.parse_kind(&req.operation)?;
        let rule = quota.configure(
            operation,
            positive_u64(req.window_secs),
            positive_u32(req.max_operations),
        )?;
        (operation, rule)
    };

    ctx.state.broadcast_event(JukeboxEvent::quota_config_changed(operation, rule));
    Ok(ApiResponse::ok(QuotaRuleResponse { operation, rule }))
}

/// POST /api/player/heartbeat - host only; relayed to every observer
pub async fn player_heartbeat(
    State(ctx): State<AppContext>,
    caller: Caller,
    Json(status): Json<serde_json::Value>,
) -> ApiResult<()> {
    caller.require_host()?;
    ctx.state.broadcast_event(JukeboxEvent::player_status(status));
    Ok(ApiResponse::ok_with_message(None, "ok"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_conversions() {
        assert_eq!(positive_u64(Some(30)), Some(30));
        assert_eq!(positive_u64(Some(0)), None);
        assert_eq!(positive_u64(Some(-5)), None);
        assert_eq!(positive_u64(None), None);
        assert_eq!(positive_u32(Some(i64::MAX)), None);
        assert_eq!(positive_u32(Some(4)), Some(4));
    }

    #[test]
    fn test_envelope_omits_empty_fields() {
        let Json(body) = ApiResponse::<()>::ok_with_message(None, "done");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("data").is_none());
        assert_eq!(json["message"], "done");
    }
}
