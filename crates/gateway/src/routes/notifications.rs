//! Real-time error notifications over SSE.
//!
//! The client is subscribed to the topics of every project it may see; the
//! stream opens with a `connected` event, forwards each published
//! notification as `error_notification`, and heartbeats on the configured
//! interval. Dropping the connection tears the subscription down.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::Utc;
use futures_util::Stream;
use serde_json::json;

use ledger_kv::NotificationSubscriber;
use ledger_proto::account::GetProjectsRequest;

use crate::error::{ApiError, ApiResult};
use crate::routes::{rpc_call, Ctx};
use crate::state::AppState;

/// Projects whose topics this client may follow.
async fn visible_projects(state: &AppState, ctx: &crate::state::AuthContext) -> Vec<i64> {
    if let Some(project_id) = ctx.project_id {
        return vec![project_id];
    }
    let mut client = state.rpc.account();
    match rpc_call(state, "account", || {
        client.get_projects(GetProjectsRequest {
            account_id: ctx.account_id,
        })
    })
    .await
    {
        Ok(response) => response.projects.into_iter().map(|p| p.project_id).collect(),
        Err(e) => {
            tracing::warn!(account_id = ctx.account_id, detail = %e.detail, "failed to list projects for stream");
            Vec::new()
        }
    }
}

pub async fn stream(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if !state.config.notifications.enabled {
        return Err(ApiError::new(
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "notifications are currently disabled",
        ));
    }

    let project_ids = visible_projects(&state, &ctx).await;
    let mut subscriber = NotificationSubscriber::subscribe(&state.kv, &project_ids)
        .await
        .map_err(ApiError::from)?;
    let heartbeat = Duration::from_secs(state.config.notifications.heartbeat_interval_secs);
    let account_id = ctx.account_id;

    tracing::info!(account_id, projects = project_ids.len(), "notification stream opened");

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data(
            json!({
                "timestamp": Utc::now().to_rfc3339(),
                "projects": project_ids,
            })
            .to_string(),
        ));

        let mut ticker = tokio::time::interval(heartbeat);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                message = subscriber.next_message() => {
                    match message {
                        Some(payload) => {
                            yield Ok(Event::default().event("error_notification").data(payload));
                        }
                        None => {
                            tracing::info!(account_id, "notification subscription closed");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    yield Ok(Event::default().event("heartbeat").data(
                        json!({ "timestamp": Utc::now().to_rfc3339() }).to_string(),
                    ));
                }
            }
        }
    };

    Ok(Sse::new(stream))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "enabled": state.config.notifications.enabled,
        "heartbeat_interval": state.config.notifications.heartbeat_interval_secs,
        "max_connections_per_user": state.config.notifications.max_connections_per_user,
    }))
}
