pub mod accounts;
pub mod api_keys;
pub mod dashboard;
pub mod health;
pub mod ingest;
pub mod notifications;
pub mod projects;
pub mod query;

use std::future::Future;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;

use ledger_proto::account::GetProjectByIdRequest;
use ledger_proto::convert::status_to_error;

use crate::error::ApiError;
use crate::state::{AppState, AuthContext};

/// Extractor for the auth context the middleware attached.
pub struct Ctx(pub AuthContext);

#[axum::async_trait]
impl FromRequestParts<AppState> for Ctx {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, ApiError> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Ctx)
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}

/// Run one downstream RPC under its circuit breaker, translating the
/// status into an API error.
pub(crate) async fn rpc_call<T, Fut>(
    state: &AppState,
    service: &'static str,
    call: impl FnOnce() -> Fut,
) -> Result<T, ApiError>
where
    Fut: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
{
    let breaker = state.breakers.get(service);
    breaker
        .call(|| async {
            call()
                .await
                .map(|response| response.into_inner())
                .map_err(|status| status_to_error(service, status))
        })
        .await
        .map_err(ApiError::from)
}

/// Confirm the caller may act on `project_id`: API keys must match their
/// own project; session callers must own it.
pub(crate) async fn authorize_project(
    state: &AppState,
    ctx: &AuthContext,
    project_id: i64,
) -> Result<(), ApiError> {
    match ctx.project_id {
        Some(own) if own == project_id => Ok(()),
        Some(_) => Err(ApiError::new(
            axum::http::StatusCode::FORBIDDEN,
            "API key is not valid for this project",
        )),
        None => {
            let mut client = state.rpc.account();
            let project = rpc_call(state, "account", || {
                client.get_project_by_id(GetProjectByIdRequest { project_id })
            })
            .await?;
            if project.account_id == ctx.account_id {
                Ok(())
            } else {
                Err(ApiError::new(
                    axum::http::StatusCode::FORBIDDEN,
                    "project belongs to another account",
                ))
            }
        }
    }
}

/// Build the full `/api/v1` router plus the unprefixed health surface.
pub fn router() -> Router<AppState> {
    let api = Router::new()
        // Accounts
        .route("/accounts/register", post(accounts::register))
        .route("/accounts/login", post(accounts::login))
        .route("/accounts/refresh", post(accounts::refresh))
        .route("/accounts/logout", post(accounts::logout))
        .route("/accounts/me", get(accounts::me))
        .route("/accounts/me/name", patch(accounts::update_name))
        .route("/accounts/me/password", post(accounts::change_password))
        // Projects
        .route("/projects", post(projects::create).get(projects::list))
        .route("/projects/:slug", get(projects::get_by_slug))
        // API keys
        .route("/projects/:project_id/api-keys", post(api_keys::create))
        .route("/api-keys/:key_id", delete(api_keys::revoke))
        // Dashboard panels
        .route(
            "/dashboard/panels",
            get(dashboard::list).post(dashboard::create),
        )
        .route(
            "/dashboard/panels/:panel_id",
            put(dashboard::update).delete(dashboard::remove),
        )
        // Ingestion
        .route("/ingest/single", post(ingest::single))
        .route("/ingest/batch", post(ingest::batch))
        .route("/queue/depth", get(ingest::queue_depth))
        // Query
        .route("/logs", get(query::query_logs))
        .route("/logs/search", get(query::search_logs))
        .route("/logs/:log_id", get(query::get_log))
        .route("/errors/list", get(query::error_list))
        .route("/metrics/aggregated", get(query::aggregated_metrics))
        .route("/metrics/error-rate", get(query::error_rate))
        .route("/metrics/log-volume", get(query::log_volume))
        .route("/metrics/top-errors", get(query::top_errors))
        .route("/metrics/usage-stats", get(query::usage_stats))
        // Notifications
        .route("/notifications/stream", get(notifications::stream))
        .route("/notifications/health", get(notifications::health));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/deep", get(health::deep_health))
        .route("/metrics", get(health::metrics))
        .nest("/api/v1", api)
}
