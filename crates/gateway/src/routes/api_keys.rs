//! API key routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use ledger_proto::account::{CreateApiKeyRequest, RevokeApiKeyRequest};

use crate::error::ApiResult;
use crate::routes::{authorize_project, rpc_call, Ctx};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateKeyBody {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct CreatedKeyBody {
    pub key_id: i64,
    /// Shown exactly once; only the hash is stored.
    pub full_key: String,
    pub key_prefix: String,
    pub warning: &'static str,
}

pub async fn create(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(project_id): Path<i64>,
    Json(body): Json<CreateKeyBody>,
) -> ApiResult<(StatusCode, Json<CreatedKeyBody>)> {
    authorize_project(&state, &ctx, project_id).await?;

    let mut client = state.rpc.account();
    let created = rpc_call(&state, "account", || {
        client.create_api_key(CreateApiKeyRequest {
            project_id,
            name: body.name,
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedKeyBody {
            key_id: created.key_id,
            full_key: created.full_key,
            key_prefix: created.key_prefix,
            warning: "Store this key securely - it will not be shown again",
        }),
    ))
}

#[derive(Serialize)]
pub struct RevokedBody {
    pub success: bool,
    pub message: &'static str,
}

pub async fn revoke(
    State(state): State<AppState>,
    Ctx(_ctx): Ctx,
    Path(key_id): Path<i64>,
) -> ApiResult<Json<RevokedBody>> {
    let mut client = state.rpc.account();
    rpc_call(&state, "account", || {
        client.revoke_api_key(RevokeApiKeyRequest { key_id })
    })
    .await?;
    Ok(Json(RevokedBody {
        success: true,
        message: "API key revoked",
    }))
}
