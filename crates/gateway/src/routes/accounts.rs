//! Account routes: registration, login/refresh/logout and profile.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use ledger_proto::account::{
    ChangePasswordRequest, GetAccountRequest, LoginRequest, RegisterRequest,
    UpdateAccountNameRequest,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::session_revocation_key;
use crate::routes::{rpc_call, Ctx};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct AccountBody {
    pub account_id: i64,
    pub email: String,
    pub name: String,
    pub plan: String,
    pub status: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<(StatusCode, Json<AccountBody>)> {
    let mut client = state.rpc.account();
    let account = rpc_call(&state, "account", || {
        client.register(RegisterRequest {
            email: body.email,
            password: body.password,
            name: body.name,
            plan: String::new(),
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountBody {
            account_id: account.account_id,
            email: account.email,
            name: account.name,
            plan: account.plan,
            status: account.status,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenBody {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub account_id: i64,
    pub email: String,
    pub plan: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<TokenBody>> {
    let mut client = state.rpc.account();
    let account = rpc_call(&state, "account", || {
        client.login(LoginRequest {
            email: body.email,
            password: body.password,
        })
    })
    .await?;

    let access_token = state
        .tokens
        .issue_access(account.account_id, &account.email)?;
    let refresh_token = state
        .tokens
        .issue_refresh(account.account_id, &account.email)?;

    Ok(Json(TokenBody {
        access_token,
        refresh_token,
        token_type: "bearer",
        expires_in: state.tokens.access_ttl_secs(),
        account_id: account.account_id,
        email: account.email,
        plan: account.plan,
    }))
}

#[derive(Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = state.tokens.verify_refresh(&body.refresh_token)?;
    let access_token = state
        .tokens
        .issue_access(claims.account_id()?, &claims.email)?;
    Ok(Json(RefreshResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.tokens.access_ttl_secs(),
    }))
}

/// Revoke the presented access token for its remaining lifetime.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    _ctx: Ctx,
) -> ApiResult<StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("session token required"))?;

    if let Ok(claims) = state.tokens.verify_access(token) {
        let remaining = (claims.exp - Utc::now().timestamp()).max(1) as u64;
        if let Err(e) = state
            .kv
            .set_ex(&session_revocation_key(token), "revoked", remaining)
            .await
        {
            tracing::warn!(error = %e, "failed to record session revocation");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, Ctx(ctx): Ctx) -> ApiResult<Json<AccountBody>> {
    let mut client = state.rpc.account();
    let account = rpc_call(&state, "account", || {
        client.get_account(GetAccountRequest {
            account_id: ctx.account_id,
        })
    })
    .await?;
    Ok(Json(AccountBody {
        account_id: account.account_id,
        email: account.email,
        name: account.name,
        plan: account.plan,
        status: account.status,
    }))
}

#[derive(Deserialize)]
pub struct UpdateNameBody {
    pub name: String,
}

pub async fn update_name(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<UpdateNameBody>,
) -> ApiResult<Json<AccountBody>> {
    let mut client = state.rpc.account();
    let account = rpc_call(&state, "account", || {
        client.update_account_name(UpdateAccountNameRequest {
            account_id: ctx.account_id,
            name: body.name,
        })
    })
    .await?;
    Ok(Json(AccountBody {
        account_id: account.account_id,
        email: account.email,
        name: account.name,
        plan: account.plan,
        status: account.status,
    }))
}

#[derive(Deserialize)]
pub struct ChangePasswordBody {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<ChangePasswordBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut client = state.rpc.account();
    rpc_call(&state, "account", || {
        client.change_password(ChangePasswordRequest {
            account_id: ctx.account_id,
            old_password: body.old_password,
            new_password: body.new_password,
        })
    })
    .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
