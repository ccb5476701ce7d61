//! Project routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use ledger_proto::account::{CreateProjectRequest, GetProjectBySlugRequest, GetProjectsRequest};

use crate::error::{ApiError, ApiResult};
use crate::routes::{rpc_call, Ctx};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProjectBody {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Serialize)]
pub struct ProjectBody {
    pub project_id: i64,
    pub name: String,
    pub slug: String,
    pub environment: String,
    pub retention_days: i32,
    pub daily_quota: i64,
    pub available_routes: Vec<String>,
}

fn project_body(p: ledger_proto::account::ProjectInfo) -> ProjectBody {
    ProjectBody {
        project_id: p.project_id,
        name: p.name,
        slug: p.slug,
        environment: p.environment,
        retention_days: p.retention_days,
        daily_quota: p.daily_quota,
        available_routes: p.available_routes,
    }
}

pub async fn create(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<CreateProjectBody>,
) -> ApiResult<(StatusCode, Json<ProjectBody>)> {
    let mut client = state.rpc.account();
    let project = rpc_call(&state, "account", || {
        client.create_project(CreateProjectRequest {
            account_id: ctx.account_id,
            name: body.name,
            slug: body.slug,
            environment: body.environment.unwrap_or_default(),
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(project_body(project))))
}

pub async fn list(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> ApiResult<Json<Vec<ProjectBody>>> {
    let mut client = state.rpc.account();
    let response = rpc_call(&state, "account", || {
        client.get_projects(GetProjectsRequest {
            account_id: ctx.account_id,
        })
    })
    .await?;
    Ok(Json(response.projects.into_iter().map(project_body).collect()))
}

pub async fn get_by_slug(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(slug): Path<String>,
) -> ApiResult<Json<ProjectBody>> {
    let mut client = state.rpc.account();
    let project = rpc_call(&state, "account", || {
        client.get_project_by_slug(GetProjectBySlugRequest { slug })
    })
    .await?;

    // Slug lookups are account-scoped: you only see your own projects.
    if project.account_id != ctx.account_id && ctx.project_id != Some(project.project_id) {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "project not found",
        ));
    }
    Ok(Json(project_body(project)))
}
