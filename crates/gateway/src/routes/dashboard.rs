//! Dashboard panel routes (session-scoped).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use ledger_proto::account::{
    CreateDashboardPanelRequest, DeleteDashboardPanelRequest, GetDashboardPanelsRequest, Panel,
    UpdateDashboardPanelRequest,
};

use crate::error::ApiResult;
use crate::routes::{rpc_call, Ctx};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct PanelBody {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub index: u32,
    pub project_id: i64,
    #[serde(rename = "type")]
    pub panel_type: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default, rename = "periodFrom")]
    pub period_from: Option<String>,
    #[serde(default, rename = "periodTo")]
    pub period_to: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn to_proto(body: PanelBody) -> Panel {
    Panel {
        id: body.id,
        name: body.name,
        index: body.index,
        project_id: body.project_id,
        r#type: body.panel_type,
        period: body.period,
        period_from: body.period_from,
        period_to: body.period_to,
        endpoint: body.endpoint,
    }
}

fn from_proto(panel: Panel) -> PanelBody {
    PanelBody {
        id: panel.id,
        name: panel.name,
        index: panel.index,
        project_id: panel.project_id,
        panel_type: panel.r#type,
        period: panel.period,
        period_from: panel.period_from,
        period_to: panel.period_to,
        endpoint: panel.endpoint,
    }
}

pub async fn list(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> ApiResult<Json<Vec<PanelBody>>> {
    let mut client = state.rpc.account();
    let response = rpc_call(&state, "account", || {
        client.get_dashboard_panels(GetDashboardPanelsRequest {
            account_id: ctx.account_id,
        })
    })
    .await?;
    Ok(Json(response.panels.into_iter().map(from_proto).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<PanelBody>,
) -> ApiResult<(StatusCode, Json<Option<PanelBody>>)> {
    let mut client = state.rpc.account();
    let response = rpc_call(&state, "account", || {
        client.create_dashboard_panel(CreateDashboardPanelRequest {
            account_id: ctx.account_id,
            panel: Some(to_proto(body)),
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(response.panel.map(from_proto))))
}

pub async fn update(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(panel_id): Path<String>,
    Json(body): Json<PanelBody>,
) -> ApiResult<Json<Option<PanelBody>>> {
    let mut client = state.rpc.account();
    let response = rpc_call(&state, "account", || {
        client.update_dashboard_panel(UpdateDashboardPanelRequest {
            account_id: ctx.account_id,
            panel_id,
            panel: Some(to_proto(body)),
        })
    })
    .await?;
    Ok(Json(response.panel.map(from_proto)))
}

pub async fn remove(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(panel_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut client = state.rpc.account();
    rpc_call(&state, "account", || {
        client.delete_dashboard_panel(DeleteDashboardPanelRequest {
            account_id: ctx.account_id,
            panel_id,
        })
    })
    .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
