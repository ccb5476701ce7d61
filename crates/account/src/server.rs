//! gRPC servicer: translates proto requests into store operations and
//! domain errors into status codes.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tonic::{Request, Response, Status};

use ledger_domain::config::Config;
use ledger_kv::{ApiKeyCache, KvStore, RateLimiter};
use ledger_proto::account::account_service_server::AccountService;
use ledger_proto::account::*;
use ledger_proto::convert::error_to_status;

use crate::{accounts, api_keys, dashboards, preferences, projects, usage};

pub struct AccountServicer {
    config: Arc<Config>,
    pool: PgPool,
    kv: KvStore,
    cache: ApiKeyCache,
    limiter: RateLimiter,
    dashboards: dashboards::DashboardStore,
}

impl AccountServicer {
    pub fn new(config: Arc<Config>, pool: PgPool, kv: KvStore) -> Self {
        let cache = ApiKeyCache::new(kv.clone(), config.cache.api_key_ttl_secs);
        let limiter = RateLimiter::new(kv.clone());
        let dashboards =
            dashboards::DashboardStore::new(pool.clone(), kv.clone(), config.cache.dashboard_ttl_secs);
        Self {
            config,
            pool,
            kv,
            cache,
            limiter,
            dashboards,
        }
    }
}

fn account_info(row: accounts::AccountRow) -> AccountInfo {
    AccountInfo {
        account_id: row.id,
        email: row.email,
        name: row.name,
        plan: row.plan,
        status: row.status,
        created_at: row.created_at.to_rfc3339(),
    }
}

fn project_info(row: projects::ProjectRow) -> ProjectInfo {
    ProjectInfo {
        project_id: row.id,
        account_id: row.account_id,
        name: row.name,
        slug: row.slug,
        environment: row.environment,
        retention_days: row.retention_days as i32,
        daily_quota: row.daily_quota,
        available_routes: row.available_routes,
        created_at: row.created_at.to_rfc3339(),
    }
}

fn panel_to_proto(panel: dashboards::Panel) -> Panel {
    Panel {
        id: panel.id,
        name: panel.name,
        index: panel.index,
        project_id: panel.project_id,
        r#type: panel.panel_type,
        period: panel.period,
        period_from: panel.period_from,
        period_to: panel.period_to,
        endpoint: panel.endpoint,
    }
}

fn panel_from_proto(panel: Panel) -> dashboards::Panel {
    dashboards::Panel {
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

fn prefs_to_proto(prefs: preferences::Preferences) -> NotificationPreferences {
    let projects = prefs
        .projects
        .into_iter()
        .map(|(pid, s)| {
            (
                pid,
                ProjectNotificationSettings {
                    enabled: s.enabled,
                    levels: s.levels,
                    types: s.types,
                },
            )
        })
        .collect();
    NotificationPreferences {
        enabled: prefs.enabled,
        projects,
    }
}

fn prefs_from_proto(prefs: NotificationPreferences) -> preferences::Preferences {
    let projects: HashMap<_, _> = prefs
        .projects
        .into_iter()
        .map(|(pid, s)| {
            (
                pid,
                preferences::ProjectSettings {
                    enabled: s.enabled,
                    levels: s.levels,
                    types: s.types,
                },
            )
        })
        .collect();
    preferences::Preferences {
        enabled: prefs.enabled,
        projects,
    }
}

#[tonic::async_trait]
impl AccountService for AccountServicer {
    // ── Accounts ─────────────────────────────────────────────────────

    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<AccountInfo>, Status> {
        let req = request.into_inner();
        let account = accounts::register(
            &self.pool,
            &self.config.security,
            &req.email,
            &req.password,
            &req.name,
            &req.plan,
        )
        .await
        .map_err(error_to_status)?;
        tracing::info!(account_id = account.id, "account registered");
        Ok(Response::new(account_info(account)))
    }

    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<AccountInfo>, Status> {
        let req = request.into_inner();
        let account = accounts::login(&self.pool, &req.email, &req.password)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(account_info(account)))
    }

    async fn get_account(
        &self,
        request: Request<GetAccountRequest>,
    ) -> Result<Response<AccountInfo>, Status> {
        let req = request.into_inner();
        let account = accounts::get_by_id(&self.pool, req.account_id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(account_info(account)))
    }

    async fn update_account_name(
        &self,
        request: Request<UpdateAccountNameRequest>,
    ) -> Result<Response<AccountInfo>, Status> {
        let req = request.into_inner();
        let account = accounts::update_name(&self.pool, req.account_id, &req.name)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(account_info(account)))
    }

    async fn change_password(
        &self,
        request: Request<ChangePasswordRequest>,
    ) -> Result<Response<ChangePasswordResponse>, Status> {
        let req = request.into_inner();
        accounts::change_password(
            &self.pool,
            &self.config.security,
            req.account_id,
            &req.old_password,
            &req.new_password,
        )
        .await
        .map_err(error_to_status)?;
        Ok(Response::new(ChangePasswordResponse { success: true }))
    }

    // ── Projects ─────────────────────────────────────────────────────

    async fn create_project(
        &self,
        request: Request<CreateProjectRequest>,
    ) -> Result<Response<ProjectInfo>, Status> {
        let req = request.into_inner();
        let project = projects::create(
            &self.pool,
            &self.config.security,
            req.account_id,
            &req.name,
            &req.slug,
            &req.environment,
        )
        .await
        .map_err(error_to_status)?;
        tracing::info!(project_id = project.id, slug = %project.slug, "project created");
        Ok(Response::new(project_info(project)))
    }

    async fn get_projects(
        &self,
        request: Request<GetProjectsRequest>,
    ) -> Result<Response<GetProjectsResponse>, Status> {
        let req = request.into_inner();
        let rows = projects::list_for_account(&self.pool, req.account_id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(GetProjectsResponse {
            projects: rows.into_iter().map(project_info).collect(),
        }))
    }

    async fn get_project_by_id(
        &self,
        request: Request<GetProjectByIdRequest>,
    ) -> Result<Response<ProjectInfo>, Status> {
        let req = request.into_inner();
        let project = projects::get_by_id(&self.pool, req.project_id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(project_info(project)))
    }

    async fn get_project_by_slug(
        &self,
        request: Request<GetProjectBySlugRequest>,
    ) -> Result<Response<ProjectInfo>, Status> {
        let req = request.into_inner();
        let project = projects::get_by_slug(&self.pool, &req.slug)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(project_info(project)))
    }

    // ── API keys ─────────────────────────────────────────────────────

    async fn create_api_key(
        &self,
        request: Request<CreateApiKeyRequest>,
    ) -> Result<Response<CreateApiKeyResponse>, Status> {
        let req = request.into_inner();
        let (full_key, row) = api_keys::create(
            &self.pool,
            &self.config.security,
            req.project_id,
            req.name.as_deref(),
        )
        .await
        .map_err(error_to_status)?;
        tracing::info!(key_id = row.id, project_id = row.project_id, "API key created");
        Ok(Response::new(CreateApiKeyResponse {
            key_id: row.id,
            full_key,
            key_prefix: row.key_prefix,
        }))
    }

    async fn validate_api_key(
        &self,
        request: Request<ValidateApiKeyRequest>,
    ) -> Result<Response<ValidateApiKeyResponse>, Status> {
        let req = request.into_inner();
        let record = api_keys::validate(&self.pool, &self.limiter, &req.api_key)
            .await
            .map_err(error_to_status)?;

        let response = match record {
            Some(record) => ValidateApiKeyResponse {
                valid: true,
                project_id: record.project_id,
                account_id: record.account_id,
                daily_quota: record.daily_quota,
                retention_days: record.retention_days,
                rate_limit_per_minute: record.rate_limit_per_minute,
                rate_limit_per_hour: record.rate_limit_per_hour,
                current_usage: record.current_usage,
                error_message: None,
            },
            None => ValidateApiKeyResponse {
                valid: false,
                error_message: Some("invalid or expired API key".into()),
                ..Default::default()
            },
        };
        Ok(Response::new(response))
    }

    async fn revoke_api_key(
        &self,
        request: Request<RevokeApiKeyRequest>,
    ) -> Result<Response<RevokeApiKeyResponse>, Status> {
        let req = request.into_inner();
        api_keys::revoke(&self.pool, &self.cache, req.key_id)
            .await
            .map_err(error_to_status)?;
        tracing::info!(key_id = req.key_id, "API key revoked");
        Ok(Response::new(RevokeApiKeyResponse { success: true }))
    }

    async fn list_api_keys(
        &self,
        request: Request<ListApiKeysRequest>,
    ) -> Result<Response<ListApiKeysResponse>, Status> {
        let req = request.into_inner();
        let rows = api_keys::list_for_project(&self.pool, req.project_id)
            .await
            .map_err(error_to_status)?;
        let api_keys = rows
            .into_iter()
            .map(|row| ApiKeyInfo {
                key_id: row.id,
                project_id: row.project_id,
                name: row.name.unwrap_or_default(),
                key_prefix: row.key_prefix,
                status: row.status,
                created_at: row.created_at.to_rfc3339(),
                last_used_at: row.last_used_at.map(|t| t.to_rfc3339()),
            })
            .collect();
        Ok(Response::new(ListApiKeysResponse { api_keys }))
    }

    // ── Usage ────────────────────────────────────────────────────────

    async fn get_daily_usage(
        &self,
        request: Request<GetDailyUsageRequest>,
    ) -> Result<Response<GetDailyUsageResponse>, Status> {
        let req = request.into_inner();
        let date = req
            .date
            .parse()
            .map_err(|_| Status::invalid_argument("date must be YYYY-MM-DD"))?;
        let row = usage::get(&self.pool, req.project_id, date)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(GetDailyUsageResponse {
            date: req.date,
            logs_ingested: row.logs_ingested,
            logs_queried: row.logs_queried,
            storage_bytes: row.storage_bytes,
        }))
    }

    // ── Dashboard panels ─────────────────────────────────────────────

    async fn get_dashboard_panels(
        &self,
        request: Request<GetDashboardPanelsRequest>,
    ) -> Result<Response<GetDashboardPanelsResponse>, Status> {
        let req = request.into_inner();
        let panels = self
            .dashboards
            .panels(req.account_id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(GetDashboardPanelsResponse {
            panels: panels.into_iter().map(panel_to_proto).collect(),
        }))
    }

    async fn create_dashboard_panel(
        &self,
        request: Request<CreateDashboardPanelRequest>,
    ) -> Result<Response<PanelResponse>, Status> {
        let req = request.into_inner();
        let panel = req
            .panel
            .ok_or_else(|| Status::invalid_argument("panel is required"))?;
        let created = self
            .dashboards
            .create_panel(req.account_id, panel_from_proto(panel))
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(PanelResponse {
            panel: Some(panel_to_proto(created)),
        }))
    }

    async fn update_dashboard_panel(
        &self,
        request: Request<UpdateDashboardPanelRequest>,
    ) -> Result<Response<PanelResponse>, Status> {
        let req = request.into_inner();
        let panel = req
            .panel
            .ok_or_else(|| Status::invalid_argument("panel is required"))?;
        let updated = self
            .dashboards
            .update_panel(req.account_id, &req.panel_id, panel_from_proto(panel))
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(PanelResponse {
            panel: Some(panel_to_proto(updated)),
        }))
    }

    async fn delete_dashboard_panel(
        &self,
        request: Request<DeleteDashboardPanelRequest>,
    ) -> Result<Response<DeleteDashboardPanelResponse>, Status> {
        let req = request.into_inner();
        self.dashboards
            .delete_panel(req.account_id, &req.panel_id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(DeleteDashboardPanelResponse { success: true }))
    }

    // ── Notification preferences ─────────────────────────────────────

    async fn get_notification_preferences(
        &self,
        request: Request<GetNotificationPreferencesRequest>,
    ) -> Result<Response<NotificationPreferences>, Status> {
        let req = request.into_inner();
        let prefs = preferences::get(&self.kv, req.account_id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(prefs_to_proto(prefs)))
    }

    async fn update_notification_preferences(
        &self,
        request: Request<UpdateNotificationPreferencesRequest>,
    ) -> Result<Response<NotificationPreferences>, Status> {
        let req = request.into_inner();
        let prefs = req
            .preferences
            .ok_or_else(|| Status::invalid_argument("preferences are required"))?;
        let updated = preferences::update(&self.kv, req.account_id, &prefs_from_proto(prefs))
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(prefs_to_proto(updated)))
    }
}
