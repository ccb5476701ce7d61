//! Per-account dashboard panels, stored as a JSONB list and cached in the
//! KV store. Mutations rewrite the whole list and drop the cache entry.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use ledger_domain::{Error, Result};
use ledger_kv::KvStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Panel {
    pub id: String,
    pub name: String,
    pub index: u32,
    pub project_id: i64,
    #[serde(rename = "type")]
    pub panel_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn validate_panel_type(panel_type: &str) -> Result<()> {
    match panel_type {
        "logs" | "errors" | "metrics" => Ok(()),
        other => Err(Error::invalid_input(format!(
            "invalid panel type: {other:?}"
        ))),
    }
}

fn cache_key(account_id: i64) -> String {
    format!("dashboard:panels:{account_id}")
}

#[derive(Clone)]
pub struct DashboardStore {
    pool: PgPool,
    kv: KvStore,
    cache_ttl_secs: u64,
}

impl DashboardStore {
    pub fn new(pool: PgPool, kv: KvStore, cache_ttl_secs: u64) -> Self {
        Self {
            pool,
            kv,
            cache_ttl_secs,
        }
    }

    pub async fn panels(&self, account_id: i64) -> Result<Vec<Panel>> {
        if let Ok(Some(raw)) = self.kv.get(&cache_key(account_id)).await {
            if let Ok(panels) = serde_json::from_str(&raw) {
                return Ok(panels);
            }
        }

        let panels = self.load(account_id).await?;
        self.fill_cache(account_id, &panels).await;
        Ok(panels)
    }

    pub async fn create_panel(&self, account_id: i64, mut panel: Panel) -> Result<Panel> {
        validate_panel_type(&panel.panel_type)?;
        panel.id = Uuid::new_v4().to_string();

        let mut panels = self.load(account_id).await?;
        panels.push(panel.clone());
        panels.sort_by_key(|p| p.index);
        self.save(account_id, &panels).await?;
        Ok(panel)
    }

    pub async fn update_panel(
        &self,
        account_id: i64,
        panel_id: &str,
        mut panel: Panel,
    ) -> Result<Panel> {
        validate_panel_type(&panel.panel_type)?;
        panel.id = panel_id.to_string();

        let mut panels = self.load(account_id).await?;
        let slot = panels
            .iter_mut()
            .find(|p| p.id == panel_id)
            .ok_or_else(|| Error::not_found("panel not found"))?;
        *slot = panel.clone();
        panels.sort_by_key(|p| p.index);
        self.save(account_id, &panels).await?;
        Ok(panel)
    }

    pub async fn delete_panel(&self, account_id: i64, panel_id: &str) -> Result<()> {
        let mut panels = self.load(account_id).await?;
        let before = panels.len();
        panels.retain(|p| p.id != panel_id);
        if panels.len() == before {
            return Err(Error::not_found("panel not found"));
        }
        self.save(account_id, &panels).await
    }

    // ── Private ──────────────────────────────────────────────────────

    async fn load(&self, account_id: i64) -> Result<Vec<Panel>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT panels FROM user_dashboards WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::db)?;

        match row {
            Some((value,)) => serde_json::from_value(value).map_err(Error::internal),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, account_id: i64, panels: &[Panel]) -> Result<()> {
        let value = serde_json::to_value(panels)?;
        sqlx::query(
            "INSERT INTO user_dashboards (account_id, panels)
             VALUES ($1, $2)
             ON CONFLICT (account_id)
             DO UPDATE SET panels = EXCLUDED.panels, updated_at = NOW()",
        )
        .bind(account_id)
        .bind(&value)
        .execute(&self.pool)
        .await
        .map_err(Error::db)?;

        if let Err(e) = self.kv.delete(&cache_key(account_id)).await {
            tracing::warn!(account_id, error = %e, "failed to invalidate dashboard cache");
        }
        Ok(())
    }

    async fn fill_cache(&self, account_id: i64, panels: &[Panel]) {
        let Ok(raw) = serde_json::to_string(panels) else {
            return;
        };
        if let Err(e) = self
            .kv
            .set_ex(&cache_key(account_id), &raw, self.cache_ttl_secs)
            .await
        {
            tracing::debug!(account_id, error = %e, "dashboard cache fill failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_type_is_restricted() {
        assert!(validate_panel_type("logs").is_ok());
        assert!(validate_panel_type("errors").is_ok());
        assert!(validate_panel_type("metrics").is_ok());
        assert!(validate_panel_type("charts").is_err());
    }

    #[test]
    fn panel_json_uses_type_field() {
        let panel = Panel {
            id: "p1".into(),
            name: "Errors".into(),
            index: 0,
            project_id: 3,
            panel_type: "errors".into(),
            period: Some("last7days".into()),
            period_from: None,
            period_to: None,
            endpoint: None,
        };
        let json = serde_json::to_value(&panel).unwrap();
        assert_eq!(json["type"], "errors");
        assert!(json.get("period_from").is_none());
        let back: Panel = serde_json::from_value(json).unwrap();
        assert_eq!(back, panel);
    }
}
