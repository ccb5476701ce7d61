//! Project management. Slug uniqueness is enforced by the database index,
//! so concurrent creates of the same slug resolve to exactly one winner.

use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::{FromRow, PgPool};
use std::sync::OnceLock;

use ledger_domain::config::SecurityConfig;
use ledger_domain::{Error, Result};

use crate::accounts::is_unique_violation;

#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub slug: String,
    pub environment: String,
    pub retention_days: i16,
    pub daily_quota: i64,
    pub available_routes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

const PROJECT_COLUMNS: &str = "id, account_id, name, slug, environment, retention_days, \
                               daily_quota, available_routes, created_at";

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").unwrap())
}

fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 255 || !slug_pattern().is_match(slug) {
        return Err(Error::invalid_input(
            "slug must be lowercase letters, digits, hyphens or underscores",
        ));
    }
    Ok(())
}

fn validate_environment(environment: &str) -> Result<()> {
    match environment {
        "production" | "staging" | "dev" => Ok(()),
        other => Err(Error::invalid_input(format!(
            "invalid environment: {other:?}"
        ))),
    }
}

pub async fn create(
    pool: &PgPool,
    security: &SecurityConfig,
    account_id: i64,
    name: &str,
    slug: &str,
    environment: &str,
) -> Result<ProjectRow> {
    if name.trim().is_empty() {
        return Err(Error::invalid_input("project name must not be empty"));
    }
    validate_slug(slug)?;
    let environment = if environment.is_empty() {
        "production"
    } else {
        environment
    };
    validate_environment(environment)?;

    let result = sqlx::query_as::<_, ProjectRow>(&format!(
        "INSERT INTO projects (account_id, name, slug, environment, daily_quota)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(account_id)
    .bind(name.trim())
    .bind(slug)
    .bind(environment)
    .bind(security.default_daily_quota)
    .fetch_one(pool)
    .await;

    match result {
        Ok(project) => Ok(project),
        Err(e) if is_unique_violation(&e) => {
            Err(Error::conflict(format!("slug {slug:?} already exists")))
        }
        Err(e) => Err(Error::db(e)),
    }
}

pub async fn list_for_account(pool: &PgPool, account_id: i64) -> Result<Vec<ProjectRow>> {
    sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE account_id = $1 ORDER BY id"
    ))
    .bind(account_id)
    .fetch_all(pool)
    .await
    .map_err(Error::db)
}

pub async fn get_by_id(pool: &PgPool, project_id: i64) -> Result<ProjectRow> {
    sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
    ))
    .bind(project_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::db)?
    .ok_or_else(|| Error::not_found("project not found"))
}

pub async fn get_by_slug(pool: &PgPool, slug: &str) -> Result<ProjectRow> {
    sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(Error::db)?
    .ok_or_else(|| Error::not_found("project not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_accepts_lowercase_alnum_hyphen_underscore() {
        assert!(validate_slug("my-app_2").is_ok());
        assert!(validate_slug("app").is_ok());
    }

    #[test]
    fn slug_rejects_uppercase_spaces_and_empty() {
        assert!(validate_slug("My-App").is_err());
        assert!(validate_slug("my app").is_err());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("app/1").is_err());
    }

    #[test]
    fn environment_must_be_known() {
        assert!(validate_environment("production").is_ok());
        assert!(validate_environment("staging").is_ok());
        assert!(validate_environment("dev").is_ok());
        assert!(validate_environment("qa").is_err());
    }
}
