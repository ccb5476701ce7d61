//! Account lifecycle: register, login, profile updates.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use ledger_domain::config::SecurityConfig;
use ledger_domain::{Error, Result};

#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub plan: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

/// Password policy: length bounds only; complexity is the client's concern.
fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 || password.len() > 64 {
        return Err(Error::invalid_input(
            "password must be between 8 and 64 characters",
        ));
    }
    Ok(())
}

fn validate_plan(plan: &str) -> Result<()> {
    match plan {
        "free" | "pro" | "enterprise" => Ok(()),
        other => Err(Error::invalid_input(format!("invalid plan: {other:?}"))),
    }
}

pub async fn register(
    pool: &PgPool,
    security: &SecurityConfig,
    email: &str,
    password: &str,
    name: &str,
    plan: &str,
) -> Result<AccountRow> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::invalid_input("invalid email address"));
    }
    validate_password(password)?;
    let plan = if plan.is_empty() { "free" } else { plan };
    validate_plan(plan)?;

    let password_hash =
        bcrypt::hash(password, security.bcrypt_cost).map_err(Error::internal)?;

    let result = sqlx::query_as::<_, AccountRow>(
        "INSERT INTO accounts (email, password_hash, name, plan, status)
         VALUES ($1, $2, $3, $4, 'active')
         RETURNING id, email, password_hash, name, plan, status, created_at",
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(name)
    .bind(plan)
    .fetch_one(pool)
    .await;

    match result {
        Ok(account) => Ok(account),
        Err(e) if is_unique_violation(&e) => Err(Error::conflict("email already registered")),
        Err(e) => Err(Error::db(e)),
    }
}

/// Verify credentials and return the account. Every failure mode reports
/// the same message so responses never reveal which part was wrong.
pub async fn login(pool: &PgPool, email: &str, password: &str) -> Result<AccountRow> {
    const INVALID: &str = "invalid credentials";

    let email = email.trim().to_lowercase();
    let account = sqlx::query_as::<_, AccountRow>(
        "SELECT id, email, password_hash, name, plan, status, created_at
         FROM accounts WHERE email = $1 AND status = 'active'",
    )
    .bind(&email)
    .fetch_optional(pool)
    .await
    .map_err(Error::db)?
    .ok_or_else(|| Error::unauthenticated(INVALID))?;

    let matches = bcrypt::verify(password, &account.password_hash).unwrap_or(false);
    if !matches {
        return Err(Error::unauthenticated(INVALID));
    }
    Ok(account)
}

pub async fn get_by_id(pool: &PgPool, account_id: i64) -> Result<AccountRow> {
    sqlx::query_as::<_, AccountRow>(
        "SELECT id, email, password_hash, name, plan, status, created_at
         FROM accounts WHERE id = $1",
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::db)?
    .ok_or_else(|| Error::not_found("account not found"))
}

pub async fn update_name(pool: &PgPool, account_id: i64, name: &str) -> Result<AccountRow> {
    let name = name.trim();
    if name.is_empty() || name.len() > 255 {
        return Err(Error::invalid_input("name must be 1..=255 characters"));
    }

    sqlx::query_as::<_, AccountRow>(
        "UPDATE accounts SET name = $2, updated_at = NOW()
         WHERE id = $1
         RETURNING id, email, password_hash, name, plan, status, created_at",
    )
    .bind(account_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(Error::db)?
    .ok_or_else(|| Error::not_found("account not found"))
}

pub async fn change_password(
    pool: &PgPool,
    security: &SecurityConfig,
    account_id: i64,
    old_password: &str,
    new_password: &str,
) -> Result<()> {
    validate_password(new_password)?;

    let account = get_by_id(pool, account_id).await?;
    let matches = bcrypt::verify(old_password, &account.password_hash).unwrap_or(false);
    if !matches {
        return Err(Error::unauthenticated("current password is incorrect"));
    }

    let password_hash =
        bcrypt::hash(new_password, security.bcrypt_cost).map_err(Error::internal)?;
    sqlx::query("UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(account_id)
        .bind(&password_hash)
        .execute(pool)
        .await
        .map_err(Error::db)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"x".repeat(64)).is_ok());
        assert!(validate_password(&"x".repeat(65)).is_err());
    }

    #[test]
    fn plan_must_be_known() {
        assert!(validate_plan("free").is_ok());
        assert!(validate_plan("pro").is_ok());
        assert!(validate_plan("enterprise").is_ok());
        assert!(validate_plan("platinum").is_err());
    }
}
