//! Session tokens: HS256 JWTs carrying the account identity.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use ledger_domain::config::SecurityConfig;
use ledger_domain::{Error, Result};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id, stringified.
    pub sub: String,
    pub email: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn account_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| Error::unauthenticated("malformed token subject"))
    }
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(security: &SecurityConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(security.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(security.jwt_secret.as_bytes()),
            access_ttl: Duration::minutes(security.access_token_ttl_mins),
            refresh_ttl: Duration::days(security.refresh_token_ttl_days),
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    fn issue(&self, account_id: i64, email: &str, token_type: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            token_type: token_type.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(Error::internal)
    }

    pub fn issue_access(&self, account_id: i64, email: &str) -> Result<String> {
        self.issue(account_id, email, TOKEN_TYPE_ACCESS, self.access_ttl)
    }

    pub fn issue_refresh(&self, account_id: i64, email: &str) -> Result<String> {
        self.issue(account_id, email, TOKEN_TYPE_REFRESH, self.refresh_ttl)
    }

    fn verify(&self, token: &str, expected_type: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::unauthenticated("token has expired")
                }
                _ => Error::unauthenticated("invalid or malformed token"),
            }
        })?;
        if data.claims.token_type != expected_type {
            return Err(Error::unauthenticated("invalid token type"));
        }
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, TOKEN_TYPE_ACCESS)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
        self.verify(token, TOKEN_TYPE_REFRESH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        let security = SecurityConfig {
            jwt_secret: "test-secret-that-is-long-enough!!".into(),
            ..SecurityConfig::default()
        };
        TokenService::new(&security)
    }

    #[test]
    fn access_token_roundtrip() {
        let svc = service();
        let token = svc.issue_access(42, "u@e.com").unwrap();
        let claims = svc.verify_access(&token).unwrap();
        assert_eq!(claims.account_id().unwrap(), 42);
        assert_eq!(claims.email, "u@e.com");
        assert_eq!(claims.token_type, TOKEN_TYPE_ACCESS);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let svc = service();
        let refresh = svc.issue_refresh(42, "u@e.com").unwrap();
        assert!(svc.verify_access(&refresh).is_err());
        assert!(svc.verify_refresh(&refresh).is_ok());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let mut token = svc.issue_access(42, "u@e.com").unwrap();
        token.push('x');
        assert!(svc.verify_access(&token).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let svc = service();
        let other = TokenService::new(&SecurityConfig {
            jwt_secret: "another-secret-that-is-long-enough".into(),
            ..SecurityConfig::default()
        });
        let token = other.issue_access(42, "u@e.com").unwrap();
        assert!(svc.verify_access(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(service().verify_access("not-a-jwt").is_err());
    }
}
