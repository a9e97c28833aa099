use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mongo_url: String,
    pub database: String,
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mongo_url = std::env::var("MONGO_URL").context("MONGO_URL must be set")?;
        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        if secret.len() < 32 {
            tracing::warn!("JWT_SECRET is shorter than 32 bytes");
        }

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "budget-server".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "budget-server".into()),
            ttl_days: parse_or("JWT_TTL_DAYS", 7)?,
        };
        let cookie = CookieConfig {
            name: std::env::var("COOKIE_NAME").unwrap_or_else(|_| "token".into()),
            secure: parse_or("COOKIE_SECURE", false)?,
        };

        Ok(Self {
            mongo_url,
            database: std::env::var("MONGO_DATABASE").unwrap_or_else(|_| "budget".into()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_or("PORT", 3000)?,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 15)?,
            jwt,
            cookie,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reads `key`, falling back to `default` when unset. A set but unparsable
/// value is a startup error rather than a silent default.
fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_or;

    #[test]
    fn parse_or_uses_default_for_missing_key() {
        let port: u16 = parse_or("BUDGET_SERVER_TEST_UNSET_PORT", 3000).unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        std::env::set_var("BUDGET_SERVER_TEST_BAD_PORT", "three-thousand");
        let res: anyhow::Result<u16> = parse_or("BUDGET_SERVER_TEST_BAD_PORT", 3000);
        assert!(res.is_err());
    }
}
