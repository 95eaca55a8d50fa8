use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

/// Ten years. Larger lifetimes push `exp` past what the token clock can represent.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;
pub const MAX_LEEWAY_SECONDS: i64 = 60 * 60 * 24;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
    /// Grace window applied to `exp` when verifying. Zero means exact expiry.
    pub leeway_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
}

/// Parse `key` if set, fall back to `default` if unset, fail on junk.
fn parsed_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parsed_or(&lookup, "APP_PORT", 8080u16)?;
        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").context("JWT_SECRET must be set")?,
            ttl_minutes: parsed_or(&lookup, "JWT_TTL_MINUTES", 60 * 24 * 60)?,
            leeway_seconds: parsed_or(&lookup, "JWT_LEEWAY_SECONDS", 0)?,
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");
        anyhow::ensure!(
            (1..=MAX_TTL_MINUTES).contains(&jwt.ttl_minutes),
            "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}"
        );
        anyhow::ensure!(
            (0..=MAX_LEEWAY_SECONDS).contains(&jwt.leeway_seconds),
            "JWT_LEEWAY_SECONDS must be between 0 and {MAX_LEEWAY_SECONDS}"
        );
        Ok(Self {
            database_url,
            host,
            port,
            jwt,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let mut env: HashMap<String, String> = HashMap::from([
            ("DATABASE_URL".into(), "postgres://localhost/conduit".into()),
            ("JWT_SECRET".into(), "s3cret".into()),
        ]);
        for (k, v) in vars {
            env.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.jwt.ttl_minutes, 86400);
        assert_eq!(cfg.jwt.leeway_seconds, 0);
        assert_eq!(cfg.bind_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn unparsable_values_are_errors() {
        assert!(load(&[("JWT_TTL_MINUTES", "sixty")]).is_err());
        assert!(load(&[("JWT_LEEWAY_SECONDS", "-")]).is_err());
        assert!(load(&[("APP_PORT", "99999")]).is_err());
    }

    #[test]
    fn ttl_and_leeway_are_bounded() {
        assert!(load(&[("JWT_TTL_MINUTES", "0")]).is_err());
        assert!(load(&[("JWT_TTL_MINUTES", "6000000000")]).is_err());
        assert!(load(&[("JWT_LEEWAY_SECONDS", "-5")]).is_err());
        assert!(load(&[("JWT_LEEWAY_SECONDS", "18446744073709551615")]).is_err());

        let cfg = load(&[("JWT_TTL_MINUTES", "60"), ("JWT_LEEWAY_SECONDS", "30")]).unwrap();
        assert_eq!(cfg.jwt.ttl_minutes, 60);
        assert_eq!(cfg.jwt.leeway_seconds, 30);
    }

    #[test]
    fn secret_is_required() {
        let env: HashMap<&str, &str> = HashMap::from([("DATABASE_URL", "postgres://localhost/conduit")]);
        assert!(AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).is_err());
        assert!(load(&[("JWT_SECRET", "")]).is_err());
    }
}
