use crate::database::DEFAULT_DATABASE_URL;
use anyhow::{bail, Result};
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LIMIT_PRODUCTS: u32 = 10;
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3 * 24 * 60 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Runtime settings, read once at startup and shared through request data
#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub port: u16,
    pub database_url: String,
    /// Page size used when a listing request has no usable `limit`
    pub limit_products: u32,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub environment: String,
}

impl ShopConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must be set to a non-empty value");
        }

        Ok(Self {
            port: parse_or_default(&lookup, "PORT", DEFAULT_PORT),
            database_url: lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            limit_products: parse_or_default(&lookup, "LIMIT_PRODUCTS", DEFAULT_LIMIT_PRODUCTS)
                .max(1),
            jwt_secret,
            access_token_ttl_secs: parse_or_default(
                &lookup,
                "ACCESS_TOKEN_TTL_SECS",
                DEFAULT_ACCESS_TOKEN_TTL_SECS,
            ),
            refresh_token_ttl_secs: parse_or_default(
                &lookup,
                "REFRESH_TOKEN_TTL_SECS",
                DEFAULT_REFRESH_TOKEN_TTL_SECS,
            ),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: "sqlite::memory:".to_string(),
            limit_products: DEFAULT_LIMIT_PRODUCTS,
            jwt_secret: "test_jwt_secret".to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            environment: "test".to_string(),
        }
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using default {}", key, raw, default);
            default
        }),
    }
}
