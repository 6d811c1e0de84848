use std::env;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_JWKS_REFRESH_SECS: u64 = 300;
const MIN_JWKS_REFRESH_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub issuer: String,
    pub audience: String,
    /// `None` disables JWKS fetching (dev PEM only).
    pub jwks_url: Option<String>,
    pub leeway_seconds: Option<u32>,
    pub jwks_refresh: Duration,
    pub dev_public_key_pem: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub auth: AuthSettings,
    pub allowed_origins: AllowedOrigins,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

        let host: IpAddr = var("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse()
            .context("HOST must be an IP address")?;
        let port = match var("PORT") {
            Some(value) => value.parse::<u16>().with_context(|| format!("invalid PORT '{value}'"))?,
            None => DEFAULT_PORT,
        };

        let issuer = var("JWT_ISSUER").context("JWT_ISSUER must be set")?;
        let audience = var("JWT_AUDIENCE").context("JWT_AUDIENCE must be set")?;
        let dev_public_key_pem = var("JWT_DEV_PUBLIC_KEY_PEM");
        let jwks_url = match var("JWT_JWKS_URL") {
            Some(url) => Some(url),
            None if dev_public_key_pem.is_some() => None,
            None => Some(JwtConfig::new(issuer.as_str(), audience.as_str()).default_jwks_url()),
        };
        let leeway_seconds = var("JWT_LEEWAY_SECONDS")
            .map(|value| {
                value
                    .parse::<u32>()
                    .with_context(|| format!("invalid JWT_LEEWAY_SECONDS '{value}'"))
            })
            .transpose()?;
        let refresh_secs = var("JWKS_REFRESH_SECONDS")
            .map(|value| {
                value
                    .parse::<u64>()
                    .with_context(|| format!("invalid JWKS_REFRESH_SECONDS '{value}'"))
            })
            .transpose()?
            .unwrap_or(DEFAULT_JWKS_REFRESH_SECS)
            .max(MIN_JWKS_REFRESH_SECS);

        let allowed_origins = parse_origins(var("CORS_ALLOWED_ORIGINS").as_deref())?;

        Ok(Self {
            host,
            port,
            database_url: var("DATABASE_URL"),
            auth: AuthSettings {
                issuer,
                audience,
                jwks_url,
                leeway_seconds,
                jwks_refresh: Duration::from_secs(refresh_secs),
                dev_public_key_pem,
            },
            allowed_origins,
        })
    }
}

fn parse_origins(value: Option<&str>) -> Result<AllowedOrigins> {
    let Some(value) = value else {
        return Ok(AllowedOrigins::Any);
    };
    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if origins.iter().any(|origin| origin == "*") {
        if origins.len() > 1 {
            return Err(anyhow!("CORS_ALLOWED_ORIGINS cannot mix '*' with explicit origins"));
        }
        return Ok(AllowedOrigins::Any);
    }
    if origins.is_empty() {
        return Ok(AllowedOrigins::Any);
    }
    Ok(AllowedOrigins::List(origins))
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
