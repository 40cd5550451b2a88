use std::net::SocketAddr;

use anyhow::Context;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret";

/// Process configuration, read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// `SCHOOLGATE_BIND`
    pub bind: SocketAddr,
    /// `JWT_SECRET`
    pub jwt_secret: String,
    /// `DATABASE_URL`; absent means in-memory stores.
    pub database_url: Option<String>,
    /// `SCHOOLGATE_ACCOUNTS_TABLE`
    pub accounts_table: String,
}

impl GatewayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = non_empty("SCHOOLGATE_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind: SocketAddr = bind
            .parse()
            .with_context(|| format!("SCHOOLGATE_BIND is not a socket address: {bind:?}"))?;

        let jwt_secret = non_empty("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        Ok(Self {
            bind,
            jwt_secret,
            database_url: non_empty("DATABASE_URL"),
            accounts_table: non_empty("SCHOOLGATE_ACCOUNTS_TABLE")
                .unwrap_or_else(|| "auth_accounts".to_string()),
        })
    }
}
