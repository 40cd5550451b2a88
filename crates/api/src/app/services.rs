use tracing::warn;

use schoolgate_auth::RoutePolicy;
use schoolgate_infra::{AccessGateway, GatewayStores, InMemoryStores};

use crate::config::GatewayConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct AppServices {
    pub gateway: AccessGateway,
}

impl AppServices {
    pub fn new(stores: GatewayStores) -> Self {
        Self {
            gateway: AccessGateway::new(stores, RoutePolicy::default()),
        }
    }
}

/// In-memory wiring (dev/test). The concrete stores are returned for seeding.
pub fn in_memory_services() -> (AppServices, InMemoryStores) {
    let stores = InMemoryStores::new();
    (AppServices::new(stores.stores()), stores)
}

/// Pick the store backend from configuration.
pub async fn build_services(config: &GatewayConfig) -> anyhow::Result<AppServices> {
    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set; using in-memory stores (data is lost on restart)");
        return Ok(in_memory_services().0);
    };

    #[cfg(feature = "postgres")]
    {
        use anyhow::Context;
        use schoolgate_infra::store::postgres;
        use tracing::info;

        let pool = postgres::connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        postgres::ensure_schema(&pool)
            .await
            .context("failed to prepare gateway tables")?;
        let stores = postgres::stores(pool, &config.accounts_table)
            .context("invalid SCHOOLGATE_ACCOUNTS_TABLE")?;
        info!(accounts_table = %config.accounts_table, "using Postgres-backed stores");
        Ok(AppServices::new(stores))
    }

    #[cfg(not(feature = "postgres"))]
    {
        let _ = database_url;
        warn!("DATABASE_URL set but postgres feature not enabled, falling back to in-memory");
        Ok(in_memory_services().0)
    }
}
