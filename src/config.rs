// src/config.rs

use std::{env, str::FromStr, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::services::{InventoryService, OpeningStockService, SupplyChainService};

/// Regras de concorrência do motor de reservas.
#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    pub lock_timeout: Duration,
    pub conflict_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            conflict_retries: 3,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub policy: LedgerPolicy,
    pub summary_refresh_interval: Duration,
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} inválida: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Lê as configurações do ambiente (e do `.env`, se existir).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let defaults = LedgerPolicy::default();

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            acquire_timeout: Duration::from_secs(env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 3)?),
            policy: LedgerPolicy {
                lock_timeout: Duration::from_millis(env_or("STOCK_LOCK_TIMEOUT_MS", 2000)?),
                conflict_retries: env_or("STOCK_CONFLICT_RETRIES", defaults.conflict_retries)?,
                retry_backoff: defaults.retry_backoff,
            },
            summary_refresh_interval: Duration::from_secs(env_or("SUMMARY_REFRESH_SECS", 300)?),
        })
    }
}

// O estado compartilhado, montado uma vez na inicialização e passado adiante
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Settings,
    pub inventory_service: InventoryService,
    pub opening_stock_service: OpeningStockService,
    pub supply_chain_service: SupplyChainService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        let settings = Settings::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::with_pool(db_pool, settings))
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_pool(db_pool: PgPool, settings: Settings) -> Self {
        let inventory_service = InventoryService::new(db_pool.clone(), settings.policy.clone());
        let opening_stock_service = OpeningStockService::new(db_pool.clone(), inventory_service.clone());
        let supply_chain_service = SupplyChainService::new(db_pool.clone());

        Self {
            db_pool,
            settings,
            inventory_service,
            opening_stock_service,
            supply_chain_service,
        }
    }
}
