// src/services/opening_stock_service.rs

use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::{begin_ledger_tx, retry_on_conflict},
        error::AppError,
    },
    db::{CatalogRepository, OpeningStockRepository},
    models::{
        inventory::{Balance, StockKey},
        opening_stock::OpeningStock,
        requests::OpeningStockRequest,
    },
};

#[derive(Clone)]
pub struct OpeningStockService {
    pool: PgPool,
    inventory: super::InventoryService,
    opening_repo: OpeningStockRepository,
    catalog_repo: CatalogRepository,
}

impl OpeningStockService {
    pub fn new(pool: PgPool, inventory: super::InventoryService) -> Self {
        Self {
            opening_repo: OpeningStockRepository::new(pool.clone()),
            catalog_repo: CatalogRepository::new(pool.clone()),
            pool,
            inventory,
        }
    }

    /// Grava (ou substitui) o estoque inicial. Não mexe em saldo nem diário.
    pub async fn set_opening_stock(&self, req: OpeningStockRequest) -> Result<OpeningStock, AppError> {
        req.validate()?;

        self.catalog_repo.ensure_exists(&self.pool, &req.key).await?;

        let row = self
            .opening_repo
            .upsert(&self.pool, &req.key, req.quantity, req.rate)
            .await?
            .ok_or_else(|| {
                AppError::InvalidOperation(format!(
                    "estoque inicial de {} já foi aplicado; corrija com um ajuste",
                    req.key
                ))
            })?;

        tracing::info!(key = %req.key, quantity = %row.opening_stock, rate = %row.opening_stock_rate_per_unit, "Estoque inicial definido");
        Ok(row)
    }

    pub async fn get_opening_stock(&self, key: StockKey) -> Result<Option<OpeningStock>, AppError> {
        self.opening_repo.find(&key).await
    }

    /// Ativação do item: aplica o estoque inicial ao saldo uma única vez.
    pub async fn seed_balance(&self, key: StockKey, created_by: Option<Uuid>) -> Result<Balance, AppError> {
        retry_on_conflict(self.inventory.policy(), "seed_balance", key, || self.try_seed(key, created_by)).await
    }

    async fn try_seed(&self, key: StockKey, created_by: Option<Uuid>) -> Result<Balance, AppError> {
        let mut tx = begin_ledger_tx(&self.pool, self.inventory.policy()).await?;

        // 1. Trava a linha do estoque inicial (serializa ativações concorrentes)
        self.catalog_repo.ensure_exists(&mut *tx, &key).await?;
        let opening = self
            .opening_repo
            .lock(&mut *tx, &key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("estoque inicial de {}", key)))?;

        if opening.is_seeded() {
            return Err(AppError::InvalidOperation(format!("estoque inicial de {} já foi aplicado", key)));
        }

        // 2. Saldo + diário, depois o carimbo
        let balance = self.inventory.apply_opening_stock(&mut tx, &opening, created_by).await?;
        self.opening_repo.mark_seeded(&mut *tx, &opening).await?;

        tx.commit().await?;

        tracing::info!(%key, quantity = %opening.opening_stock, "✅ Estoque inicial aplicado ao saldo");
        Ok(balance)
    }
}
