// src/services/supply_chain_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_snapshot_tx, error::AppError},
    db::{BalanceRepository, CatalogRepository, JournalRepository, SummaryRepository},
    models::{inventory::StockKey, supply_chain::SupplyChainSummary},
};

/// Agregador de leitura. Recalcula a partir do diário; nunca participa de
/// decisões de reserva.
#[derive(Clone)]
pub struct SupplyChainService {
    pool: PgPool,
    balance_repo: BalanceRepository,
    journal_repo: JournalRepository,
    catalog_repo: CatalogRepository,
    summary_repo: SummaryRepository,
}

impl SupplyChainService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            balance_repo: BalanceRepository::new(pool.clone()),
            journal_repo: JournalRepository::new(pool.clone()),
            catalog_repo: CatalogRepository::new(pool.clone()),
            summary_repo: SummaryRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn summarize_key(&self, key: StockKey) -> Result<SupplyChainSummary, AppError> {
        self.catalog_repo.ensure_exists(&self.pool, &key).await?;

        let mut tx = begin_snapshot_tx(&self.pool).await?;
        let totals = self.journal_repo.totals_for_key(&mut *tx, &key).await?;
        let balance = self.balance_repo.find(&mut *tx, &key).await?;
        tx.commit().await?;

        let (current, reserved) = balance
            .map(|b| (b.current_quantity, b.reserved_quantity))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        Ok(SupplyChainSummary::from_totals(key.item_id, key.variant_id, &totals, current, reserved, Utc::now()))
    }

    /// Consolida todas as variantes do item (o resultado não tem `variant_id`).
    pub async fn get_supply_chain_summary(&self, item_id: Uuid) -> Result<SupplyChainSummary, AppError> {
        self.catalog_repo.ensure_exists(&self.pool, &StockKey::item(item_id)).await?;

        let mut tx = begin_snapshot_tx(&self.pool).await?;
        let totals = self.journal_repo.totals_for_item(&mut *tx, item_id).await?;
        let balances = self.balance_repo.list_for_item(&mut *tx, item_id).await?;
        tx.commit().await?;

        let current: Decimal = balances.iter().map(|b| b.current_quantity).sum();
        let reserved: Decimal = balances.iter().map(|b| b.reserved_quantity).sum();

        Ok(SupplyChainSummary::from_totals(item_id, None, &totals, current, reserved, Utc::now()))
    }

    /// Recalcula e grava a projeção de cada chave do item.
    pub async fn refresh_item(&self, item_id: Uuid) -> Result<Vec<SupplyChainSummary>, AppError> {
        // 1. Lê tudo num snapshot só
        let mut snapshot = begin_snapshot_tx(&self.pool).await?;
        let balances = self.balance_repo.list_for_item(&mut *snapshot, item_id).await?;

        let mut computed = Vec::with_capacity(balances.len());
        let computed_at = Utc::now();
        for balance in &balances {
            let key = balance.key();
            let totals = self.journal_repo.totals_for_key(&mut *snapshot, &key).await?;
            computed.push(SupplyChainSummary::from_totals(
                key.item_id,
                key.variant_id,
                &totals,
                balance.current_quantity,
                balance.reserved_quantity,
                computed_at,
            ));
        }
        snapshot.commit().await?;

        // 2. Grava a projeção
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(computed.len());
        for summary in &computed {
            saved.push(self.summary_repo.upsert(&mut *tx, summary).await?);
        }
        tx.commit().await?;

        tracing::debug!(%item_id, keys = saved.len(), "Resumo de suprimentos atualizado");
        Ok(saved)
    }

    /// Atualiza todos os itens com saldo. Falha num item não interrompe os demais.
    pub async fn refresh_all(&self) -> Result<usize, AppError> {
        let item_ids = self.balance_repo.tracked_item_ids().await?;

        let mut refreshed = 0;
        for item_id in item_ids {
            match self.refresh_item(item_id).await {
                Ok(summaries) => refreshed += summaries.len(),
                Err(e) => tracing::warn!(%item_id, error = %e, "Falha ao atualizar resumo do item"),
            }
        }

        tracing::info!(keys = refreshed, "Projeção de suprimentos recalculada");
        Ok(refreshed)
    }

    pub async fn list_summaries(&self, item_id: Uuid) -> Result<Vec<SupplyChainSummary>, AppError> {
        self.summary_repo.list_for_item(item_id).await
    }
}
