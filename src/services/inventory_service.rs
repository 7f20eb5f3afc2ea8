// src/services/inventory_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::{
    common::{
        db_utils::{begin_ledger_tx, begin_snapshot_tx, retry_on_conflict},
        error::AppError,
    },
    config::LedgerPolicy,
    db::{BalanceRepository, CatalogRepository, JournalRepository},
    models::{
        inventory::{Balance, ReconciliationReport, ReleaseOutcome, ReorderStatus, StockKey},
        journal::{DocumentRef, JournalEntry, JournalListing, JournalPage, NewJournalEntry, ReferenceType, TransactionType},
        opening_stock::OpeningStock,
        requests::{AdjustmentRequest, ConsumeRequest, ConsumptionKind, ReceiveRequest, ReverseRequest, StockRequest},
    },
};

/// Motor de reservas. Único escritor de saldos e do diário.
///
/// Toda operação de escrita segue o mesmo roteiro numa transação só:
/// confere o cadastro, trava a linha do saldo, aplica a transição pura,
/// salva (invariante + versão) e grava o lançamento.
#[derive(Clone)]
pub struct InventoryService {
    pool: PgPool,
    policy: LedgerPolicy,
    balance_repo: BalanceRepository,
    journal_repo: JournalRepository,
    catalog_repo: CatalogRepository,
}

impl InventoryService {
    pub fn new(pool: PgPool, policy: LedgerPolicy) -> Self {
        Self {
            balance_repo: BalanceRepository::new(pool.clone()),
            journal_repo: JournalRepository::new(pool.clone()),
            catalog_repo: CatalogRepository::new(pool.clone()),
            pool,
            policy,
        }
    }

    pub(crate) fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    // ---
    // RESERVA (confirmação do pedido de venda)
    // ---
    pub async fn reserve(&self, req: StockRequest) -> Result<Balance, AppError> {
        req.validate()?;
        retry_on_conflict(&self.policy, "reserve", req.key, || self.try_reserve(&req)).await
    }

    async fn try_reserve(&self, req: &StockRequest) -> Result<Balance, AppError> {
        let mut tx = begin_ledger_tx(&self.pool, &self.policy).await?;

        // 1. Cadastro e trava
        self.catalog_repo.ensure_exists(&mut *tx, &req.key).await?;
        let mut balance = self.balance_repo.lock(&mut tx, &req.key).await?;

        // 2. Regra de negócio (falha aqui desfaz a transação ao sair)
        if let Err(e) = balance.reserve(req.quantity) {
            tracing::info!(
                key = %req.key,
                requested = %req.quantity,
                available = %balance.available_quantity,
                "Reserva recusada: saldo disponível insuficiente"
            );
            return Err(e);
        }

        // 3. Saldo antes, diário depois
        let saved = self.balance_repo.save(&mut *tx, &balance).await?;
        let entry = NewJournalEntry::new(req.key, TransactionType::SalesReserved, req.quantity, req.reference.clone())
            .with_notes(req.notes.clone())
            .created_by(req.created_by);
        self.journal_repo.append(&mut *tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(key = %req.key, quantity = %req.quantity, available = %saved.available_quantity, "Reserva registrada");
        Ok(saved)
    }

    // ---
    // LIBERAÇÃO (cancelamento do pedido). Idempotente: liberar além do
    // reservado só zera a reserva.
    // ---
    pub async fn release(&self, req: StockRequest) -> Result<ReleaseOutcome, AppError> {
        req.validate()?;
        retry_on_conflict(&self.policy, "release", req.key, || self.try_release(&req)).await
    }

    async fn try_release(&self, req: &StockRequest) -> Result<ReleaseOutcome, AppError> {
        let mut tx = begin_ledger_tx(&self.pool, &self.policy).await?;

        self.catalog_repo.ensure_exists(&mut *tx, &req.key).await?;
        let mut balance = self.balance_repo.lock(&mut tx, &req.key).await?;

        let released = balance.release(req.quantity);
        if released.is_zero() {
            // Nada a liberar: sem escrita e sem lançamento
            tx.commit().await?;
            tracing::debug!(key = %req.key, requested = %req.quantity, "Liberação sem reserva pendente");
            return Ok(ReleaseOutcome { balance, released });
        }

        let saved = self.balance_repo.save(&mut *tx, &balance).await?;
        let entry = NewJournalEntry::new(req.key, TransactionType::ReservationCancelled, -released, req.reference.clone())
            .with_notes(req.notes.clone())
            .created_by(req.created_by);
        self.journal_repo.append(&mut *tx, &entry).await?;

        tx.commit().await?;

        if released < req.quantity {
            tracing::warn!(key = %req.key, requested = %req.quantity, %released, "Liberação limitada ao reservado");
        } else {
            tracing::info!(key = %req.key, %released, "Reserva liberada");
        }
        Ok(ReleaseOutcome { balance: saved, released })
    }

    // ---
    // ENTRADA (recebimento de compra / conclusão de produção)
    // ---
    pub async fn receive(&self, req: ReceiveRequest) -> Result<Balance, AppError> {
        req.validate()?;
        retry_on_conflict(&self.policy, "receive", req.key, || self.try_receive(&req)).await
    }

    async fn try_receive(&self, req: &ReceiveRequest) -> Result<Balance, AppError> {
        let mut tx = begin_ledger_tx(&self.pool, &self.policy).await?;

        self.catalog_repo.ensure_exists(&mut *tx, &req.key).await?;
        let mut balance = self.balance_repo.lock(&mut tx, &req.key).await?;

        let arrived = balance.receive(req.quantity, req.rate)?;
        balance.last_received_at = Some(Utc::now());

        let saved = self.balance_repo.save(&mut *tx, &balance).await?;

        let entry = NewJournalEntry::new(req.key, req.source.transaction_type(), req.quantity, req.reference.clone())
            .with_rate(Some(req.rate))
            .with_notes(req.notes.clone())
            .created_by(req.created_by);
        self.journal_repo.append(&mut *tx, &entry).await?;

        // O que chegou deixa de estar "em trânsito"
        if arrived > Decimal::ZERO {
            let in_transit = NewJournalEntry::new(req.key, TransactionType::PurchaseInTransit, -arrived, req.reference.clone())
                .created_by(req.created_by);
            self.journal_repo.append(&mut *tx, &in_transit).await?;
        }

        tx.commit().await?;

        tracing::info!(
            key = %req.key,
            quantity = %req.quantity,
            rate = %req.rate,
            average_rate = %saved.average_rate,
            "Entrada registrada"
        );
        Ok(saved)
    }

    // ---
    // BAIXA (faturamento / consumo na produção)
    // ---
    pub async fn consume(&self, req: ConsumeRequest) -> Result<Balance, AppError> {
        req.validate()?;
        retry_on_conflict(&self.policy, "consume", req.key, || self.try_consume(&req)).await
    }

    async fn try_consume(&self, req: &ConsumeRequest) -> Result<Balance, AppError> {
        let mut tx = begin_ledger_tx(&self.pool, &self.policy).await?;

        self.catalog_repo.ensure_exists(&mut *tx, &req.key).await?;
        let mut balance = self.balance_repo.lock(&mut tx, &req.key).await?;

        let reserved_used = match balance.consume(req.quantity, req.from_reservation) {
            Ok(used) => used,
            Err(e) => {
                tracing::info!(
                    key = %req.key,
                    requested = %req.quantity,
                    current = %balance.current_quantity,
                    reserved = %balance.reserved_quantity,
                    "Baixa recusada: estoque insuficiente"
                );
                return Err(e);
            }
        };

        let now = Utc::now();
        match req.kind {
            ConsumptionKind::Invoice => {
                balance.last_sold_at = Some(now);
                balance.last_synced_at = Some(now);
            }
            ConsumptionKind::Production => balance.last_consumed_at = Some(now),
        }

        let saved = self.balance_repo.save(&mut *tx, &balance).await?;
        let entry = NewJournalEntry::new(req.key, req.kind.transaction_type(), -req.quantity, req.reference.clone())
            .with_rate(req.rate)
            .with_notes(req.notes.clone())
            .created_by(req.created_by);
        self.journal_repo.append(&mut *tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(key = %req.key, quantity = %req.quantity, %reserved_used, kind = ?req.kind, "Baixa registrada");
        Ok(saved)
    }

    // ---
    // EM TRÂNSITO (pedido de compra despachado pelo fornecedor)
    // ---
    pub async fn expect_incoming(&self, req: StockRequest) -> Result<Balance, AppError> {
        req.validate()?;
        retry_on_conflict(&self.policy, "expect_incoming", req.key, || self.try_expect_incoming(&req)).await
    }

    async fn try_expect_incoming(&self, req: &StockRequest) -> Result<Balance, AppError> {
        let mut tx = begin_ledger_tx(&self.pool, &self.policy).await?;

        self.catalog_repo.ensure_exists(&mut *tx, &req.key).await?;
        let mut balance = self.balance_repo.lock(&mut tx, &req.key).await?;

        balance.expect_incoming(req.quantity)?;

        let saved = self.balance_repo.save(&mut *tx, &balance).await?;
        let entry = NewJournalEntry::new(req.key, TransactionType::PurchaseInTransit, req.quantity, req.reference.clone())
            .with_notes(req.notes.clone())
            .created_by(req.created_by);
        self.journal_repo.append(&mut *tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(key = %req.key, quantity = %req.quantity, in_transit = %saved.in_transit_quantity, "Entrada prevista registrada");
        Ok(saved)
    }

    // ---
    // AJUSTE (correção manual assinada)
    // ---
    pub async fn adjust(&self, req: AdjustmentRequest) -> Result<Balance, AppError> {
        req.validate()?;
        retry_on_conflict(&self.policy, "adjust", req.key, || self.try_adjust(&req)).await
    }

    async fn try_adjust(&self, req: &AdjustmentRequest) -> Result<Balance, AppError> {
        let mut tx = begin_ledger_tx(&self.pool, &self.policy).await?;

        self.catalog_repo.ensure_exists(&mut *tx, &req.key).await?;
        let mut balance = self.balance_repo.lock(&mut tx, &req.key).await?;

        balance.adjust(req.delta)?;

        let saved = self.balance_repo.save(&mut *tx, &balance).await?;
        let entry = NewJournalEntry::new(req.key, TransactionType::Adjustment, req.delta, req.reference.clone())
            .with_notes(Some(req.notes.clone()))
            .created_by(req.created_by);
        self.journal_repo.append(&mut *tx, &entry).await?;

        tx.commit().await?;

        tracing::warn!(key = %req.key, delta = %req.delta, notes = %req.notes, "Ajuste de estoque aplicado");
        Ok(saved)
    }

    // ---
    // ESTORNO (ajuste compensatório de um lançamento anterior)
    // ---
    pub async fn reverse_entry(&self, req: ReverseRequest) -> Result<JournalEntry, AppError> {
        req.validate()?;

        let original = self
            .journal_repo
            .find(req.entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("lançamento {}", req.entry_id)))?;

        if !original.affects_current {
            return Err(AppError::InvalidOperation(format!(
                "lançamento {} ({:?}) não mexe no físico; use a liberação da reserva",
                original.id, original.transaction_type
            )));
        }
        if original.reverses_entry_id.is_some() {
            return Err(AppError::InvalidOperation(format!(
                "lançamento {} já é um estorno",
                original.id
            )));
        }

        let key = original.key();
        retry_on_conflict(&self.policy, "reverse_entry", key, || self.try_reverse(&original, &req)).await
    }

    async fn try_reverse(&self, original: &JournalEntry, req: &ReverseRequest) -> Result<JournalEntry, AppError> {
        let key = original.key();
        let mut tx = begin_ledger_tx(&self.pool, &self.policy).await?;

        let mut balance = self.balance_repo.lock(&mut tx, &key).await?;
        balance.adjust(-original.quantity)?;

        self.balance_repo.save(&mut *tx, &balance).await?;
        let reversal = NewJournalEntry::reversing(original, req.notes.clone(), req.created_by);
        let entry = self.journal_repo.append(&mut *tx, &reversal).await?;

        tx.commit().await?;

        tracing::warn!(%key, reversed = original.id, reversal = entry.id, quantity = %entry.quantity, "Lançamento estornado");
        Ok(entry)
    }

    // ---
    // ESTOQUE INICIAL: aplicado dentro da transação de quem chama
    // ---
    pub(crate) async fn apply_opening_stock(
        &self,
        conn: &mut PgConnection,
        opening: &OpeningStock,
        created_by: Option<uuid::Uuid>,
    ) -> Result<Balance, AppError> {
        let key = opening.key();
        let mut balance = self.balance_repo.lock(&mut *conn, &key).await?;

        if opening.opening_stock.is_zero() {
            return Ok(balance);
        }

        balance.stock_in(opening.opening_stock, opening.opening_stock_rate_per_unit)?;
        balance.last_received_at = Some(Utc::now());
        let saved = self.balance_repo.save(&mut *conn, &balance).await?;

        let entry = NewJournalEntry::new(
            key,
            TransactionType::OpeningStock,
            opening.opening_stock,
            DocumentRef::new(ReferenceType::OpeningStock, opening.id),
        )
            .with_rate(Some(opening.opening_stock_rate_per_unit))
            .created_by(created_by);
        self.journal_repo.append(&mut *conn, &entry).await?;

        Ok(saved)
    }

    // ---
    // Leituras
    // ---

    pub async fn get_balance(&self, key: StockKey) -> Result<Balance, AppError> {
        let mut conn = self.pool.acquire().await?;
        self.catalog_repo.ensure_exists(&mut *conn, &key).await?;
        self.balance_repo.get_or_create(&mut conn, &key).await
    }

    pub async fn list_journal(&self, key: StockKey, page: JournalPage) -> Result<JournalListing, AppError> {
        page.validate()?;
        let entries = self
            .journal_repo
            .list(&key, page.limit + 1, page.before_id)
            .await?;
        Ok(JournalListing::from_overfetch(entries, page.limit))
    }

    /// Só leitura. Compara o disponível com o limite de reposição da
    /// variante (ou do item).
    pub async fn check_reorder_point(&self, key: StockKey) -> Result<ReorderStatus, AppError> {
        let threshold = self.catalog_repo.reorder_threshold(&key).await?;
        let balance = self
            .balance_repo
            .find(&self.pool, &key)
            .await?
            .unwrap_or_else(|| Balance::zeroed(key));

        let status = ReorderStatus::evaluate(&balance, threshold);
        if status.below_threshold {
            tracing::info!(%key, deficit = %status.deficit, "Abaixo do ponto de reposição");
        }
        Ok(status)
    }

    /// Reconstrói o físico a partir do diário e compara com o saldo, no
    /// mesmo snapshot.
    pub async fn reconcile(&self, key: StockKey) -> Result<ReconciliationReport, AppError> {
        let mut tx = begin_snapshot_tx(&self.pool).await?;

        let balance = self
            .balance_repo
            .find(&mut *tx, &key)
            .await?
            .unwrap_or_else(|| Balance::zeroed(key));
        let journal_total = self.journal_repo.sum_current_affecting(&mut *tx, &key).await?;

        tx.commit().await?;

        let report = ReconciliationReport::new(&balance, journal_total);
        if !report.in_sync() {
            tracing::error!(
                %key,
                current = %report.current_quantity,
                journal = %report.journal_total,
                drift = %report.drift,
                "Saldo divergente do diário"
            );
        }
        Ok(report)
    }
}
