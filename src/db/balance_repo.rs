// src/db/balance_repo.rs

use sqlx::{Executor, PgConnection, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::inventory::{Balance, StockKey},
};

#[derive(Clone)]
pub struct BalanceRepository {
    pool: PgPool,
}

impl BalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cria a linha zerada se ainda não existir. Nunca duplica: a unicidade
    /// de (item_id, variant_id) decide quem insere, os demais não fazem nada.
    async fn insert_if_missing<'e, E>(&self, executor: E, key: &StockKey) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO stock_balances (item_id, variant_id)
            VALUES ($1, $2)
            ON CONFLICT (item_id, variant_id) DO NOTHING
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Busca o saldo, criando-o zerado na primeira referência.
    ///
    /// São dois comandos de propósito: o SELECT precisa de um snapshot novo
    /// para enxergar a linha que outra transação acabou de inserir.
    pub async fn get_or_create(&self, conn: &mut PgConnection, key: &StockKey) -> Result<Balance, AppError> {
        self.insert_if_missing(&mut *conn, key).await?;

        let balance = sqlx::query_as::<_, Balance>(
            "SELECT * FROM stock_balances WHERE item_id = $1 AND variant_id IS NOT DISTINCT FROM $2",
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(balance)
    }

    /// Igual a `get_or_create`, mas trava a linha (FOR UPDATE) até o fim da
    /// transação. Todo read-check-write do motor passa por aqui.
    pub async fn lock(&self, conn: &mut PgConnection, key: &StockKey) -> Result<Balance, AppError> {
        self.insert_if_missing(&mut *conn, key).await?;

        let balance = sqlx::query_as::<_, Balance>(
            r#"
            SELECT * FROM stock_balances
            WHERE item_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            FOR UPDATE
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(balance)
    }

    /// Leitura sem criar a linha.
    pub async fn find<'e, E>(&self, executor: E, key: &StockKey) -> Result<Option<Balance>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let balance = sqlx::query_as::<_, Balance>(
            "SELECT * FROM stock_balances WHERE item_id = $1 AND variant_id IS NOT DISTINCT FROM $2",
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_optional(executor)
            .await?;

        Ok(balance)
    }

    pub async fn list_for_item<'e, E>(&self, executor: E, item_id: Uuid) -> Result<Vec<Balance>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let balances = sqlx::query_as::<_, Balance>(
            "SELECT * FROM stock_balances WHERE item_id = $1 ORDER BY variant_id NULLS FIRST",
        )
            .bind(item_id)
            .fetch_all(executor)
            .await?;

        Ok(balances)
    }

    pub async fn tracked_item_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT DISTINCT item_id FROM stock_balances ORDER BY item_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    /// Persiste todas as quantidades. Valida o invariante antes e usa a
    /// versão carregada como guarda otimista.
    pub async fn save<'e, E>(&self, executor: E, balance: &Balance) -> Result<Balance, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if let Err(e) = balance.check_invariants() {
            tracing::error!(key = %balance.key(), error = %e, "Saldo inconsistente recusado");
            return Err(e);
        }

        let saved = sqlx::query_as::<_, Balance>(
            r#"
            UPDATE stock_balances SET
                current_quantity = $1,
                reserved_quantity = $2,
                available_quantity = $3,
                in_transit_quantity = $4,
                average_rate = $5,
                last_received_at = $6,
                last_consumed_at = $7,
                last_sold_at = $8,
                last_synced_at = $9,
                version = version + 1,
                updated_at = now()
            WHERE id = $10 AND version = $11
            RETURNING *
            "#,
        )
            .bind(balance.current_quantity)
            .bind(balance.reserved_quantity)
            .bind(balance.available_quantity)
            .bind(balance.in_transit_quantity)
            .bind(balance.average_rate)
            .bind(balance.last_received_at)
            .bind(balance.last_consumed_at)
            .bind(balance.last_sold_at)
            .bind(balance.last_synced_at)
            .bind(balance.id)
            .bind(balance.version)
            .fetch_optional(executor)
            .await?;

        saved.ok_or_else(|| {
            AppError::ConcurrencyConflict(format!(
                "saldo {} mudou desde a leitura (versão {})",
                balance.key(),
                balance.version
            ))
        })
    }
}
