// src/db/opening_stock_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::{inventory::StockKey, opening_stock::OpeningStock},
};

#[derive(Clone)]
pub struct OpeningStockRepository {
    pool: PgPool,
}

impl OpeningStockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cria ou substitui a linha da chave. Depois de semeada a linha fica
    /// congelada: o UPDATE não casa e o retorno é `None`.
    pub async fn upsert<'e, E>(
        &self,
        executor: E,
        key: &StockKey,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<Option<OpeningStock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, OpeningStock>(
            r#"
            INSERT INTO opening_stock (item_id, variant_id, opening_stock, opening_stock_rate_per_unit)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id, variant_id) DO UPDATE SET
                opening_stock = EXCLUDED.opening_stock,
                opening_stock_rate_per_unit = EXCLUDED.opening_stock_rate_per_unit,
                updated_at = now()
            WHERE opening_stock.seeded_at IS NULL
            RETURNING *
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .bind(quantity)
            .bind(rate)
            .fetch_optional(executor)
            .await?;

        Ok(row)
    }

    pub async fn find(&self, key: &StockKey) -> Result<Option<OpeningStock>, AppError> {
        let row = sqlx::query_as::<_, OpeningStock>(
            "SELECT * FROM opening_stock WHERE item_id = $1 AND variant_id IS NOT DISTINCT FROM $2",
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Trava a linha para a semeadura (só um chamador passa por vez).
    pub async fn lock<'e, E>(&self, executor: E, key: &StockKey) -> Result<Option<OpeningStock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, OpeningStock>(
            r#"
            SELECT * FROM opening_stock
            WHERE item_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            FOR UPDATE
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_optional(executor)
            .await?;

        Ok(row)
    }

    pub async fn mark_seeded<'e, E>(&self, executor: E, opening: &OpeningStock) -> Result<OpeningStock, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, OpeningStock>(
            r#"
            UPDATE opening_stock SET seeded_at = now(), updated_at = now()
            WHERE id = $1 AND seeded_at IS NULL
            RETURNING *
            "#,
        )
            .bind(opening.id)
            .fetch_optional(executor)
            .await?;

        row.ok_or_else(|| {
            AppError::ConcurrencyConflict(format!("estoque inicial de {} já foi semeado", opening.key()))
        })
    }
}
