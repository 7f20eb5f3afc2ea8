// src/db/summary_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::supply_chain::SupplyChainSummary};

#[derive(Clone)]
pub struct SummaryRepository {
    pool: PgPool,
}

impl SummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sobrescreve a projeção da chave. Rodar duas vezes dá o mesmo resultado.
    pub async fn upsert<'e, E>(&self, executor: E, summary: &SupplyChainSummary) -> Result<SupplyChainSummary, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let saved = sqlx::query_as::<_, SupplyChainSummary>(
            r#"
            INSERT INTO supply_chain_summaries (
                item_id, variant_id, opening_stock, total_purchased, total_manufactured,
                total_consumed_in_production, total_sold, net_adjustment,
                average_purchase_rate, average_sales_rate,
                current_quantity, reserved_quantity, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (item_id, variant_id) DO UPDATE SET
                opening_stock = EXCLUDED.opening_stock,
                total_purchased = EXCLUDED.total_purchased,
                total_manufactured = EXCLUDED.total_manufactured,
                total_consumed_in_production = EXCLUDED.total_consumed_in_production,
                total_sold = EXCLUDED.total_sold,
                net_adjustment = EXCLUDED.net_adjustment,
                average_purchase_rate = EXCLUDED.average_purchase_rate,
                average_sales_rate = EXCLUDED.average_sales_rate,
                current_quantity = EXCLUDED.current_quantity,
                reserved_quantity = EXCLUDED.reserved_quantity,
                computed_at = EXCLUDED.computed_at
            RETURNING
                item_id, variant_id, opening_stock, total_purchased, total_manufactured,
                total_consumed_in_production, total_sold, net_adjustment,
                average_purchase_rate, average_sales_rate,
                current_quantity, reserved_quantity, computed_at
            "#,
        )
            .bind(summary.item_id)
            .bind(summary.variant_id)
            .bind(summary.opening_stock)
            .bind(summary.total_purchased)
            .bind(summary.total_manufactured)
            .bind(summary.total_consumed_in_production)
            .bind(summary.total_sold)
            .bind(summary.net_adjustment)
            .bind(summary.average_purchase_rate)
            .bind(summary.average_sales_rate)
            .bind(summary.current_quantity)
            .bind(summary.reserved_quantity)
            .bind(summary.computed_at)
            .fetch_one(executor)
            .await?;

        Ok(saved)
    }

    pub async fn list_for_item(&self, item_id: Uuid) -> Result<Vec<SupplyChainSummary>, AppError> {
        let rows = sqlx::query_as::<_, SupplyChainSummary>(
            r#"
            SELECT
                item_id, variant_id, opening_stock, total_purchased, total_manufactured,
                total_consumed_in_production, total_sold, net_adjustment,
                average_purchase_rate, average_sales_rate,
                current_quantity, reserved_quantity, computed_at
            FROM supply_chain_summaries
            WHERE item_id = $1
            ORDER BY variant_id NULLS FIRST
            "#,
        )
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
