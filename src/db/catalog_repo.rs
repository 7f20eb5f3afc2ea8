// src/db/catalog_repo.rs
// Leitura do cadastro de itens. O motor nunca escreve aqui.

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};

use crate::{common::error::AppError, models::inventory::StockKey};

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn key_exists<'e, E>(&self, executor: E, key: &StockKey) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM items i
                WHERE i.id = $1
                  AND ($2::UUID IS NULL OR EXISTS (
                      SELECT 1 FROM item_variants v WHERE v.id = $2 AND v.item_id = i.id
                  ))
            )
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_one(executor)
            .await?;

        Ok(exists)
    }

    pub async fn ensure_exists<'e, E>(&self, executor: E, key: &StockKey) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if self.key_exists(executor, key).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("item/variante {}", key)))
        }
    }

    /// Limite de reposição da variante, caindo para o do item.
    /// `Err(NotFound)` se a chave não existe; `Ok(None)` se não há limite.
    pub async fn reorder_threshold(&self, key: &StockKey) -> Result<Option<Decimal>, AppError> {
        let row: Option<(Option<Decimal>,)> = sqlx::query_as(
            r#"
            SELECT COALESCE(v.reorder_level, i.reorder_level)
            FROM items i
            LEFT JOIN item_variants v ON v.id = $2 AND v.item_id = i.id
            WHERE i.id = $1 AND ($2::UUID IS NULL OR v.id IS NOT NULL)
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((threshold,)) => Ok(threshold),
            None => Err(AppError::NotFound(format!("item/variante {}", key))),
        }
    }
}
