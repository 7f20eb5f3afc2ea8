// src/db/journal_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        inventory::StockKey,
        journal::{JournalEntry, NewJournalEntry},
        supply_chain::TypeTotal,
    },
};

#[derive(Clone)]
pub struct JournalRepository {
    pool: PgPool,
}

impl JournalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Escrita (só INSERT; o trigger do banco recusa UPDATE/DELETE)
    // ---

    pub async fn append<'e, E>(&self, executor: E, entry: &NewJournalEntry) -> Result<JournalEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, JournalEntry>(
            r#"
            INSERT INTO stock_journal (
                item_id, variant_id, transaction_type, quantity, rate, affects_current,
                reference_type, reference_id, reference_no, notes, reverses_entry_id, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
            .bind(entry.key.item_id)
            .bind(entry.key.variant_id)
            .bind(entry.transaction_type)
            .bind(entry.quantity)
            .bind(entry.rate)
            .bind(entry.transaction_type.affects_current())
            .bind(entry.reference.reference_type)
            .bind(entry.reference.reference_id)
            .bind(entry.reference.reference_no.as_deref())
            .bind(entry.notes.as_deref())
            .bind(entry.reverses_entry_id)
            .bind(entry.created_by)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation()
                        && db_err.constraint().unwrap_or_default().contains("reverses_entry_id")
                    {
                        return AppError::InvalidOperation(format!(
                            "lançamento {} já foi estornado",
                            entry.reverses_entry_id.unwrap_or_default()
                        ));
                    }
                }
                e.into()
            })
    }

    // ---
    // Leitura
    // ---

    /// Mais novo primeiro. Busca `fetch` linhas com id menor que `before_id`.
    pub async fn list(&self, key: &StockKey, fetch: i64, before_id: Option<i64>) -> Result<Vec<JournalEntry>, AppError> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT * FROM stock_journal
            WHERE item_id = $1
              AND variant_id IS NOT DISTINCT FROM $2
              AND ($3::BIGINT IS NULL OR id < $3)
            ORDER BY id DESC
            LIMIT $4
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .bind(before_id)
            .bind(fetch)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    pub async fn find(&self, id: i64) -> Result<Option<JournalEntry>, AppError> {
        let entry = sqlx::query_as::<_, JournalEntry>("SELECT * FROM stock_journal WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Soma assinada dos lançamentos que mexem no físico. Deve bater com
    /// `current_quantity`.
    pub async fn sum_current_affecting<'e, E>(&self, executor: E, key: &StockKey) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0) FROM stock_journal
            WHERE item_id = $1
              AND variant_id IS NOT DISTINCT FROM $2
              AND affects_current
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_one(executor)
            .await?;

        Ok(total)
    }

    pub async fn totals_for_key<'e, E>(&self, executor: E, key: &StockKey) -> Result<Vec<TypeTotal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let totals = sqlx::query_as::<_, TypeTotal>(
            r#"
            SELECT
                transaction_type,
                COALESCE(SUM(quantity), 0) AS quantity,
                COALESCE(SUM(ABS(quantity)) FILTER (WHERE rate IS NOT NULL), 0) AS valued_quantity,
                COALESCE(SUM(ABS(quantity) * rate) FILTER (WHERE rate IS NOT NULL), 0) AS value
            FROM stock_journal
            WHERE item_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            GROUP BY transaction_type
            "#,
        )
            .bind(key.item_id)
            .bind(key.variant_id)
            .fetch_all(executor)
            .await?;

        Ok(totals)
    }

    /// Mesmos totais, somando todas as variantes do item.
    pub async fn totals_for_item<'e, E>(&self, executor: E, item_id: Uuid) -> Result<Vec<TypeTotal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let totals = sqlx::query_as::<_, TypeTotal>(
            r#"
            SELECT
                transaction_type,
                COALESCE(SUM(quantity), 0) AS quantity,
                COALESCE(SUM(ABS(quantity)) FILTER (WHERE rate IS NOT NULL), 0) AS valued_quantity,
                COALESCE(SUM(ABS(quantity) * rate) FILTER (WHERE rate IS NOT NULL), 0) AS value
            FROM stock_journal
            WHERE item_id = $1
            GROUP BY transaction_type
            "#,
        )
            .bind(item_id)
            .fetch_all(executor)
            .await?;

        Ok(totals)
    }
}
