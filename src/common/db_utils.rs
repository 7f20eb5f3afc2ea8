use std::future::Future;

use sqlx::{PgPool, Postgres, Transaction};

use crate::common::error::AppError;
use crate::config::LedgerPolicy;
use crate::models::StockKey;

// ---
// Helper de Transação: a "trava" com prazo
// ---
/// Abre uma transação de escrita e define o `lock_timeout` local, para que
/// uma chave disputada vire erro de conflito em vez de espera infinita.
pub(crate) async fn begin_ledger_tx(
    pool: &PgPool,
    policy: &LedgerPolicy,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // 1. Abre a transação
    // O operador '?' converte sqlx::Error -> AppError (classificando o SQLSTATE)
    let mut tx = pool.begin().await?;

    // 2. Define o prazo de espera por locks (vale só até o fim da transação)
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", policy.lock_timeout.as_millis()))
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

/// Transação só de leitura com snapshot único, para leituras que cruzam
/// saldo e diário sem ver escritas pela metade.
pub(crate) async fn begin_snapshot_tx(pool: &PgPool) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

/// Repete a operação inteira enquanto ela falhar com conflito de concorrência,
/// até `policy.conflict_retries` vezes. Como a transação anterior foi
/// desfeita, cada tentativa recomeça do zero.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    policy: &LedgerPolicy,
    operation: &'static str,
    key: StockKey,
    mut attempt_fn: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match attempt_fn().await {
            Err(e) if e.is_retryable() && attempt < policy.conflict_retries => {
                attempt += 1;
                tracing::warn!(operation, %key, attempt, error = %e, "Conflito de concorrência, repetindo");
                tokio::time::sleep(policy.retry_backoff * attempt).await;
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(operation, %key, attempts = attempt + 1, "Conflito persistente, desistindo");
                return Err(e);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    fn policy(retries: u32) -> LedgerPolicy {
        LedgerPolicy {
            lock_timeout: Duration::from_millis(100),
            conflict_retries: retries,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let calls = &AtomicU32::new(0);
        let result = retry_on_conflict(&policy(3), "reserve", StockKey::item(Uuid::nil()), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::ConcurrencyConflict("lock timeout".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_configured_retries() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_on_conflict(&policy(2), "reserve", StockKey::item(Uuid::nil()), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::ConcurrencyConflict("deadlock".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::ConcurrencyConflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn business_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_on_conflict(&policy(5), "reserve", StockKey::item(Uuid::nil()), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::NotFound("item".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
