// src/common/error.rs

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    // Resultado de negócio esperado, não é falha de sistema.
    #[error("Estoque insuficiente: solicitado {requested}, disponível {available}")]
    InsufficientInventory { requested: Decimal, available: Decimal },

    // O invariante do saldo seria violado. Indica bug ou dado corrompido.
    #[error("Inconsistência no saldo de estoque: {0}")]
    Consistency(String),

    // Timeout de lock, deadlock ou versão divergente. Pode ser repetido do zero.
    #[error("Conflito de concorrência: {0}")]
    ConcurrencyConflict(String),

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Operação inválida: {0}")]
    InvalidOperation(String),

    // Sem `#[from]`: a conversão classifica o SQLSTATE antes (ver abaixo).
    #[error("Erro de banco de dados")]
    DatabaseError(#[source] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

// SQLSTATEs do Postgres que tratamos de forma especial
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const CHECK_VIOLATION: &str = "23514";

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            match db_err.code().as_deref() {
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(LOCK_NOT_AVAILABLE) => {
                    return AppError::ConcurrencyConflict(db_err.message().to_string());
                }
                Some(CHECK_VIOLATION) => {
                    let constraint = db_err.constraint().unwrap_or_default().to_string();
                    return AppError::Consistency(format!("constraint {} violada", constraint));
                }
                _ => {}
            }
        }
        AppError::DatabaseError(e)
    }
}

/// Visão do erro entregue aos colaboradores (workflows de pedido, alertas).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            AppError::Consistency(_) => "CONSISTENCY_ERROR",
            AppError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidOperation(_) => "INVALID_OPERATION",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    /// Só conflitos de concorrência são seguros para repetir automaticamente.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }

    /// Erros de negócio e de entrada voltam com a mensagem; inconsistências e
    /// falhas de infraestrutura viram uma resposta opaca com correlation id.
    pub fn report(&self) -> ErrorReport {
        match self {
            AppError::Consistency(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_) => {
                let correlation_id = Uuid::new_v4();
                tracing::error!(%correlation_id, code = self.code(), error = ?self, "Erro Interno do Servidor");
                ErrorReport {
                    code: self.code(),
                    message: "Ocorreu um erro inesperado.".to_string(),
                    retryable: false,
                    correlation_id: Some(correlation_id),
                }
            }
            e => ErrorReport {
                code: e.code(),
                message: e.to_string(),
                retryable: e.is_retryable(),
                correlation_id: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(AppError::ConcurrencyConflict("lock timeout".into()).is_retryable());
        assert!(!AppError::Consistency("x".into()).is_retryable());
        assert!(!AppError::NotFound("item".into()).is_retryable());
        assert!(
            !AppError::InsufficientInventory {
                requested: Decimal::from(80),
                available: Decimal::from(70),
            }
            .is_retryable()
        );
    }

    #[test]
    fn insufficient_inventory_report_keeps_the_numbers() {
        let report = AppError::InsufficientInventory {
            requested: Decimal::from(80),
            available: Decimal::from(70),
        }
        .report();

        assert_eq!(report.code, "INSUFFICIENT_INVENTORY");
        assert!(report.message.contains("80"));
        assert!(report.message.contains("70"));
        assert!(report.correlation_id.is_none());
    }

    #[test]
    fn consistency_report_is_opaque() {
        let report = AppError::Consistency("available != current - reserved".into()).report();

        assert_eq!(report.code, "CONSISTENCY_ERROR");
        assert!(!report.message.contains("available"));
        assert!(report.correlation_id.is_some());
    }

    #[test]
    fn non_database_sqlx_errors_stay_infrastructure() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::DatabaseError(_)));
        assert!(!err.is_retryable());
    }
}
