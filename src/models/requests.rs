// src/models/requests.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::inventory::StockKey;
use super::journal::{DocumentRef, TransactionType};

// ---
// Validações Customizadas
// ---
pub(crate) fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param("exclusive_min".into(), &0.0);
        err.message = Some("A quantidade deve ser maior que zero.".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_non_zero(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_zero() {
        let mut err = ValidationError::new("non_zero");
        err.message = Some("O ajuste não pode ser zero.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Reserva, liberação e "em trânsito" compartilham o mesmo formato
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StockRequest {
    pub key: StockKey,

    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,

    #[validate(nested)]
    pub reference: DocumentRef,

    #[validate(length(max = 500))]
    pub notes: Option<String>,

    pub created_by: Option<Uuid>,
}

impl StockRequest {
    pub fn new(key: StockKey, quantity: Decimal, reference: DocumentRef) -> Self {
        Self { key, quantity, reference, notes: None, created_by: None }
    }
}

// ---
// Entrada (recebimento de compra ou conclusão de produção)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptSource {
    Purchase,
    Production,
}

impl ReceiptSource {
    pub fn transaction_type(self) -> TransactionType {
        match self {
            ReceiptSource::Purchase => TransactionType::PurchaseReceived,
            ReceiptSource::Production => TransactionType::Manufactured,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveRequest {
    pub key: StockKey,
    pub source: ReceiptSource,

    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    pub rate: Decimal,

    #[validate(nested)]
    pub reference: DocumentRef,

    #[validate(length(max = 500))]
    pub notes: Option<String>,

    pub created_by: Option<Uuid>,
}

// ---
// Saída (faturamento ou consumo na produção)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionKind {
    Invoice,
    Production,
}

impl ConsumptionKind {
    pub fn transaction_type(self) -> TransactionType {
        match self {
            ConsumptionKind::Invoice => TransactionType::SalesInvoiced,
            ConsumptionKind::Production => TransactionType::ConsumedInProduction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    pub key: StockKey,
    pub kind: ConsumptionKind,

    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,

    // Se a quantidade foi reservada antes (pedido confirmado), baixa a reserva junto.
    // Sem default no payload.
    pub from_reservation: bool,

    // Preço unitário da fatura, usado só para a média de venda
    #[validate(custom(function = "validate_not_negative"))]
    pub rate: Option<Decimal>,

    #[validate(nested)]
    pub reference: DocumentRef,

    #[validate(length(max = 500))]
    pub notes: Option<String>,

    pub created_by: Option<Uuid>,
}

// ---
// Ajuste manual (correção assinada)
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    pub key: StockKey,

    #[validate(custom(function = "validate_non_zero"))]
    pub delta: Decimal,

    #[validate(nested)]
    pub reference: DocumentRef,

    #[validate(length(min = 1, max = 500, message = "Ajustes precisam de uma justificativa."))]
    pub notes: String,

    pub created_by: Option<Uuid>,
}

// ---
// Estorno de um lançamento
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReverseRequest {
    pub entry_id: i64,

    #[validate(length(min = 1, max = 500, message = "Estornos precisam de uma justificativa."))]
    pub notes: String,

    pub created_by: Option<Uuid>,
}

// ---
// Estoque inicial
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpeningStockRequest {
    pub key: StockKey,

    #[validate(custom(function = "validate_not_negative"))]
    pub quantity: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    pub rate: Decimal,
}
