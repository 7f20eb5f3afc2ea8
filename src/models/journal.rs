// src/models/journal.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::inventory::StockKey;

// --- Tipos de Transação ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_transaction_type", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum TransactionType {
    OpeningStock,         // Vira "OPENING_STOCK"
    PurchaseInTransit,    // Vira "PURCHASE_IN_TRANSIT"
    PurchaseReceived,     // Vira "PURCHASE_RECEIVED"
    Manufactured,
    SalesReserved,
    ReservationCancelled,
    SalesInvoiced,
    ConsumedInProduction,
    Adjustment,
}

impl TransactionType {
    /// Lançamentos que mexem só em reservado/em trânsito ficam fora da
    /// soma que reconstrói `current_quantity`.
    pub fn affects_current(self) -> bool {
        !matches!(
            self,
            TransactionType::SalesReserved
                | TransactionType::ReservationCancelled
                | TransactionType::PurchaseInTransit
        )
    }
}

// --- Documento de Origem ---
// União fechada em vez de string livre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_reference_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    SalesOrder,
    Invoice,
    PurchaseOrder,
    ProductionOrder,
    OpeningStock,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,

    #[validate(length(min = 1, max = 64, message = "O número do documento deve ter entre 1 e 64 caracteres."))]
    pub reference_no: Option<String>,
}

impl DocumentRef {
    pub fn new(reference_type: ReferenceType, reference_id: Uuid) -> Self {
        Self { reference_type, reference_id, reference_no: None }
    }

    pub fn numbered(reference_type: ReferenceType, reference_id: Uuid, reference_no: impl Into<String>) -> Self {
        Self { reference_type, reference_id, reference_no: Some(reference_no.into()) }
    }
}

// --- LANÇAMENTO (Histórico imutável) ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: i64,
    pub item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub quantity: Decimal, // Assinado: + entra, - sai
    pub rate: Option<Decimal>,
    pub affects_current: bool,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub reference_no: Option<String>,
    pub notes: Option<String>,
    pub reverses_entry_id: Option<i64>, // Estorno: aponta o lançamento desfeito
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl JournalEntry {
    pub fn key(&self) -> StockKey {
        StockKey { item_id: self.item_id, variant_id: self.variant_id }
    }
}

/// Lançamento ainda não gravado. `id` e `created_at` vêm do banco.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJournalEntry {
    pub key: StockKey,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub rate: Option<Decimal>,
    pub reference: DocumentRef,
    pub notes: Option<String>,
    pub reverses_entry_id: Option<i64>,
    pub created_by: Option<Uuid>,
}

impl NewJournalEntry {
    pub fn new(key: StockKey, transaction_type: TransactionType, quantity: Decimal, reference: DocumentRef) -> Self {
        Self {
            key,
            transaction_type,
            quantity,
            rate: None,
            reference,
            notes: None,
            reverses_entry_id: None,
            created_by: None,
        }
    }

    /// Ajuste compensatório de `original`: quantidade com sinal trocado e o
    /// mesmo documento de origem. O vínculo com o lançamento desfeito fica em
    /// `reverses_entry_id`, que o banco mantém único.
    pub fn reversing(original: &JournalEntry, notes: String, created_by: Option<Uuid>) -> Self {
        Self {
            key: original.key(),
            transaction_type: TransactionType::Adjustment,
            quantity: -original.quantity,
            rate: original.rate,
            reference: DocumentRef {
                reference_type: original.reference_type,
                reference_id: original.reference_id,
                reference_no: original.reference_no.clone(),
            },
            notes: Some(notes),
            reverses_entry_id: Some(original.id),
            created_by,
        }
    }

    pub fn with_rate(mut self, rate: Option<Decimal>) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn created_by(mut self, user_id: Option<Uuid>) -> Self {
        self.created_by = user_id;
        self
    }
}

// --- Paginação (keyset, do mais novo para o mais antigo) ---
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JournalPage {
    #[validate(range(min = 1, max = 500, message = "O limite deve estar entre 1 e 500."))]
    pub limit: i64,

    // Cursor: retorna só lançamentos com id menor que este
    pub before_id: Option<i64>,
}

impl Default for JournalPage {
    fn default() -> Self {
        Self { limit: 50, before_id: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalListing {
    pub entries: Vec<JournalEntry>,
    pub next_cursor: Option<i64>,
}

impl JournalListing {
    /// `entries` foi buscado com `limit + 1` linhas; a sobra indica que há próxima página.
    pub fn from_overfetch(mut entries: Vec<JournalEntry>, limit: i64) -> Self {
        let limit = usize::try_from(limit).unwrap_or(0);
        let has_more = entries.len() > limit;
        entries.truncate(limit);
        let next_cursor = if has_more { entries.last().map(|e| e.id) } else { None };
        Self { entries, next_cursor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn entry(id: i64) -> JournalEntry {
        JournalEntry {
            id,
            item_id: Uuid::nil(),
            variant_id: None,
            transaction_type: TransactionType::SalesReserved,
            quantity: Decimal::ONE,
            rate: None,
            affects_current: false,
            reference_type: ReferenceType::SalesOrder,
            reference_id: Uuid::nil(),
            reference_no: Some("SO-1".into()),
            notes: None,
            reverses_entry_id: None,
            created_at: Utc::now(),
            created_by: None,
        }
    }

    #[test]
    fn reservation_entries_do_not_affect_current() {
        assert!(!TransactionType::SalesReserved.affects_current());
        assert!(!TransactionType::ReservationCancelled.affects_current());
        assert!(!TransactionType::PurchaseInTransit.affects_current());
        assert!(TransactionType::SalesInvoiced.affects_current());
        assert!(TransactionType::Adjustment.affects_current());
        assert!(TransactionType::OpeningStock.affects_current());
    }

    #[test]
    fn overfetch_yields_cursor_only_when_more_rows_exist() {
        let listing = JournalListing::from_overfetch(vec![entry(9), entry(8), entry(7)], 2);
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.next_cursor, Some(8));

        let listing = JournalListing::from_overfetch(vec![entry(9), entry(8)], 2);
        assert_eq!(listing.next_cursor, None);
    }

    #[test]
    fn reversal_negates_quantity_and_links_original() {
        let mut original = entry(42);
        original.transaction_type = TransactionType::SalesInvoiced;
        original.quantity = Decimal::from(-5);
        original.reference_type = ReferenceType::Invoice;
        original.reference_id = Uuid::new_v4();
        original.reference_no = Some("INV-7".into());

        let reversal = NewJournalEntry::reversing(&original, "fatura cancelada".into(), None);
        assert_eq!(reversal.quantity, Decimal::from(5));
        assert_eq!(reversal.transaction_type, TransactionType::Adjustment);
        assert_eq!(reversal.reverses_entry_id, Some(42));
        // Continua apontando para a fatura; o lançamento desfeito vem do vínculo
        assert_eq!(reversal.reference.reference_type, ReferenceType::Invoice);
        assert_eq!(reversal.reference.reference_id, original.reference_id);
        assert_eq!(reversal.reference.reference_no.as_deref(), Some("INV-7"));
    }

    #[test]
    fn page_limit_is_bounded() {
        assert!(JournalPage::default().validate().is_ok());
        assert!(JournalPage { limit: 0, before_id: None }.validate().is_err());
        assert!(JournalPage { limit: 501, before_id: None }.validate().is_err());
    }

    #[test]
    fn empty_reference_number_is_rejected() {
        let doc = DocumentRef::numbered(ReferenceType::SalesOrder, Uuid::new_v4(), "");
        assert!(doc.validate().is_err());
        assert!(DocumentRef::new(ReferenceType::SalesOrder, Uuid::new_v4()).validate().is_ok());
    }
}
