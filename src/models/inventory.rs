// src/models/inventory.rs

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::error::AppError;

// --- 1. Chave de Estoque ---
// Identidade composta (item, variante?). Itens sem variante usam `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    pub item_id: Uuid,
    pub variant_id: Option<Uuid>,
}

impl StockKey {
    pub fn item(item_id: Uuid) -> Self {
        Self { item_id, variant_id: None }
    }

    pub fn variant(item_id: Uuid, variant_id: Uuid) -> Self {
        Self { item_id, variant_id: Some(variant_id) }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant_id {
            Some(variant_id) => write!(f, "{}/{}", self.item_id, variant_id),
            None => write!(f, "{}", self.item_id),
        }
    }
}

// --- 2. Saldo ---
// Uma linha por StockKey. Representa a tabela 'stock_balances'.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub id: Uuid,
    pub item_id: Uuid,
    pub variant_id: Option<Uuid>,

    pub current_quantity: Decimal,   // Quantidade FÍSICA
    pub reserved_quantity: Decimal,  // Prometida a pedidos abertos
    pub available_quantity: Decimal, // current - reserved
    pub in_transit_quantity: Decimal,

    pub average_rate: Decimal, // Custo médio ponderado

    // Guarda otimista, incrementada a cada save
    pub version: i64,

    pub last_received_at: Option<DateTime<Utc>>,
    pub last_consumed_at: Option<DateTime<Utc>>,
    pub last_sold_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn out_of_range() -> AppError {
    AppError::InvalidOperation("quantidade/valor fora do intervalo suportado".into())
}

/// Custo médio ponderado por quantidade após uma entrada.
/// Estouro da faixa do `Decimal` vira erro, nunca pânico.
pub fn weighted_average_rate(
    current_qty: Decimal,
    current_avg: Decimal,
    incoming_qty: Decimal,
    incoming_rate: Decimal,
) -> Result<Decimal, AppError> {
    let total_current_value = current_qty.checked_mul(current_avg).ok_or_else(out_of_range)?;
    let total_incoming_value = incoming_qty.checked_mul(incoming_rate).ok_or_else(out_of_range)?;
    let new_total_qty = current_qty.checked_add(incoming_qty).ok_or_else(out_of_range)?;

    if new_total_qty <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    total_current_value
        .checked_add(total_incoming_value)
        .and_then(|total| total.checked_div(new_total_qty))
        .ok_or_else(out_of_range)
}

impl Balance {
    /// Saldo zerado, como o banco cria na primeira referência à chave.
    pub fn zeroed(key: StockKey) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            item_id: key.item_id,
            variant_id: key.variant_id,
            current_quantity: Decimal::ZERO,
            reserved_quantity: Decimal::ZERO,
            available_quantity: Decimal::ZERO,
            in_transit_quantity: Decimal::ZERO,
            average_rate: Decimal::ZERO,
            version: 0,
            last_received_at: None,
            last_consumed_at: None,
            last_sold_at: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey { item_id: self.item_id, variant_id: self.variant_id }
    }

    pub fn check_invariants(&self) -> Result<(), AppError> {
        if self.available_quantity != self.current_quantity - self.reserved_quantity {
            return Err(AppError::Consistency(format!(
                "{}: available {} != current {} - reserved {}",
                self.key(),
                self.available_quantity,
                self.current_quantity,
                self.reserved_quantity
            )));
        }
        let negatives = [
            ("current", self.current_quantity),
            ("reserved", self.reserved_quantity),
            ("available", self.available_quantity),
            ("in_transit", self.in_transit_quantity),
            ("average_rate", self.average_rate),
        ];
        if let Some((field, value)) = negatives.iter().find(|(_, v)| *v < Decimal::ZERO) {
            return Err(AppError::Consistency(format!("{}: {} negativo ({})", self.key(), field, value)));
        }
        Ok(())
    }

    fn sync_available(&mut self) {
        self.available_quantity = self.current_quantity - self.reserved_quantity;
    }

    // ---
    // Transições puras. O serviço trava a linha, aplica uma destas e persiste.
    // ---

    pub fn reserve(&mut self, quantity: Decimal) -> Result<(), AppError> {
        if self.available_quantity < quantity {
            return Err(AppError::InsufficientInventory {
                requested: quantity,
                available: self.available_quantity,
            });
        }
        self.reserved_quantity += quantity;
        self.sync_available();
        Ok(())
    }

    /// Libera até `quantity`, limitado ao reservado. Retorna o que foi liberado.
    pub fn release(&mut self, quantity: Decimal) -> Decimal {
        let released = quantity.min(self.reserved_quantity);
        self.reserved_quantity -= released;
        self.sync_available();
        released
    }

    /// Soma ao físico recalculando o custo médio. Base de toda entrada valorada.
    /// Em caso de estouro o saldo fica intacto.
    pub fn stock_in(&mut self, quantity: Decimal, rate: Decimal) -> Result<(), AppError> {
        let average_rate = weighted_average_rate(self.current_quantity, self.average_rate, quantity, rate)?;
        let current_quantity = self.current_quantity.checked_add(quantity).ok_or_else(out_of_range)?;

        self.average_rate = average_rate;
        self.current_quantity = current_quantity;
        self.sync_available();
        Ok(())
    }

    /// Entrada física. Retorna quanto saiu de "em trânsito".
    pub fn receive(&mut self, quantity: Decimal, rate: Decimal) -> Result<Decimal, AppError> {
        self.stock_in(quantity, rate)?;
        let arrived = quantity.min(self.in_transit_quantity);
        self.in_transit_quantity -= arrived;
        Ok(arrived)
    }

    /// Baixa física. Com `from_reservation`, consome primeiro a reserva
    /// (nunca abaixo de zero). Retorna quanto da reserva foi consumido.
    pub fn consume(&mut self, quantity: Decimal, from_reservation: bool) -> Result<Decimal, AppError> {
        let reserved_used = if from_reservation {
            quantity.min(self.reserved_quantity)
        } else {
            Decimal::ZERO
        };
        let unreserved = quantity - reserved_used;
        if unreserved > self.available_quantity {
            return Err(AppError::InsufficientInventory {
                requested: quantity,
                available: self.available_quantity + reserved_used,
            });
        }
        self.reserved_quantity -= reserved_used;
        self.current_quantity -= quantity;
        self.sync_available();
        Ok(reserved_used)
    }

    pub fn expect_incoming(&mut self, quantity: Decimal) -> Result<(), AppError> {
        self.in_transit_quantity = self.in_transit_quantity.checked_add(quantity).ok_or_else(out_of_range)?;
        Ok(())
    }

    /// Correção assinada do físico. Uma baixa não pode consumir estoque reservado.
    pub fn adjust(&mut self, delta: Decimal) -> Result<(), AppError> {
        if delta < Decimal::ZERO && -delta > self.available_quantity {
            return Err(AppError::InsufficientInventory {
                requested: -delta,
                available: self.available_quantity,
            });
        }
        self.current_quantity = self.current_quantity.checked_add(delta).ok_or_else(out_of_range)?;
        self.sync_available();
        Ok(())
    }
}

/// Resultado da liberação: o saldo final e quanto de fato saiu da reserva.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOutcome {
    pub balance: Balance,
    pub released: Decimal,
}

// --- 3. Ponto de Reposição ---
// Política: compara `available_quantity` (o que ainda pode ser vendido) com o limite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderStatus {
    pub item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub threshold: Option<Decimal>,
    pub available_quantity: Decimal,
    pub below_threshold: bool,
    pub deficit: Decimal,
}

impl ReorderStatus {
    pub fn evaluate(balance: &Balance, threshold: Option<Decimal>) -> Self {
        let available = balance.available_quantity;
        let (below_threshold, deficit) = match threshold {
            Some(limit) if available < limit => (true, limit - available),
            _ => (false, Decimal::ZERO),
        };
        Self {
            item_id: balance.item_id,
            variant_id: balance.variant_id,
            threshold,
            available_quantity: available,
            below_threshold,
            deficit,
        }
    }
}

// --- 4. Conciliação ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub journal_total: Decimal,
    pub current_quantity: Decimal,
    pub drift: Decimal,
}

impl ReconciliationReport {
    pub fn new(balance: &Balance, journal_total: Decimal) -> Self {
        Self {
            item_id: balance.item_id,
            variant_id: balance.variant_id,
            journal_total,
            current_quantity: balance.current_quantity,
            drift: balance.current_quantity - journal_total,
        }
    }

    pub fn in_sync(&self) -> bool {
        self.drift.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn balance_with(current: &str, reserved: &str) -> Balance {
        let mut b = Balance::zeroed(StockKey::item(Uuid::new_v4()));
        b.current_quantity = dec(current);
        b.reserved_quantity = dec(reserved);
        b.available_quantity = b.current_quantity - b.reserved_quantity;
        b
    }

    #[test]
    fn scenario_a_reserve_moves_available_to_reserved() {
        let mut b = balance_with("100", "0");
        b.reserve(dec("30")).unwrap();

        assert_eq!(b.current_quantity, dec("100"));
        assert_eq!(b.reserved_quantity, dec("30"));
        assert_eq!(b.available_quantity, dec("70"));
        b.check_invariants().unwrap();
    }

    #[test]
    fn scenario_b_reserve_beyond_available_is_rejected_without_change() {
        let mut b = balance_with("100", "30");
        let before = b.clone();

        let err = b.reserve(dec("80")).unwrap_err();
        match err {
            AppError::InsufficientInventory { requested, available } => {
                assert_eq!(requested, dec("80"));
                assert_eq!(available, dec("70"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(b, before);
    }

    #[test]
    fn scenario_c_consume_reserved_stock() {
        let mut b = balance_with("100", "30");
        let used = b.consume(dec("30"), true).unwrap();

        assert_eq!(used, dec("30"));
        assert_eq!(b.current_quantity, dec("70"));
        assert_eq!(b.reserved_quantity, dec("0"));
        assert_eq!(b.available_quantity, dec("70"));
    }

    #[test]
    fn scenario_d_receive_updates_weighted_average() {
        let mut b = balance_with("0", "0");
        b.receive(dec("50"), dec("10.0")).unwrap();
        assert_eq!(b.current_quantity, dec("50"));
        assert_eq!(b.average_rate, dec("10"));

        b.receive(dec("50"), dec("20.0")).unwrap();
        assert_eq!(b.current_quantity, dec("100"));
        assert_eq!(b.average_rate, dec("15"));
    }

    #[test]
    fn release_is_clamped_to_reserved() {
        let mut b = balance_with("100", "30");

        assert_eq!(b.release(dec("30")), dec("30"));
        assert_eq!(b.release(dec("30")), Decimal::ZERO);
        assert_eq!(b.reserved_quantity, Decimal::ZERO);
        assert_eq!(b.available_quantity, dec("100"));
    }

    #[test]
    fn consume_without_reservation_cannot_touch_reserved_stock() {
        let mut b = balance_with("100", "30");

        assert!(b.consume(dec("71"), false).is_err());
        b.consume(dec("70"), false).unwrap();
        assert_eq!(b.current_quantity, dec("30"));
        assert_eq!(b.reserved_quantity, dec("30"));
        assert_eq!(b.available_quantity, Decimal::ZERO);
    }

    #[test]
    fn consume_more_than_reserved_draws_the_rest_from_available() {
        let mut b = balance_with("100", "30");
        let used = b.consume(dec("50"), true).unwrap();

        assert_eq!(used, dec("30"));
        assert_eq!(b.current_quantity, dec("50"));
        assert_eq!(b.available_quantity, dec("50"));
    }

    #[test]
    fn receive_clears_in_transit_up_to_received() {
        let mut b = balance_with("0", "0");
        b.expect_incoming(dec("40")).unwrap();

        assert_eq!(b.receive(dec("25"), dec("2")).unwrap(), dec("25"));
        assert_eq!(b.receive(dec("25"), dec("2")).unwrap(), dec("15"));
        assert_eq!(b.in_transit_quantity, Decimal::ZERO);
    }

    #[test]
    fn opening_stock_entry_leaves_in_transit_alone() {
        let mut b = balance_with("0", "0");
        b.expect_incoming(dec("10")).unwrap();
        b.stock_in(dec("25"), dec("4")).unwrap();

        assert_eq!(b.current_quantity, dec("25"));
        assert_eq!(b.average_rate, dec("4"));
        assert_eq!(b.in_transit_quantity, dec("10"));
    }

    #[test]
    fn negative_adjustment_cannot_exceed_available() {
        let mut b = balance_with("10", "4");

        assert!(b.adjust(dec("-7")).is_err());
        b.adjust(dec("-6")).unwrap();
        assert_eq!(b.current_quantity, dec("4"));
        assert_eq!(b.available_quantity, Decimal::ZERO);
    }

    #[test]
    fn invariant_check_rejects_drifted_available() {
        let mut b = balance_with("10", "4");
        b.available_quantity = dec("7");
        assert!(matches!(b.check_invariants(), Err(AppError::Consistency(_))));

        let mut b = balance_with("10", "0");
        b.current_quantity = dec("-1");
        b.available_quantity = dec("-1");
        assert!(matches!(b.check_invariants(), Err(AppError::Consistency(_))));
    }

    #[test]
    fn reorder_uses_available_quantity() {
        let b = balance_with("100", "95");

        let status = ReorderStatus::evaluate(&b, Some(dec("10")));
        assert!(status.below_threshold);
        assert_eq!(status.deficit, dec("5"));

        let status = ReorderStatus::evaluate(&b, None);
        assert!(!status.below_threshold);
        assert_eq!(status.deficit, Decimal::ZERO);
    }

    #[test]
    fn weighted_average_guards_empty_stock() {
        assert_eq!(
            weighted_average_rate(Decimal::ZERO, dec("5"), Decimal::ZERO, dec("9")).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn receive_out_of_decimal_range_is_rejected_without_side_effects() {
        let huge = Decimal::from(10u64.pow(18));
        let mut b = balance_with("0", "0");
        let before = b.clone();

        let err = b.receive(huge, huge).unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
        assert_eq!(b, before);

        // Valor total cabe, mas a soma das quantidades estoura
        let mut b = balance_with("0", "0");
        b.receive(Decimal::MAX, Decimal::ZERO).unwrap();
        let before = b.clone();
        assert!(matches!(b.receive(Decimal::MAX, Decimal::ZERO), Err(AppError::InvalidOperation(_))));
        assert_eq!(b, before);
    }

    #[test]
    fn adjust_and_expect_incoming_reject_overflow() {
        let mut b = balance_with("0", "0");
        b.adjust(Decimal::MAX).unwrap();
        assert!(matches!(b.adjust(Decimal::ONE), Err(AppError::InvalidOperation(_))));
        assert_eq!(b.current_quantity, Decimal::MAX);

        let mut b = balance_with("0", "0");
        b.expect_incoming(Decimal::MAX).unwrap();
        assert!(matches!(b.expect_incoming(Decimal::MAX), Err(AppError::InvalidOperation(_))));
        assert_eq!(b.in_transit_quantity, Decimal::MAX);
    }
}
