// src/models/supply_chain.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::journal::TransactionType;

/// Totais do diário agrupados por tipo de transação.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TypeTotal {
    pub transaction_type: TransactionType,
    pub quantity: Decimal,        // Soma assinada
    pub valued_quantity: Decimal, // Soma absoluta das linhas com rate
    pub value: Decimal,           // Soma de |quantity| * rate
}

// Projeção derivada. Nunca é fonte da verdade para reservas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupplyChainSummary {
    pub item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub opening_stock: Decimal,
    pub total_purchased: Decimal,
    pub total_manufactured: Decimal,
    pub total_consumed_in_production: Decimal,
    pub total_sold: Decimal,
    pub net_adjustment: Decimal,
    pub average_purchase_rate: Decimal,
    pub average_sales_rate: Decimal,
    pub current_quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub computed_at: DateTime<Utc>,
}

fn average(valued_quantity: Decimal, value: Decimal) -> Decimal {
    if valued_quantity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    value / valued_quantity
}

impl SupplyChainSummary {
    /// Dobra os totais agrupados na projeção. Rodar de novo com os mesmos
    /// totais produz o mesmo resultado (a não ser por `computed_at`).
    pub fn from_totals(
        item_id: Uuid,
        variant_id: Option<Uuid>,
        totals: &[TypeTotal],
        current_quantity: Decimal,
        reserved_quantity: Decimal,
        computed_at: DateTime<Utc>,
    ) -> Self {
        let mut summary = Self {
            item_id,
            variant_id,
            opening_stock: Decimal::ZERO,
            total_purchased: Decimal::ZERO,
            total_manufactured: Decimal::ZERO,
            total_consumed_in_production: Decimal::ZERO,
            total_sold: Decimal::ZERO,
            net_adjustment: Decimal::ZERO,
            average_purchase_rate: Decimal::ZERO,
            average_sales_rate: Decimal::ZERO,
            current_quantity,
            reserved_quantity,
            computed_at,
        };

        for total in totals {
            match total.transaction_type {
                TransactionType::OpeningStock => summary.opening_stock += total.quantity,
                TransactionType::PurchaseReceived => {
                    summary.total_purchased += total.quantity;
                    summary.average_purchase_rate = average(total.valued_quantity, total.value);
                }
                TransactionType::Manufactured => summary.total_manufactured += total.quantity,
                // Saídas são gravadas negativas; a projeção mostra volumes positivos
                TransactionType::ConsumedInProduction => {
                    summary.total_consumed_in_production += total.quantity.abs()
                }
                TransactionType::SalesInvoiced => {
                    summary.total_sold += total.quantity.abs();
                    summary.average_sales_rate = average(total.valued_quantity, total.value);
                }
                TransactionType::Adjustment => summary.net_adjustment += total.quantity,
                TransactionType::SalesReserved
                | TransactionType::ReservationCancelled
                | TransactionType::PurchaseInTransit => {}
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(transaction_type: TransactionType, quantity: i64, valued: i64, value: i64) -> TypeTotal {
        TypeTotal {
            transaction_type,
            quantity: Decimal::from(quantity),
            valued_quantity: Decimal::from(valued),
            value: Decimal::from(value),
        }
    }

    #[test]
    fn folds_totals_into_positive_volumes() {
        let totals = vec![
            total(TransactionType::PurchaseReceived, 100, 100, 1500),
            total(TransactionType::Manufactured, 20, 0, 0),
            total(TransactionType::SalesInvoiced, -30, 30, 900),
            total(TransactionType::ConsumedInProduction, -10, 0, 0),
            total(TransactionType::Adjustment, -2, 0, 0),
            total(TransactionType::SalesReserved, 40, 0, 0),
        ];

        let s = SupplyChainSummary::from_totals(
            Uuid::nil(),
            None,
            &totals,
            Decimal::from(78),
            Decimal::from(10),
            Utc::now(),
        );

        assert_eq!(s.total_purchased, Decimal::from(100));
        assert_eq!(s.total_manufactured, Decimal::from(20));
        assert_eq!(s.total_sold, Decimal::from(30));
        assert_eq!(s.total_consumed_in_production, Decimal::from(10));
        assert_eq!(s.net_adjustment, Decimal::from(-2));
        assert_eq!(s.average_purchase_rate, Decimal::from(15));
        assert_eq!(s.average_sales_rate, Decimal::from(30));
        assert_eq!(s.current_quantity, Decimal::from(78));
    }

    #[test]
    fn refolding_is_idempotent() {
        let totals = vec![total(TransactionType::PurchaseReceived, 10, 10, 50)];
        let at = Utc::now();

        let a = SupplyChainSummary::from_totals(Uuid::nil(), None, &totals, Decimal::TEN, Decimal::ZERO, at);
        let b = SupplyChainSummary::from_totals(Uuid::nil(), None, &totals, Decimal::TEN, Decimal::ZERO, at);
        assert_eq!(a, b);
    }

    #[test]
    fn unpriced_receipts_leave_average_at_zero() {
        let totals = vec![total(TransactionType::PurchaseReceived, 10, 0, 0)];
        let s = SupplyChainSummary::from_totals(Uuid::nil(), None, &totals, Decimal::TEN, Decimal::ZERO, Utc::now());
        assert_eq!(s.average_purchase_rate, Decimal::ZERO);
    }
}
