//! Propriedades do saldo sob sequências aleatórias de operações.
//!
//! Roda sobre as transições puras de `Balance`, espelhando o que o motor
//! grava no diário para cada operação aceita:
//! - o invariante available = current - reserved nunca quebra
//! - nenhuma sequência vende além do que existe
//! - a soma do diário (affects_current) reconstrói current_quantity
//! - liberar duas vezes a mesma reserva não libera o dobro

use proptest::prelude::*;
use rust_decimal::Decimal;
use stock_ledger::models::{Balance, StockKey, TransactionType};
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Op {
    Reserve(Decimal),
    Release(Decimal),
    Receive(Decimal, Decimal),
    Consume(Decimal, bool),
    ExpectIncoming(Decimal),
    Adjust(Decimal),
}

// Espelho mínimo do diário: (tipo, quantidade assinada)
type Journal = Vec<(TransactionType, Decimal)>;

fn apply(balance: &mut Balance, journal: &mut Journal, op: &Op) -> bool {
    match *op {
        Op::Reserve(qty) => {
            if balance.reserve(qty).is_err() {
                return false;
            }
            journal.push((TransactionType::SalesReserved, qty));
        }
        Op::Release(qty) => {
            let released = balance.release(qty);
            if !released.is_zero() {
                journal.push((TransactionType::ReservationCancelled, -released));
            }
        }
        Op::Receive(qty, rate) => {
            let Ok(arrived) = balance.receive(qty, rate) else {
                return false;
            };
            journal.push((TransactionType::PurchaseReceived, qty));
            if arrived > Decimal::ZERO {
                journal.push((TransactionType::PurchaseInTransit, -arrived));
            }
        }
        Op::Consume(qty, from_reservation) => {
            if balance.consume(qty, from_reservation).is_err() {
                return false;
            }
            journal.push((TransactionType::SalesInvoiced, -qty));
        }
        Op::ExpectIncoming(qty) => {
            if balance.expect_incoming(qty).is_err() {
                return false;
            }
            journal.push((TransactionType::PurchaseInTransit, qty));
        }
        Op::Adjust(delta) => {
            if balance.adjust(delta).is_err() {
                return false;
            }
            journal.push((TransactionType::Adjustment, delta));
        }
    }
    true
}

fn current_from_journal(journal: &Journal) -> Decimal {
    journal
        .iter()
        .filter(|(t, _)| t.affects_current())
        .map(|(_, q)| *q)
        .sum()
}

/// Quantidades positivas de 0.1 a 100.0
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=1000i64).prop_map(|n| Decimal::new(n, 1))
}

fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=100000i64).prop_map(|n| Decimal::new(n, 2))
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        quantity_strategy().prop_map(Op::Reserve),
        quantity_strategy().prop_map(Op::Release),
        (quantity_strategy(), rate_strategy()).prop_map(|(q, r)| Op::Receive(q, r)),
        (quantity_strategy(), any::<bool>()).prop_map(|(q, f)| Op::Consume(q, f)),
        quantity_strategy().prop_map(Op::ExpectIncoming),
        (quantity_strategy(), any::<bool>()).prop_map(|(q, neg)| Op::Adjust(if neg { -q } else { q })),
    ]
}

fn fresh() -> Balance {
    Balance::zeroed(StockKey::item(Uuid::new_v4()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_invariant_holds_after_every_operation(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut balance = fresh();
        let mut journal = Journal::new();

        for op in &ops {
            apply(&mut balance, &mut journal, op);

            prop_assert!(balance.check_invariants().is_ok(), "op {:?} left {:?}", op, balance);
            prop_assert_eq!(balance.available_quantity, balance.current_quantity - balance.reserved_quantity);
            prop_assert!(balance.reserved_quantity <= balance.current_quantity);
        }
    }

    #[test]
    fn prop_rejected_operations_change_nothing(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut balance = fresh();
        let mut journal = Journal::new();

        for op in &ops {
            let before = balance.clone();
            let journal_len = journal.len();

            if !apply(&mut balance, &mut journal, op) {
                prop_assert_eq!(&balance, &before);
                prop_assert_eq!(journal.len(), journal_len);
            }
        }
    }

    #[test]
    fn prop_journal_reconstructs_current(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut balance = fresh();
        let mut journal = Journal::new();

        for op in &ops {
            apply(&mut balance, &mut journal, op);
        }

        prop_assert_eq!(current_from_journal(&journal), balance.current_quantity);
    }

    #[test]
    fn prop_no_oversell(
        stock in quantity_strategy(),
        demands in prop::collection::vec(quantity_strategy(), 1..30)
    ) {
        let mut balance = fresh();
        let mut journal = Journal::new();
        apply(&mut balance, &mut journal, &Op::Receive(stock, Decimal::ONE));

        let mut reserved = Decimal::ZERO;
        for demand in demands {
            if apply(&mut balance, &mut journal, &Op::Reserve(demand)) {
                reserved += demand;
            }
        }

        prop_assert!(reserved <= stock);
        prop_assert_eq!(balance.reserved_quantity, reserved);
    }

    #[test]
    fn prop_release_is_idempotent(stock in quantity_strategy(), hold in quantity_strategy()) {
        let mut balance = fresh();
        balance.receive(stock.max(hold), Decimal::ONE).unwrap();
        balance.reserve(hold).unwrap();

        let first = balance.release(hold);
        let after_first = balance.clone();
        let second = balance.release(hold);

        prop_assert_eq!(first, hold);
        prop_assert_eq!(second, Decimal::ZERO);
        prop_assert_eq!(balance, after_first);
    }

    #[test]
    fn prop_average_rate_stays_within_received_rates(
        receipts in prop::collection::vec((quantity_strategy(), rate_strategy()), 1..20)
    ) {
        let mut balance = fresh();
        for (qty, rate) in &receipts {
            balance.receive(*qty, *rate).unwrap();
        }

        let min = receipts.iter().map(|(_, r)| *r).min().unwrap();
        let max = receipts.iter().map(|(_, r)| *r).max().unwrap();
        // Tolerância de arredondamento da divisão decimal
        let eps = Decimal::new(1, 10);
        prop_assert!(balance.average_rate >= min - eps);
        prop_assert!(balance.average_rate <= max + eps);
    }
}
