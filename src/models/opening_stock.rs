// src/models/opening_stock.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::inventory::StockKey;

// Estoque inicial: linha base por chave, usada só na implantação do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OpeningStock {
    pub id: Uuid,
    pub item_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub opening_stock: Decimal,
    pub opening_stock_rate_per_unit: Decimal,

    // Preenchido uma única vez, quando o saldo é semeado a partir desta linha
    pub seeded_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OpeningStock {
    pub fn key(&self) -> StockKey {
        StockKey { item_id: self.item_id, variant_id: self.variant_id }
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded_at.is_some()
    }
}
