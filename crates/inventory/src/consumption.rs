//! Standalone ingredient consumption record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_catalog::IngredientId;
use larder_core::define_id;

use crate::item::InventoryItemId;

define_id!(IngredientConsumptionId, "IngredientConsumptionId");

/// Denormalized snapshot of one lot drawn by a direct FIFO consumption.
///
/// Every draw of one consumption shares its `transaction_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientConsumption {
    pub id: IngredientConsumptionId,
    pub transaction_id: Uuid,
    pub ingredient_id: IngredientId,
    pub lot_id: InventoryItemId,
    pub ingredient_name: String,
    pub category: String,
    pub supplier_name: Option<String>,
    /// Quantity taken from the lot, in the lot's unit.
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub actor: String,
    pub consumed_at: DateTime<Utc>,
}
