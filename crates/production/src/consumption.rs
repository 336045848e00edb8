use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::IngredientId;
use larder_inventory::InventoryItemId;

use crate::run::ProductionRunId;

larder_core::define_id!(ProductionConsumptionId, "ProductionConsumptionId");

/// Denormalized snapshot of one lot drawn by a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionConsumption {
    pub id: ProductionConsumptionId,
    pub production_run_id: ProductionRunId,
    pub ingredient_id: IngredientId,
    pub lot_id: InventoryItemId,
    pub ingredient_name: String,
    pub category: String,
    pub supplier_name: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub consumed_at: DateTime<Utc>,
}
