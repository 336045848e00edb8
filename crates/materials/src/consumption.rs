use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_catalog::{MaterialId, MaterialProductId};
use larder_core::define_id;

define_id!(MaterialConsumptionId, "MaterialConsumptionId");

/// Denormalized snapshot of material consumed by a transaction.
///
/// Names, category and supplier are copied at transaction time and never
/// re-resolved, so later catalog edits leave history untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialConsumption {
    pub id: MaterialConsumptionId,
    /// Parent transaction (assembly run or manual count correction).
    pub transaction_id: Uuid,
    pub product_id: MaterialProductId,
    pub material_id: MaterialId,
    pub product_name: String,
    pub material_name: String,
    pub category: String,
    pub supplier_name: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub notes: Option<String>,
    pub consumed_at: DateTime<Utc>,
}
