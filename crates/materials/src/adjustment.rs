use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::{MaterialId, MaterialProductId};
use larder_core::define_id;

define_id!(MaterialAdjustmentId, "MaterialAdjustmentId");

/// Immutable record of a physical count correction, in either direction.
///
/// Stock found or lost is valued at the product's average cost at the time
/// of the count. A reduction additionally appears as a `MaterialConsumption`
/// whose `transaction_id` is this record's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialAdjustment {
    pub id: MaterialAdjustmentId,
    pub product_id: MaterialProductId,
    pub material_id: MaterialId,
    pub product_name: String,
    pub material_name: String,
    pub previous_quantity: Decimal,
    pub new_quantity: Decimal,
    /// Signed change; negative when stock was lost.
    pub delta: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    /// `delta` valued at `unit_cost`.
    pub cost_delta: Decimal,
    pub notes: Option<String>,
    pub actor: String,
    pub adjusted_at: DateTime<Utc>,
}

impl MaterialAdjustment {
    pub fn is_increase(&self) -> bool {
        self.delta > Decimal::ZERO
    }
}
