use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_catalog::{ComponentKind, FinishedGoodId};
use larder_core::define_id;

define_id!(AssemblyRunId, "AssemblyRunId");
define_id!(AssemblyConsumptionId, "AssemblyConsumptionId");

/// A recorded assembly of finished goods. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRun {
    pub id: AssemblyRunId,
    pub finished_good_id: FinishedGoodId,
    pub finished_good_name: String,
    pub quantity: u32,
    /// Cost of everything consumed, frozen at assembly time.
    pub total_component_cost: Decimal,
    pub per_unit_cost: Decimal,
    pub notes: Option<String>,
    pub assembled_at: DateTime<Utc>,
}

impl AssemblyRun {
    pub fn new(
        id: AssemblyRunId,
        finished_good_id: FinishedGoodId,
        finished_good_name: &str,
        quantity: u32,
        total_component_cost: Decimal,
        notes: Option<String>,
        assembled_at: DateTime<Utc>,
    ) -> Self {
        let per_unit_cost = if quantity == 0 {
            Decimal::ZERO
        } else {
            total_component_cost / Decimal::from(quantity)
        };
        Self {
            id,
            finished_good_id,
            finished_good_name: finished_good_name.to_string(),
            quantity,
            total_component_cost,
            per_unit_cost,
            notes,
            assembled_at,
        }
    }
}

/// Denormalized snapshot of a finished unit or nested finished good consumed
/// by an assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyConsumption {
    pub id: AssemblyConsumptionId,
    pub assembly_run_id: AssemblyRunId,
    pub component_kind: ComponentKind,
    pub component_id: Uuid,
    pub component_name: String,
    /// Component kind label; house-made components carry no catalog category.
    pub category: String,
    /// Always `None` for house-made components.
    pub supplier_name: Option<String>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub consumed_at: DateTime<Utc>,
}
