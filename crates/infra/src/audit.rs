//! Append-only audit journal.
//!
//! Every inventory-affecting fact is appended here as an
//! `EventEnvelope<AuditRecord>`. There is no update or delete path; typed
//! queries filter the journal and read the denormalized fields directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_assembly::{AssemblyConsumption, AssemblyRun, AssemblyRunId};
use larder_events::{Event, EventEnvelope};
use larder_inventory::{IngredientConsumption, InventoryDepletion, InventoryItem, InventoryItemId};
use larder_materials::{MaterialAdjustment, MaterialConsumption, MaterialPurchase};
use larder_production::{ProductionConsumption, ProductionLoss, ProductionRun, ProductionRunId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "snake_case")]
pub enum AuditRecord {
    /// Snapshot of a lot as created by its purchase.
    LotPurchased(InventoryItem),
    InventoryDepleted(InventoryDepletion),
    IngredientConsumed(IngredientConsumption),
    MaterialPurchased(MaterialPurchase),
    MaterialConsumed(MaterialConsumption),
    MaterialAdjusted(MaterialAdjustment),
    ProductionRecorded(ProductionRun),
    ProductionLossRecorded(ProductionLoss),
    ProductionConsumed(ProductionConsumption),
    AssemblyRecorded(AssemblyRun),
    AssemblyConsumed(AssemblyConsumption),
}

impl Event for AuditRecord {
    fn event_type(&self) -> &'static str {
        match self {
            AuditRecord::LotPurchased(_) => "inventory.lot.purchased",
            AuditRecord::InventoryDepleted(_) => "inventory.lot.depleted",
            AuditRecord::IngredientConsumed(_) => "inventory.ingredient.consumed",
            AuditRecord::MaterialPurchased(_) => "materials.product.purchased",
            AuditRecord::MaterialConsumed(_) => "materials.product.consumed",
            AuditRecord::MaterialAdjusted(_) => "materials.product.adjusted",
            AuditRecord::ProductionRecorded(_) => "production.run.recorded",
            AuditRecord::ProductionLossRecorded(_) => "production.loss.recorded",
            AuditRecord::ProductionConsumed(_) => "production.ingredient.consumed",
            AuditRecord::AssemblyRecorded(_) => "assembly.run.recorded",
            AuditRecord::AssemblyConsumed(_) => "assembly.component.consumed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AuditRecord::LotPurchased(r) => r.purchased_at(),
            AuditRecord::InventoryDepleted(r) => r.occurred_at,
            AuditRecord::IngredientConsumed(r) => r.consumed_at,
            AuditRecord::MaterialPurchased(r) => r.purchased_at,
            AuditRecord::MaterialConsumed(r) => r.consumed_at,
            AuditRecord::MaterialAdjusted(r) => r.adjusted_at,
            AuditRecord::ProductionRecorded(r) => r.produced_at,
            AuditRecord::ProductionLossRecorded(r) => r.recorded_at,
            AuditRecord::ProductionConsumed(r) => r.consumed_at,
            AuditRecord::AssemblyRecorded(r) => r.assembled_at,
            AuditRecord::AssemblyConsumed(r) => r.consumed_at,
        }
    }

    fn stream(&self) -> (Uuid, &'static str) {
        match self {
            AuditRecord::LotPurchased(r) => (*r.id().as_uuid(), "inventory.lot"),
            AuditRecord::InventoryDepleted(r) => (*r.item_id.as_uuid(), "inventory.lot"),
            AuditRecord::IngredientConsumed(r) => (r.transaction_id, "inventory.consumption"),
            AuditRecord::MaterialPurchased(r) => (*r.product_id.as_uuid(), "materials.product"),
            AuditRecord::MaterialConsumed(r) => (r.transaction_id, "materials.consumption"),
            AuditRecord::MaterialAdjusted(r) => (*r.product_id.as_uuid(), "materials.product"),
            AuditRecord::ProductionRecorded(r) => (*r.id.as_uuid(), "production.run"),
            AuditRecord::ProductionLossRecorded(r) => (*r.production_run_id.as_uuid(), "production.run"),
            AuditRecord::ProductionConsumed(r) => (*r.production_run_id.as_uuid(), "production.run"),
            AuditRecord::AssemblyRecorded(r) => (*r.id.as_uuid(), "assembly.run"),
            AuditRecord::AssemblyConsumed(r) => (*r.assembly_run_id.as_uuid(), "assembly.run"),
        }
    }
}

/// Insert-only store of audit envelopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTrail {
    journal: Vec<EventEnvelope<AuditRecord>>,
}

macro_rules! audit_query {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> impl Iterator<Item = &$ty> + '_ {
            self.journal.iter().filter_map(|env| match env.payload() {
                AuditRecord::$variant(r) => Some(r),
                _ => None,
            })
        }
    };
}

impl AuditTrail {
    /// Append a record and return its assigned journal position.
    pub fn append(&mut self, record: AuditRecord) -> u64 {
        let sequence = self.journal.len() as u64 + 1;
        self.journal.push(EventEnvelope::wrap(sequence, record));
        sequence
    }

    pub fn journal(&self) -> &[EventEnvelope<AuditRecord>] {
        &self.journal
    }

    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    audit_query!(lot_purchases, LotPurchased, InventoryItem);
    audit_query!(depletions, InventoryDepleted, InventoryDepletion);
    audit_query!(ingredient_consumptions, IngredientConsumed, IngredientConsumption);
    audit_query!(material_purchases, MaterialPurchased, MaterialPurchase);
    audit_query!(material_consumptions, MaterialConsumed, MaterialConsumption);
    audit_query!(material_adjustments, MaterialAdjusted, MaterialAdjustment);
    audit_query!(production_records, ProductionRecorded, ProductionRun);
    audit_query!(production_losses, ProductionLossRecorded, ProductionLoss);
    audit_query!(production_consumptions, ProductionConsumed, ProductionConsumption);
    audit_query!(assembly_records, AssemblyRecorded, AssemblyRun);
    audit_query!(assembly_consumptions, AssemblyConsumed, AssemblyConsumption);

    pub fn depletions_for(&self, item_id: InventoryItemId) -> Vec<&InventoryDepletion> {
        self.depletions().filter(|d| d.item_id == item_id).collect()
    }

    pub fn losses_for(&self, run_id: ProductionRunId) -> Vec<&ProductionLoss> {
        self.production_losses()
            .filter(|l| l.production_run_id == run_id)
            .collect()
    }

    pub fn consumptions_for_production(&self, run_id: ProductionRunId) -> Vec<&ProductionConsumption> {
        self.production_consumptions()
            .filter(|c| c.production_run_id == run_id)
            .collect()
    }

    pub fn consumptions_for_assembly(
        &self,
        run_id: AssemblyRunId,
    ) -> (Vec<&AssemblyConsumption>, Vec<&MaterialConsumption>) {
        let components = self
            .assembly_consumptions()
            .filter(|c| c.assembly_run_id == run_id)
            .collect();
        let materials = self
            .material_consumptions()
            .filter(|c| c.transaction_id == *run_id.as_uuid())
            .collect();
        (components, materials)
    }
}
