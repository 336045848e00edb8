//! Immutable, denormalized consumption records.
//!
//! Writers copy names, category, supplier and cost onto the record at the
//! moment of the transaction. Readers return those copies as stored and never
//! look the referenced definitions up again.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use larder_assembly::{AssemblyConsumption, AssemblyConsumptionId, AssemblyRunId};
use larder_catalog::{ComponentRef, IngredientId, MaterialProductId};
use larder_core::{DomainResult, ensure_positive};
use larder_infra::{AuditRecord, Database, Tables};
use larder_inventory::{IngredientConsumption, IngredientConsumptionId, InventoryDepletion, LotDraw};
use larder_materials::{MaterialAdjustment, MaterialConsumption, MaterialConsumptionId, MaterialPurchase};
use larder_production::{
    ProductionConsumption, ProductionConsumptionId, ProductionLoss, ProductionRun, ProductionRunId,
};

/// Everything an assembly run consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyConsumptions {
    pub components: Vec<AssemblyConsumption>,
    pub materials: Vec<MaterialConsumption>,
}

impl AssemblyConsumptions {
    pub fn total_cost(&self) -> Decimal {
        self.components.iter().map(|c| c.total_cost).sum::<Decimal>()
            + self.materials.iter().map(|m| m.total_cost).sum::<Decimal>()
    }
}

pub(crate) fn component_uuid(component: ComponentRef) -> Uuid {
    match component {
        ComponentRef::FinishedUnit(id) => *id.as_uuid(),
        ComponentRef::FinishedGood(id) => *id.as_uuid(),
        ComponentRef::Packaging(id) => *id.as_uuid(),
        ComponentRef::MaterialUnit(id) => *id.as_uuid(),
        ComponentRef::Material(id) => *id.as_uuid(),
    }
}

#[derive(Clone, Copy)]
pub struct ConsumptionRecorder<'a> {
    db: &'a Database,
}

impl<'a> ConsumptionRecorder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub(crate) fn record_depletion(t: &mut Tables, depletion: &InventoryDepletion) {
        t.append_audit(AuditRecord::InventoryDepleted(depletion.clone()));
    }

    pub(crate) fn record_material_purchase(t: &mut Tables, purchase: &MaterialPurchase) {
        t.append_audit(AuditRecord::MaterialPurchased(purchase.clone()));
    }

    pub(crate) fn record_material_adjustment(t: &mut Tables, adjustment: &MaterialAdjustment) {
        t.append_audit(AuditRecord::MaterialAdjusted(adjustment.clone()));
    }

    pub(crate) fn record_loss(t: &mut Tables, loss: &ProductionLoss) {
        t.append_audit(AuditRecord::ProductionLossRecorded(loss.clone()));
    }

    /// Snapshot material drawn from a product by `transaction_id`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn record_material(
        t: &mut Tables,
        transaction_id: Uuid,
        product_id: MaterialProductId,
        quantity: Decimal,
        total_cost: Decimal,
        notes: Option<String>,
        consumed_at: DateTime<Utc>,
    ) -> DomainResult<MaterialConsumption> {
        ensure_positive("consumed quantity", quantity)?;
        let product = t.material_product(product_id)?;
        let material = t.material(product.material_id)?;
        let record = MaterialConsumption {
            id: MaterialConsumptionId::new(),
            transaction_id,
            product_id,
            material_id: material.id,
            product_name: product.name.clone(),
            material_name: material.name.clone(),
            category: material.category.clone(),
            supplier_name: t.supplier_name(product.supplier_id),
            quantity,
            unit: material.base_unit.clone(),
            unit_cost: total_cost / quantity,
            total_cost,
            notes,
            consumed_at,
        };
        t.append_audit(AuditRecord::MaterialConsumed(record.clone()));
        Ok(record)
    }

    /// Snapshot one lot draw made by a production run.
    pub(crate) fn record_ingredient_draw(
        t: &mut Tables,
        run: &ProductionRun,
        ingredient_id: IngredientId,
        draw: &LotDraw,
    ) -> DomainResult<ProductionConsumption> {
        let ingredient = t.ingredient(ingredient_id)?;
        let lot = t.lot(draw.lot_id)?;
        let record = ProductionConsumption {
            id: ProductionConsumptionId::new(),
            production_run_id: run.id,
            ingredient_id,
            lot_id: draw.lot_id,
            ingredient_name: ingredient.name.clone(),
            category: ingredient.category.clone(),
            supplier_name: t.supplier_name(lot.supplier_id()),
            quantity: draw.lot_quantity,
            unit: draw.lot_unit.clone(),
            unit_cost: draw.unit_cost,
            total_cost: draw.cost,
            consumed_at: run.produced_at,
        };
        t.append_audit(AuditRecord::ProductionConsumed(record.clone()));
        Ok(record)
    }

    /// Snapshot one lot draw made by a direct FIFO consumption.
    pub(crate) fn record_fifo_draw(
        t: &mut Tables,
        transaction_id: Uuid,
        ingredient_id: IngredientId,
        draw: &LotDraw,
        actor: &str,
        consumed_at: DateTime<Utc>,
    ) -> DomainResult<IngredientConsumption> {
        let ingredient = t.ingredient(ingredient_id)?;
        let lot = t.lot(draw.lot_id)?;
        let record = IngredientConsumption {
            id: IngredientConsumptionId::new(),
            transaction_id,
            ingredient_id,
            lot_id: draw.lot_id,
            ingredient_name: ingredient.name.clone(),
            category: ingredient.category.clone(),
            supplier_name: t.supplier_name(lot.supplier_id()),
            quantity: draw.lot_quantity,
            unit: draw.lot_unit.clone(),
            unit_cost: draw.unit_cost,
            total_cost: draw.cost,
            actor: actor.to_string(),
            consumed_at,
        };
        t.append_audit(AuditRecord::IngredientConsumed(record.clone()));
        Ok(record)
    }

    /// Snapshot a finished unit or nested finished good consumed by assembly.
    pub(crate) fn record_component(
        t: &mut Tables,
        assembly_run_id: AssemblyRunId,
        component: ComponentRef,
        quantity: Decimal,
        unit_cost: Decimal,
        consumed_at: DateTime<Utc>,
    ) -> DomainResult<AssemblyConsumption> {
        let record = AssemblyConsumption {
            id: AssemblyConsumptionId::new(),
            assembly_run_id,
            component_kind: component.kind(),
            component_id: component_uuid(component),
            component_name: t.component_name(component)?,
            category: component.kind().as_str().to_string(),
            supplier_name: None,
            quantity,
            unit_cost,
            total_cost: quantity * unit_cost,
            consumed_at,
        };
        t.append_audit(AuditRecord::AssemblyConsumed(record.clone()));
        Ok(record)
    }

    pub fn production_consumptions(&self, run_id: ProductionRunId) -> DomainResult<Vec<ProductionConsumption>> {
        self.db
            .read(|t| t.audit().consumptions_for_production(run_id).into_iter().cloned().collect())
    }

    pub fn production_losses(&self, run_id: ProductionRunId) -> DomainResult<Vec<ProductionLoss>> {
        self.db.read(|t| t.audit().losses_for(run_id).into_iter().cloned().collect())
    }

    pub fn assembly_consumptions(&self, run_id: AssemblyRunId) -> DomainResult<AssemblyConsumptions> {
        self.db.read(|t| {
            let (components, materials) = t.audit().consumptions_for_assembly(run_id);
            AssemblyConsumptions {
                components: components.into_iter().cloned().collect(),
                materials: materials.into_iter().cloned().collect(),
            }
        })
    }

    /// Material consumptions made by a transaction other than assembly
    /// (direct consumption, count corrections).
    pub fn material_consumptions(&self, transaction_id: Uuid) -> DomainResult<Vec<MaterialConsumption>> {
        self.db.read(|t| {
            t.audit()
                .material_consumptions()
                .filter(|c| c.transaction_id == transaction_id)
                .cloned()
                .collect()
        })
    }

    pub fn journal_len(&self) -> DomainResult<usize> {
        self.db.read(|t| t.audit().len())
    }
}
