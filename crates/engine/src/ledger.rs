//! Perishable ingredient lots: purchases, FIFO consumption and manual
//! adjustments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use larder_catalog::{IngredientId, SupplierId};
use larder_core::{CodeList, DomainError, DomainResult};
use larder_infra::{AuditRecord, Database, Tables, UnitOfWork};
use larder_inventory::{
    FifoPlan, IngredientConsumption, InventoryDepletion, InventoryItem, InventoryItemId, ManualAdjustment, fifo_order, plan_fifo,
};

use crate::recorder::ConsumptionRecorder;
use crate::units::UnitConverter;

/// A purchase of one ingredient, creating exactly one lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientPurchase {
    pub ingredient_id: IngredientId,
    pub supplier_id: Option<SupplierId>,
    pub quantity: Decimal,
    pub unit: String,
    pub total_price: Decimal,
    pub purchased_at: DateTime<Utc>,
}

impl IngredientPurchase {
    pub fn new(ingredient_id: IngredientId, quantity: Decimal, unit: impl Into<String>, total_price: Decimal) -> Self {
        Self {
            ingredient_id,
            supplier_id: None,
            quantity,
            unit: unit.into(),
            total_price,
            purchased_at: Utc::now(),
        }
    }

    pub fn from_supplier(mut self, supplier_id: SupplierId) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }

    pub fn at(mut self, purchased_at: DateTime<Utc>) -> Self {
        self.purchased_at = purchased_at;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientValuation {
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    /// Unit of `quantity` (the ingredient's purchase unit).
    pub unit: String,
    pub quantity: Decimal,
    pub value: Decimal,
    pub lot_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryValuation {
    pub ingredients: Vec<IngredientValuation>,
    pub total_value: Decimal,
    pub lot_count: usize,
    pub empty_lot_count: usize,
}

/// Plan consumption of `needed` `target_unit` of an ingredient against `tables`.
pub(crate) fn plan_consumption(
    tables: &Tables,
    converter: &dyn UnitConverter,
    ingredient_id: IngredientId,
    needed: Decimal,
    target_unit: &str,
) -> DomainResult<FifoPlan> {
    let density = tables.ingredient(ingredient_id)?.density_g_per_ml;
    plan_fifo(tables.lots_of(ingredient_id), needed, |lot| {
        converter.factor(lot.unit(), target_unit, density)
    })
}

/// Decrement every lot a plan draws from.
pub(crate) fn apply_plan(tables: &mut Tables, plan: &FifoPlan) -> DomainResult<()> {
    for draw in &plan.lots_touched {
        tables.lot_mut(draw.lot_id)?.decrement(draw.lot_quantity)?;
    }
    Ok(())
}

/// Unit cost of the most recent purchase, per `unit`.
pub(crate) fn latest_unit_cost(
    tables: &Tables,
    converter: &dyn UnitConverter,
    ingredient_id: IngredientId,
    unit: &str,
) -> DomainResult<Option<Decimal>> {
    let density = tables.ingredient(ingredient_id)?.density_g_per_ml;
    let Some(latest) = fifo_order(tables.lots_of(ingredient_id)).pop() else {
        return Ok(None);
    };
    let per_unit = converter.factor(latest.unit(), unit, density)?;
    Ok(Some(latest.unit_cost() / per_unit))
}

#[derive(Clone, Copy)]
pub struct InventoryLedger<'a> {
    db: &'a Database,
    converter: &'a dyn UnitConverter,
    reasons: &'a CodeList,
}

impl<'a> InventoryLedger<'a> {
    pub fn new(db: &'a Database, converter: &'a dyn UnitConverter, reasons: &'a CodeList) -> Self {
        Self { db, converter, reasons }
    }

    /// Create the lot for a purchase. `unit_cost` is fixed here forever.
    pub fn record_purchase(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        purchase: IngredientPurchase,
    ) -> DomainResult<InventoryItem> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            t.ingredient(purchase.ingredient_id)?;
            if let Some(supplier) = purchase.supplier_id {
                t.supplier(supplier)?;
            }
            let sequence = t.next_sequence();
            let lot = InventoryItem::purchased(
                purchase.ingredient_id,
                purchase.supplier_id,
                purchase.quantity,
                purchase.unit,
                purchase.total_price,
                purchase.purchased_at,
                sequence,
            )?;
            t.lots.insert(lot.id(), lot.clone());
            t.append_audit(AuditRecord::LotPurchased(lot.clone()));
            info!(
                lot = %lot.id(),
                ingredient = %lot.ingredient_id(),
                quantity = %lot.quantity(),
                unit_cost = %lot.unit_cost(),
                "ingredient lot purchased"
            );
            Ok(lot)
        })
    }

    /// Satisfy `quantity_needed` (in `target_unit`) from the oldest lots first.
    ///
    /// Shortfall is reported, never raised. A dry run reads state and changes
    /// nothing, so repeated dry runs return the same plan.
    pub fn consume_fifo(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        ingredient_id: IngredientId,
        quantity_needed: Decimal,
        target_unit: &str,
        dry_run: bool,
    ) -> DomainResult<FifoPlan> {
        if dry_run {
            let plan = match uow {
                Some(uow) => plan_consumption(uow.tables(), self.converter, ingredient_id, quantity_needed, target_unit)?,
                None => self.db.read(|t| {
                    plan_consumption(t, self.converter, ingredient_id, quantity_needed, target_unit)
                })??,
            };
            debug!(
                ingredient = %ingredient_id,
                consumed = %plan.consumed,
                shortfall = %plan.shortfall,
                "fifo dry run"
            );
            return Ok(plan);
        }

        self.db.run(uow, |uow| {
            let actor = uow.actor().to_string();
            let t = uow.tables_mut();
            let plan = plan_consumption(t, self.converter, ingredient_id, quantity_needed, target_unit)?;
            apply_plan(t, &plan)?;
            let transaction_id = Uuid::now_v7();
            let consumed_at = Utc::now();
            for draw in &plan.lots_touched {
                ConsumptionRecorder::record_fifo_draw(t, transaction_id, ingredient_id, draw, &actor, consumed_at)?;
            }
            info!(
                transaction = %transaction_id,
                ingredient = %ingredient_id,
                consumed = %plan.consumed,
                shortfall = %plan.shortfall,
                cost = %plan.total_cost,
                lots = plan.lots_touched.len(),
                "fifo consumption applied"
            );
            Ok(plan)
        })
    }

    /// Remove stock from one lot for a reason other than production.
    pub fn manual_adjustment(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        adjustment: ManualAdjustment,
    ) -> DomainResult<InventoryDepletion> {
        self.db.run(uow, |uow| {
            let actor = uow.actor().to_string();
            let t = uow.tables_mut();
            let ingredient_id = t.lot(adjustment.item_id)?.ingredient_id();
            let ingredient_name = t.ingredient(ingredient_id)?.name.clone();

            let lot = t.lot_mut(adjustment.item_id)?;
            let depletion = InventoryDepletion::apply(lot, &ingredient_name, &adjustment, self.reasons, &actor, Utc::now())
                .inspect_err(|e| warn!(lot = %adjustment.item_id, error = %e, "manual adjustment rejected"))?;
            ConsumptionRecorder::record_depletion(t, &depletion);
            info!(
                lot = %depletion.item_id,
                quantity = %depletion.quantity_depleted,
                reason = %depletion.reason,
                cost = %depletion.cost,
                "manual adjustment recorded"
            );
            Ok(depletion)
        })
    }

    /// Total stock of an ingredient, in `target_unit`.
    pub fn available_quantity(&self, ingredient_id: IngredientId, target_unit: &str) -> DomainResult<Decimal> {
        self.db.read(|t| {
            let density = t.ingredient(ingredient_id)?.density_g_per_ml;
            t.lots_of(ingredient_id)
                .filter(|lot| !lot.is_empty())
                .map(|lot| self.converter.convert(lot.quantity(), lot.unit(), target_unit, density))
                .sum()
        })?
    }

    /// Lots of an ingredient in consumption order, emptied lots included.
    pub fn lots(&self, ingredient_id: IngredientId) -> DomainResult<Vec<InventoryItem>> {
        self.db.read(|t| {
            t.ingredient(ingredient_id)?;
            Ok(fifo_order(t.lots_of(ingredient_id)).into_iter().cloned().collect())
        })?
    }

    pub fn depletion_history(&self, item_id: InventoryItemId) -> DomainResult<Vec<InventoryDepletion>> {
        self.db.read(|t| {
            t.lot(item_id)?;
            Ok(t.audit().depletions_for(item_id).into_iter().cloned().collect())
        })?
    }

    /// Lot draws recorded by direct FIFO consumption of an ingredient.
    pub fn consumption_history(&self, ingredient_id: IngredientId) -> DomainResult<Vec<IngredientConsumption>> {
        self.db.read(|t| {
            t.ingredient(ingredient_id)?;
            Ok(t.audit().ingredient_consumptions().filter(|c| c.ingredient_id == ingredient_id).cloned().collect())
        })?
    }

    /// Quantity and FIFO value of every ingredient with lots.
    pub fn valuation(&self) -> DomainResult<InventoryValuation> {
        self.db.read(|t| {
            let mut by_ingredient: BTreeMap<IngredientId, IngredientValuation> = BTreeMap::new();
            let mut empty_lot_count = 0;
            for lot in t.lots.values() {
                if lot.is_empty() {
                    empty_lot_count += 1;
                }
                let ingredient = t.ingredient(lot.ingredient_id())?;
                let quantity = self.converter.convert(
                    lot.quantity(),
                    lot.unit(),
                    &ingredient.purchase_unit,
                    ingredient.density_g_per_ml,
                )?;
                let entry = by_ingredient.entry(ingredient.id).or_insert_with(|| IngredientValuation {
                    ingredient_id: ingredient.id,
                    ingredient_name: ingredient.name.clone(),
                    unit: ingredient.purchase_unit.clone(),
                    quantity: Decimal::ZERO,
                    value: Decimal::ZERO,
                    lot_count: 0,
                });
                entry.quantity += quantity;
                entry.value += lot.remaining_value();
                entry.lot_count += 1;
            }
            let ingredients: Vec<IngredientValuation> = by_ingredient.into_values().collect();
            Ok(InventoryValuation {
                total_value: ingredients.iter().map(|i| i.value).sum(),
                lot_count: t.lots.len(),
                empty_lot_count,
                ingredients,
            })
        })?
    }
}

/// Validation error for a plan that could not be fully satisfied.
pub(crate) fn shortfall_error(ingredient_name: &str, plan: &FifoPlan, unit: &str) -> DomainError {
    DomainError::validation(format!(
        "insufficient inventory for '{ingredient_name}': need {} {unit}, short {} {unit}",
        plan.consumed + plan.shortfall,
        plan.shortfall
    ))
}
