//! Bill-of-materials resolution and assembly recording.
//!
//! Material lines are always resolved to concrete products before anything
//! is consumed. Generic placeholders take the caller's allocation; other
//! material lines fill greedily from the material's products in creation
//! order.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::{info, warn};

use larder_assembly::{
    Allocations, AssemblyRun, AssemblyRunId, MaterialDemand, ProductAllocation, allocate_greedy, validate_allocation,
};
use larder_catalog::{ComponentRef, Composition, CompositionId, FinishedGoodId, FinishedUnitId, MaterialId};
use larder_core::{DomainError, DomainResult};
use larder_infra::{Database, Tables, UnitOfWork};

use crate::cost::component_unit_cost;
use crate::recorder::ConsumptionRecorder;

/// One composition line of an assembly, resolved to concrete stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedLine {
    /// Finished units or nested finished goods, counted in whole items.
    Component {
        composition_id: CompositionId,
        component: ComponentRef,
        quantity: u64,
    },
    /// Packaging or material drawn from specific products (base units).
    Products {
        composition_id: CompositionId,
        allocations: Vec<ProductAllocation>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyPlan {
    pub finished_good_id: FinishedGoodId,
    pub quantity: u32,
    pub lines: Vec<ResolvedLine>,
}

fn whole_units(label: &str, required: Decimal) -> DomainResult<u64> {
    if !required.fract().is_zero() {
        return Err(DomainError::validation(format!(
            "'{label}' is counted in whole units but {required} are required"
        )));
    }
    required
        .to_u64()
        .ok_or_else(|| DomainError::validation(format!("'{label}' quantity {required} is out of range")))
}

/// Resolve every line of `finished_good_id` × `quantity` and check stock.
///
/// Pure: reads `t` and returns the plan, or the first reason assembly must
/// not proceed.
pub(crate) fn resolve_assembly(
    t: &Tables,
    finished_good_id: FinishedGoodId,
    quantity: u32,
    allocations: &Allocations,
) -> DomainResult<AssemblyPlan> {
    if quantity == 0 {
        return Err(DomainError::validation("assembly quantity must be positive"));
    }
    let good = t.finished_good(finished_good_id)?;
    let compositions = t.compositions_of(finished_good_id)?;
    if compositions.is_empty() {
        return Err(DomainError::validation(format!("finished good '{}' has no components", good.name)));
    }
    for composition_id in allocations.keys() {
        let known = compositions
            .iter()
            .any(|c| c.id() == *composition_id && c.component().supports_generic());
        if !known {
            return Err(DomainError::validation(format!(
                "allocation targets composition {composition_id}, which is not a material line of '{}'",
                good.name
            )));
        }
    }

    let assembled = Decimal::from(quantity);
    let mut lines = Vec::with_capacity(compositions.len());
    let mut units: BTreeMap<FinishedUnitId, u64> = BTreeMap::new();
    let mut goods: BTreeMap<FinishedGoodId, u64> = BTreeMap::new();
    let mut demand = MaterialDemand::default();
    let mut deferred: Vec<(usize, MaterialNeed<'_>)> = Vec::new();

    for composition in &compositions {
        let required = composition.component_quantity() * assembled;
        let line = match composition.component() {
            component @ ComponentRef::FinishedUnit(id) => {
                let count = whole_units(&t.finished_unit(id)?.name, required)?;
                *units.entry(id).or_default() += count;
                ResolvedLine::Component { composition_id: composition.id(), component, quantity: count }
            }
            component @ ComponentRef::FinishedGood(id) => {
                let count = whole_units(&t.finished_good(id)?.name, required)?;
                *goods.entry(id).or_default() += count;
                ResolvedLine::Component { composition_id: composition.id(), component, quantity: count }
            }
            ComponentRef::Packaging(product_id) => {
                t.material_product(product_id)?;
                ResolvedLine::Products {
                    composition_id: composition.id(),
                    allocations: vec![ProductAllocation::new(product_id, required)],
                }
            }
            ComponentRef::MaterialUnit(id) => {
                let unit = t.material_unit(id)?;
                let base_units = required * unit.quantity_per_unit;
                let need = MaterialNeed { material_id: unit.material_id, label: &unit.name, required: base_units };
                material_line(t, composition, need, allocations, &mut deferred, lines.len())?
            }
            ComponentRef::Material(id) => {
                let need = MaterialNeed { material_id: id, label: &t.material(id)?.name, required };
                material_line(t, composition, need, allocations, &mut deferred, lines.len())?
            }
        };
        if let ResolvedLine::Products { allocations, .. } = &line {
            for allocation in allocations {
                demand.add(allocation);
            }
        }
        lines.push(line);
    }

    // Greedy lines fill from whatever the fixed allocations above left over.
    for (index, need) in deferred {
        let candidates: Vec<_> = t
            .products_of(need.material_id)
            .into_iter()
            .map(|p| (p.id, (p.current_inventory() - demand.get(p.id)).max(Decimal::ZERO)))
            .collect();
        let filled = allocate_greedy(need.label, need.required, &candidates)?;
        for allocation in &filled {
            demand.add(allocation);
        }
        if let Some(ResolvedLine::Products { allocations, .. }) = lines.get_mut(index) {
            *allocations = filled;
        }
    }

    demand.ensure_available(|product_id| {
        let product = t.material_product(product_id)?;
        Ok((product.name.clone(), product.current_inventory()))
    })?;
    for (id, needed) in units {
        let unit = t.finished_unit(id)?;
        ensure_stock(&unit.name, needed, unit.inventory_count)?;
    }
    for (id, needed) in goods {
        let nested = t.finished_good(id)?;
        ensure_stock(&nested.name, needed, nested.inventory_count)?;
    }

    Ok(AssemblyPlan { finished_good_id, quantity, lines })
}

fn ensure_stock(name: &str, needed: u64, available: u64) -> DomainResult<()> {
    if needed > available {
        return Err(DomainError::validation(format!(
            "insufficient inventory for '{name}': need {needed}, have {available}"
        )));
    }
    Ok(())
}

/// A material requirement in base units.
struct MaterialNeed<'t> {
    material_id: MaterialId,
    label: &'t str,
    required: Decimal,
}

/// Resolve a material line from the caller's allocation, or queue it for a
/// greedy fill once every fixed allocation has claimed its stock.
fn material_line<'t>(
    t: &Tables,
    composition: &Composition,
    need: MaterialNeed<'t>,
    allocations: &Allocations,
    deferred: &mut Vec<(usize, MaterialNeed<'t>)>,
    index: usize,
) -> DomainResult<ResolvedLine> {
    let composition_id = composition.id();
    match allocations.get(&composition_id) {
        Some(chosen) => {
            validate_allocation(need.label, need.required, chosen)?;
            for allocation in chosen {
                let product = t.material_product(allocation.product_id)?;
                if product.material_id != need.material_id {
                    return Err(DomainError::validation(format!(
                        "product '{}' cannot fill '{}': it is not a product of that material",
                        product.name, need.label
                    )));
                }
            }
            Ok(ResolvedLine::Products { composition_id, allocations: chosen.clone() })
        }
        None if composition.is_generic() => {
            validate_allocation(need.label, need.required, &[])?;
            Ok(ResolvedLine::Products { composition_id, allocations: Vec::new() })
        }
        None => {
            deferred.push((index, need));
            Ok(ResolvedLine::Products { composition_id, allocations: Vec::new() })
        }
    }
}

#[derive(Clone, Copy)]
pub struct CompositionResolver<'a> {
    db: &'a Database,
}

impl<'a> CompositionResolver<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn compositions(&self, finished_good_id: FinishedGoodId) -> DomainResult<Vec<Composition>> {
        self.db.read(|t| {
            t.finished_good(finished_good_id)?;
            t.compositions_of(finished_good_id)
        })?
    }

    /// Generic placeholders of a finished good that `allocations` leaves open.
    pub fn unresolved_placeholders(
        &self,
        finished_good_id: FinishedGoodId,
        allocations: &Allocations,
    ) -> DomainResult<Vec<Composition>> {
        Ok(self
            .compositions(finished_good_id)?
            .into_iter()
            .filter(|c| c.is_generic() && !allocations.contains_key(&c.id()))
            .collect())
    }

    /// Resolve and check an assembly without recording it.
    pub fn plan_assembly(
        &self,
        finished_good_id: FinishedGoodId,
        quantity: u32,
        allocations: &Allocations,
    ) -> DomainResult<AssemblyPlan> {
        self.db.read(|t| resolve_assembly(t, finished_good_id, quantity, allocations))?
    }

    /// Assemble `quantity` finished goods.
    ///
    /// Components are consumed, costs are frozen onto consumption records as
    /// of now, and the assembled good's stock grows by `quantity`. Nothing is
    /// consumed unless every line resolves and every product has stock.
    pub fn record_assembly(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        finished_good_id: FinishedGoodId,
        quantity: u32,
        allocations: &Allocations,
        notes: Option<String>,
    ) -> DomainResult<AssemblyRun> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let plan = resolve_assembly(t, finished_good_id, quantity, allocations)
                .inspect_err(|e| warn!(finished_good = %finished_good_id, error = %e, "assembly blocked"))?;
            let name = t.finished_good(finished_good_id)?.name.clone();

            // Price components before any stock moves.
            let mut component_costs = Vec::new();
            for line in &plan.lines {
                if let ResolvedLine::Component { component, quantity, .. } = line {
                    component_costs.push((*component, *quantity, component_unit_cost(t, *component)?));
                }
            }

            let run_id = AssemblyRunId::new();
            let now = Utc::now();
            let mut total = Decimal::ZERO;

            for (component, count, unit_cost) in component_costs {
                match component {
                    ComponentRef::FinishedUnit(id) => take(&mut t.finished_unit_mut(id)?.inventory_count, count)?,
                    ComponentRef::FinishedGood(id) => take(&mut t.finished_good_mut(id)?.inventory_count, count)?,
                    _ => return Err(DomainError::invariant("component line holds a material")),
                }
                let record =
                    ConsumptionRecorder::record_component(t, run_id, component, Decimal::from(count), unit_cost, now)?;
                total += record.total_cost;
            }
            for line in &plan.lines {
                if let ResolvedLine::Products { allocations, .. } = line {
                    for allocation in allocations {
                        let cost = t.material_product_mut(allocation.product_id)?.issue(allocation.quantity)?;
                        ConsumptionRecorder::record_material(
                            t,
                            *run_id.as_uuid(),
                            allocation.product_id,
                            allocation.quantity,
                            cost,
                            None,
                            now,
                        )?;
                        total += cost;
                    }
                }
            }

            let run = AssemblyRun::new(run_id, finished_good_id, &name, quantity, total, notes, now);
            t.insert_assembly_run(run.clone());
            t.finished_good_mut(finished_good_id)?.inventory_count += u64::from(quantity);
            info!(
                run = %run.id,
                finished_good = %finished_good_id,
                quantity,
                total_cost = %run.total_component_cost,
                "assembly recorded"
            );
            Ok(run)
        })
    }

    /// Remove an assembly run. Its consumption records stay in the journal
    /// and stock is not restored.
    pub fn delete_assembly_run(&self, uow: Option<&mut UnitOfWork<'_>>, run_id: AssemblyRunId) -> DomainResult<AssemblyRun> {
        self.db.run(uow, |uow| {
            let run = uow.tables_mut().delete_assembly_run(run_id)?;
            info!(run = %run_id, "assembly run deleted; audit records preserved");
            Ok(run)
        })
    }

    pub fn assembly_run(&self, run_id: AssemblyRunId) -> DomainResult<AssemblyRun> {
        self.db.read(|t| t.assembly_run(run_id).cloned())?
    }
}

fn take(stock: &mut u64, count: u64) -> DomainResult<()> {
    *stock = stock
        .checked_sub(count)
        .ok_or_else(|| DomainError::invariant("finished stock would go negative"))?;
    Ok(())
}
