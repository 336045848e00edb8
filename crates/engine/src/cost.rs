//! Current cost of finished units and goods, computed on every call.
//!
//! Nothing here writes a cost back onto a definition. The only frozen costs
//! are the ones copied onto consumption records when a transaction happens.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use larder_catalog::{ComponentKind, ComponentRef, CompositionId, FinishedGoodId, FinishedUnitId, IngredientId, RecipeId};
use larder_core::{DomainError, DomainResult, ensure_positive};
use larder_infra::{Database, FallbackPolicy, Tables};

use crate::ledger::{latest_unit_cost, plan_consumption};
use crate::units::UnitConverter;
use crate::weighted_average::material_cost;

/// What to cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostTarget {
    FinishedUnit(FinishedUnitId),
    FinishedGood(FinishedGoodId),
}

impl From<FinishedUnitId> for CostTarget {
    fn from(id: FinishedUnitId) -> Self {
        CostTarget::FinishedUnit(id)
    }
}

impl From<FinishedGoodId> for CostTarget {
    fn from(id: FinishedGoodId) -> Self {
        CostTarget::FinishedGood(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostLine {
    pub composition_id: CompositionId,
    pub kind: ComponentKind,
    pub component_name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub is_generic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostBreakdown {
    pub finished_good_id: FinishedGoodId,
    pub name: String,
    pub lines: Vec<CostLine>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientCostPreview {
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
    pub unit: String,
    pub fifo_cost: Decimal,
    /// Unsatisfied quantity, in `unit`.
    pub shortfall: Decimal,
    /// Price per `unit` applied to the shortfall.
    pub fallback_unit_price: Decimal,
    pub total_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeCostPreview {
    pub recipe_id: RecipeId,
    pub num_batches: u32,
    pub lines: Vec<IngredientCostPreview>,
    pub total_cost: Decimal,
    /// `total_cost` spread over the expected yield.
    pub per_unit_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostReportEntry {
    pub id: uuid::Uuid,
    pub name: String,
    pub inventory_count: u64,
    pub current_cost: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CostReport {
    pub finished_units: Vec<CostReportEntry>,
    pub finished_goods: Vec<CostReportEntry>,
}

/// Production-weighted average cost of a finished unit; zero with no output.
pub(crate) fn finished_unit_cost(t: &Tables, id: FinishedUnitId) -> DomainResult<Decimal> {
    t.finished_unit(id)?;
    let mut weighted = Decimal::ZERO;
    let mut produced: u64 = 0;
    for run in t.production_runs().filter(|r| r.finished_unit_id == id) {
        weighted += run.per_unit_cost * Decimal::from(run.actual_yield);
        produced += run.actual_yield;
    }
    if produced == 0 {
        return Ok(Decimal::ZERO);
    }
    Ok(weighted / Decimal::from(produced))
}

/// Current cost of one unit of `component`.
pub(crate) fn component_unit_cost(t: &Tables, component: ComponentRef) -> DomainResult<Decimal> {
    let mut visiting = BTreeSet::new();
    component_cost(t, component, &mut visiting)
}

fn component_cost(t: &Tables, component: ComponentRef, visiting: &mut BTreeSet<FinishedGoodId>) -> DomainResult<Decimal> {
    match component {
        ComponentRef::FinishedUnit(id) => finished_unit_cost(t, id),
        ComponentRef::FinishedGood(id) => finished_good_cost(t, id, visiting),
        ComponentRef::Packaging(id) => Ok(t.material_product(id)?.weighted_avg_cost()),
        ComponentRef::MaterialUnit(id) => {
            let unit = t.material_unit(id)?;
            Ok(material_cost(t, unit.material_id)? * unit.quantity_per_unit)
        }
        ComponentRef::Material(id) => material_cost(t, id),
    }
}

fn finished_good_cost(t: &Tables, id: FinishedGoodId, visiting: &mut BTreeSet<FinishedGoodId>) -> DomainResult<Decimal> {
    t.finished_good(id)?;
    if !visiting.insert(id) {
        return Err(DomainError::invariant(format!("finished good {id} contains itself")));
    }
    let mut total = Decimal::ZERO;
    for composition in t.compositions_of(id)? {
        total += component_cost(t, composition.component(), visiting)? * composition.component_quantity();
    }
    visiting.remove(&id);
    Ok(total)
}

#[derive(Clone, Copy)]
pub struct CostEngine<'a> {
    db: &'a Database,
    converter: &'a dyn UnitConverter,
    fallback: FallbackPolicy,
}

impl<'a> CostEngine<'a> {
    pub fn new(db: &'a Database, converter: &'a dyn UnitConverter, fallback: FallbackPolicy) -> Self {
        Self { db, converter, fallback }
    }

    /// Cost of one finished unit or finished good at current prices.
    pub fn calculate_current_cost(&self, target: impl Into<CostTarget>) -> DomainResult<Decimal> {
        let target = target.into();
        let cost = self.db.read(|t| match target {
            CostTarget::FinishedUnit(id) => finished_unit_cost(t, id),
            CostTarget::FinishedGood(id) => component_unit_cost(t, ComponentRef::FinishedGood(id)),
        })??;
        debug!(target = ?target, cost = %cost, "current cost computed");
        Ok(cost)
    }

    /// Per-composition costing of a finished good.
    pub fn cost_breakdown(&self, finished_good_id: FinishedGoodId) -> DomainResult<CostBreakdown> {
        self.db.read(|t| {
            let good = t.finished_good(finished_good_id)?;
            let mut lines = Vec::new();
            for composition in t.compositions_of(finished_good_id)? {
                let component = composition.component();
                let unit_cost = component_unit_cost(t, component)?;
                lines.push(CostLine {
                    composition_id: composition.id(),
                    kind: component.kind(),
                    component_name: t.component_name(component)?,
                    quantity: composition.component_quantity(),
                    unit_cost,
                    total_cost: unit_cost * composition.component_quantity(),
                    is_generic: composition.is_generic(),
                });
            }
            Ok(CostBreakdown {
                finished_good_id,
                name: good.name.clone(),
                total: lines.iter().map(|l| l.total_cost).sum(),
                lines,
            })
        })?
    }

    /// FIFO cost of `quantity` `unit`, with any shortfall priced at a
    /// fallback. Changes nothing.
    pub fn preview_ingredient_cost(
        &self,
        ingredient_id: IngredientId,
        quantity: Decimal,
        unit: &str,
        fallback_unit_price: Option<Decimal>,
    ) -> DomainResult<IngredientCostPreview> {
        self.db.read(|t| self.preview_in(t, ingredient_id, quantity, unit, fallback_unit_price))?
    }

    fn preview_in(
        &self,
        t: &Tables,
        ingredient_id: IngredientId,
        quantity: Decimal,
        unit: &str,
        fallback_unit_price: Option<Decimal>,
    ) -> DomainResult<IngredientCostPreview> {
        let plan = plan_consumption(t, self.converter, ingredient_id, quantity, unit)?;
        let fallback_unit_price = match (fallback_unit_price, self.fallback) {
            (Some(price), _) => price,
            (None, FallbackPolicy::LatestPurchase) => {
                latest_unit_cost(t, self.converter, ingredient_id, unit)?.unwrap_or_default()
            }
            (None, FallbackPolicy::Zero) => Decimal::ZERO,
        };
        let total_cost = plan.total_cost + plan.shortfall * fallback_unit_price;
        debug!(
            ingredient = %ingredient_id,
            fifo_cost = %plan.total_cost,
            shortfall = %plan.shortfall,
            total_cost = %total_cost,
            "ingredient cost preview"
        );
        Ok(IngredientCostPreview {
            ingredient_id,
            quantity,
            unit: unit.to_string(),
            fifo_cost: plan.total_cost,
            shortfall: plan.shortfall,
            fallback_unit_price,
            total_cost,
        })
    }

    /// Preview the ingredient cost of `num_batches` batches of a recipe.
    pub fn preview_recipe_cost(&self, recipe_id: RecipeId, num_batches: u32) -> DomainResult<RecipeCostPreview> {
        ensure_positive("number of batches", Decimal::from(num_batches))?;
        self.db.read(|t| {
            let recipe = t.recipe(recipe_id)?;
            let batches = Decimal::from(num_batches);
            // Lines naming the same ingredient draw on the same lots.
            let mut needs: Vec<(IngredientId, String, Decimal)> = Vec::new();
            for line in &recipe.lines {
                let quantity = line.quantity * batches;
                match needs.iter_mut().find(|(id, _, _)| *id == line.ingredient_id) {
                    Some((id, unit, total)) => {
                        let density = t.ingredient(*id)?.density_g_per_ml;
                        *total += self.converter.convert(quantity, &line.unit, unit, density)?;
                    }
                    None => needs.push((line.ingredient_id, line.unit.clone(), quantity)),
                }
            }
            let lines = needs
                .iter()
                .map(|(id, unit, quantity)| self.preview_in(t, *id, *quantity, unit, None))
                .collect::<DomainResult<Vec<_>>>()?;
            let total_cost: Decimal = lines.iter().map(|l| l.total_cost).sum();
            let expected = Decimal::from(recipe.items_per_batch) * batches;
            Ok(RecipeCostPreview {
                recipe_id,
                num_batches,
                lines,
                total_cost,
                per_unit_cost: total_cost / expected,
            })
        })?
    }

    /// Current cost and stock of every finished unit and finished good.
    pub fn cost_report(&self) -> DomainResult<CostReport> {
        self.db.read(|t| {
            let mut report = CostReport::default();
            for unit in t.finished_units.values() {
                report.finished_units.push(CostReportEntry {
                    id: *unit.id.as_uuid(),
                    name: unit.name.clone(),
                    inventory_count: unit.inventory_count,
                    current_cost: finished_unit_cost(t, unit.id)?,
                });
            }
            for good in t.finished_goods.values() {
                report.finished_goods.push(CostReportEntry {
                    id: *good.id.as_uuid(),
                    name: good.name.clone(),
                    inventory_count: good.inventory_count,
                    current_cost: component_unit_cost(t, ComponentRef::FinishedGood(good.id))?,
                });
            }
            Ok(report)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use larder_catalog::{Composition, FinishedGood, FinishedUnit, Ingredient, Material, MaterialUnit, Recipe};
    use larder_materials::MaterialProduct;
    use larder_production::{ProductionRun, YieldOutcome};

    use crate::units::StandardUnitConverter;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn run(unit: &FinishedUnit, expected: u64, actual: u64, total: &str) -> ProductionRun {
        ProductionRun::new(
            unit.recipe_id,
            "Cookies",
            unit.id,
            &unit.name,
            1,
            YieldOutcome::derive(expected, actual).unwrap(),
            dec(total),
            Utc::now(),
            None,
        )
    }

    #[test]
    fn finished_unit_cost_is_yield_weighted_average() {
        let db = Database::new();
        let recipe = Recipe::new("Cookies", 10, vec![]).unwrap();
        let cookie = FinishedUnit::new("cookie", "Cookie", recipe.id).unwrap();
        let id = cookie.id;
        db.run(None, |uow| {
            let t = uow.tables_mut();
            // The total-loss run carries no weight.
            t.insert_production_run(run(&cookie, 10, 10, "1.00"));
            t.insert_production_run(run(&cookie, 30, 30, "6.00"));
            t.insert_production_run(run(&cookie, 10, 0, "5.00"));
            t.finished_units.insert(cookie.id, cookie);
            t.recipes.insert(recipe.id, recipe);
            Ok(())
        })
        .unwrap();

        let engine = CostEngine::new(&db, &StandardUnitConverter, FallbackPolicy::LatestPurchase);
        assert_eq!(engine.calculate_current_cost(id).unwrap(), dec("0.175"));
    }

    #[test]
    fn unit_without_history_costs_zero() {
        let db = Database::new();
        let cookie = FinishedUnit::new("cookie", "Cookie", larder_catalog::RecipeId::new()).unwrap();
        let id = cookie.id;
        db.run(None, |uow| {
            uow.tables_mut().finished_units.insert(cookie.id, cookie);
            Ok(())
        })
        .unwrap();
        let engine = CostEngine::new(&db, &StandardUnitConverter, FallbackPolicy::Zero);
        assert_eq!(engine.calculate_current_cost(id).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn finished_good_sums_nested_components_and_tracks_price_changes() {
        let db = Database::new();
        let recipe = Recipe::new("Cookies", 10, vec![]).unwrap();
        let cookie = FinishedUnit::new("cookie", "Cookie", recipe.id).unwrap();
        let bag = FinishedGood::new("bag", "Cookie bag").unwrap();
        let hamper = FinishedGood::new("hamper", "Hamper").unwrap();
        let ribbon = Material::new("ribbon", "Ribbon", "trim", "inch").unwrap();
        let bow = MaterialUnit::new("bow", "Bow", ribbon.id, dec("18")).unwrap();
        let red = MaterialProduct::new(ribbon.id, "Red ribbon", None, None, 1)
            .unwrap()
            .with_stock(dec("100"), dec("0.02"))
            .unwrap();
        let baskets = Material::new("basket", "Basket", "packaging", "each").unwrap();
        let basket = MaterialProduct::new(baskets.id, "Wicker basket", None, None, 2)
            .unwrap()
            .with_stock(Decimal::ZERO, dec("3.00"))
            .unwrap();
        let (red_id, hamper_id, bag_id) = (red.id, hamper.id, bag.id);

        db.run(None, |uow| {
            let t = uow.tables_mut();
            t.insert_production_run(run(&cookie, 10, 10, "2.00"));
            t.insert_composition(&Composition::new(bag.id, ComponentRef::FinishedUnit(cookie.id), dec("6"), false)?)?;
            t.insert_composition(&Composition::new(bag.id, ComponentRef::MaterialUnit(bow.id), dec("1"), false)?)?;
            t.insert_composition(&Composition::new(hamper.id, ComponentRef::FinishedGood(bag.id), dec("2"), false)?)?;
            t.insert_composition(&Composition::new(hamper.id, ComponentRef::Packaging(basket.id), dec("1"), false)?)?;
            t.recipes.insert(recipe.id, recipe);
            t.finished_units.insert(cookie.id, cookie);
            t.finished_goods.insert(bag.id, bag);
            t.finished_goods.insert(hamper.id, hamper);
            t.materials.insert(ribbon.id, ribbon);
            t.materials.insert(baskets.id, baskets);
            t.material_units.insert(bow.id, bow);
            t.material_products.insert(red.id, red);
            t.material_products.insert(basket.id, basket);
            Ok(())
        })
        .unwrap();

        let engine = CostEngine::new(&db, &StandardUnitConverter, FallbackPolicy::LatestPurchase);
        // Bag: 6 × 0.20 + 18 in × 0.02 = 1.56.
        assert_eq!(engine.calculate_current_cost(bag_id).unwrap(), dec("1.56"));
        // Hamper: 2 bags + basket at 3.00.
        assert_eq!(engine.calculate_current_cost(hamper_id).unwrap(), dec("6.12"));

        db.run(None, |uow| uow.tables_mut().material_product_mut(red_id)?.receive(dec("100"), dec("0.04")))
            .unwrap();
        assert_eq!(engine.calculate_current_cost(bag_id).unwrap(), dec("1.74"));

        let breakdown = engine.cost_breakdown(hamper_id).unwrap();
        assert_eq!(breakdown.lines.len(), 2);
        assert_eq!(breakdown.total, dec("6.48"));
    }

    #[test]
    fn preview_uses_latest_purchase_when_no_fallback_given() {
        let db = Database::new();
        let sugar = Ingredient::new("sugar", "Sugar", "baking", "cup").unwrap();
        let id = sugar.id;
        db.run(None, |uow| {
            let t = uow.tables_mut();
            t.ingredients.insert(sugar.id, sugar);
            let seq = t.next_sequence();
            let lot = larder_inventory::InventoryItem::purchased(id, None, dec("1"), "cup", dec("0.30"), Utc::now(), seq)?;
            t.lots.insert(lot.id(), lot);
            Ok(())
        })
        .unwrap();

        let latest = CostEngine::new(&db, &StandardUnitConverter, FallbackPolicy::LatestPurchase);
        let preview = latest.preview_ingredient_cost(id, dec("3"), "cup", None).unwrap();
        assert_eq!(preview.shortfall, dec("2"));
        assert_eq!(preview.fallback_unit_price, dec("0.30"));
        assert_eq!(preview.total_cost, dec("0.90"));

        let zero = CostEngine::new(&db, &StandardUnitConverter, FallbackPolicy::Zero);
        assert_eq!(zero.preview_ingredient_cost(id, dec("3"), "cup", None).unwrap().total_cost, dec("0.30"));
    }

    #[test]
    fn recipe_preview_merges_lines_for_the_same_ingredient() {
        let db = Database::new();
        let sugar = Ingredient::new("sugar", "Sugar", "baking", "cup").unwrap();
        let id = sugar.id;
        let line = |quantity: &str| larder_catalog::RecipeLine { ingredient_id: id, quantity: dec(quantity), unit: "cup".into() };
        let recipe = Recipe::new("Syrup", 4, vec![line("1"), line("1")]).unwrap();
        let recipe_id = recipe.id;
        db.run(None, |uow| {
            let t = uow.tables_mut();
            t.ingredients.insert(sugar.id, sugar);
            t.recipes.insert(recipe.id, recipe);
            let seq = t.next_sequence();
            let lot = larder_inventory::InventoryItem::purchased(id, None, dec("1"), "cup", dec("0.50"), Utc::now(), seq)?;
            t.lots.insert(lot.id(), lot);
            Ok(())
        })
        .unwrap();

        let engine = CostEngine::new(&db, &StandardUnitConverter, FallbackPolicy::LatestPurchase);
        let preview = engine.preview_recipe_cost(recipe_id, 1).unwrap();
        assert_eq!(preview.lines.len(), 1);
        assert_eq!(preview.lines[0].quantity, dec("2"));
        assert_eq!(preview.lines[0].fifo_cost, dec("0.50"));
        assert_eq!(preview.lines[0].shortfall, dec("1"));
        assert_eq!(preview.total_cost, dec("1.00"));
        assert_eq!(preview.per_unit_cost, dec("0.25"));
    }
}
