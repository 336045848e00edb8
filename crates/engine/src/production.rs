//! Production runs: yield accounting, ingredient consumption and loss
//! records.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use larder_catalog::{FinishedUnitId, IngredientId, RecipeId};
use larder_core::{CodeList, DomainError, DomainResult};
use larder_infra::{Database, Tables, UnitOfWork};
use larder_inventory::FifoPlan;
use larder_production::{ProductionConsumption, ProductionLoss, ProductionRun, ProductionRunId, YieldOutcome};

use crate::ledger::{apply_plan, plan_consumption, shortfall_error};
use crate::recorder::ConsumptionRecorder;
use crate::units::UnitConverter;

/// Supplies a recipe's batch size.
pub trait YieldLookup {
    fn items_per_batch(&self, recipe_id: RecipeId) -> DomainResult<u32>;
}

impl YieldLookup for Tables {
    fn items_per_batch(&self, recipe_id: RecipeId) -> DomainResult<u32> {
        Ok(self.recipe(recipe_id)?.items_per_batch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionRequest {
    pub recipe_id: RecipeId,
    pub finished_unit_id: FinishedUnitId,
    pub num_batches: u32,
    pub actual_yield: u64,
    pub loss_category: Option<String>,
    pub loss_notes: Option<String>,
    pub notes: Option<String>,
}

impl ProductionRequest {
    pub fn new(recipe_id: RecipeId, finished_unit_id: FinishedUnitId, num_batches: u32, actual_yield: u64) -> Self {
        Self {
            recipe_id,
            finished_unit_id,
            num_batches,
            actual_yield,
            loss_category: None,
            loss_notes: None,
            notes: None,
        }
    }

    pub fn with_loss(mut self, category: impl Into<String>, notes: Option<String>) -> Self {
        self.loss_category = Some(category.into());
        self.loss_notes = notes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionResult {
    pub run: ProductionRun,
    pub loss: Option<ProductionLoss>,
    pub consumptions: Vec<ProductionConsumption>,
}

/// Units and cost lost for one finished unit, read from the loss journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LossSummary {
    pub quantity: u64,
    pub cost: Decimal,
    pub by_category: BTreeMap<String, u64>,
}

#[derive(Clone, Copy)]
pub struct ProductionLossTracker<'a> {
    db: &'a Database,
    converter: &'a dyn UnitConverter,
    categories: &'a CodeList,
}

impl<'a> ProductionLossTracker<'a> {
    pub fn new(db: &'a Database, converter: &'a dyn UnitConverter, categories: &'a CodeList) -> Self {
        Self {
            db,
            converter,
            categories,
        }
    }

    /// Record a production event.
    ///
    /// Every rule is checked before the first lot is touched. The full batch
    /// is consumed whatever the outcome; only `actual_yield` reaches stock.
    pub fn record_production(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        request: ProductionRequest,
    ) -> DomainResult<ProductionResult> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            if request.num_batches == 0 {
                return Err(DomainError::validation("number of batches must be positive"));
            }
            let recipe = t.recipe(request.recipe_id)?.clone();
            let unit = t.finished_unit(request.finished_unit_id)?;
            if unit.recipe_id != recipe.id {
                return Err(DomainError::validation(format!(
                    "finished unit '{}' is not made by recipe '{}'",
                    unit.name, recipe.name
                )));
            }
            let unit_name = unit.name.clone();

            let expected = u64::from(request.num_batches) * u64::from(t.items_per_batch(recipe.id)?);
            let outcome = YieldOutcome::derive(expected, request.actual_yield)
                .inspect_err(|e| warn!(recipe = %recipe.id, error = %e, "production rejected"))?;
            if outcome.loss() > 0 {
                if let Some(code) = &request.loss_category {
                    self.categories.validate(code, request.loss_notes.as_deref())?;
                }
            }

            let plans = self.plan_ingredients(t, &recipe.lines, request.num_batches)?;
            let total_cost: Decimal = plans.iter().map(|(_, plan)| plan.total_cost).sum();

            let run = ProductionRun::new(
                recipe.id,
                &recipe.name,
                request.finished_unit_id,
                &unit_name,
                request.num_batches,
                outcome,
                total_cost,
                Utc::now(),
                request.notes,
            );

            for (_, plan) in &plans {
                apply_plan(t, plan)?;
            }
            t.insert_production_run(run.clone());
            let mut consumptions = Vec::new();
            for (ingredient_id, plan) in &plans {
                for draw in &plan.lots_touched {
                    consumptions.push(ConsumptionRecorder::record_ingredient_draw(t, &run, *ingredient_id, draw)?);
                }
            }
            let loss = ProductionLoss::for_run(
                &run,
                request.loss_category.as_deref(),
                request.loss_notes,
                self.categories,
            )?;
            if let Some(loss) = &loss {
                ConsumptionRecorder::record_loss(t, loss);
            }
            t.finished_unit_mut(run.finished_unit_id)?.inventory_count += run.actual_yield;

            info!(
                run = %run.id,
                expected = run.expected_yield,
                actual = run.actual_yield,
                loss = run.loss_quantity,
                status = ?run.status,
                per_unit_cost = %run.per_unit_cost,
                "production recorded"
            );
            Ok(ProductionResult { run, loss, consumptions })
        })
    }

    /// One FIFO plan per ingredient, each fully satisfied.
    ///
    /// Lines naming the same ingredient are merged first so their plans never
    /// draw on the same lot twice.
    fn plan_ingredients(
        &self,
        t: &Tables,
        lines: &[larder_catalog::RecipeLine],
        num_batches: u32,
    ) -> DomainResult<Vec<(IngredientId, FifoPlan)>> {
        let batches = Decimal::from(num_batches);
        let mut needs: Vec<(IngredientId, String, Decimal)> = Vec::new();
        for line in lines {
            let quantity = line.quantity * batches;
            match needs.iter_mut().find(|(id, _, _)| *id == line.ingredient_id) {
                Some((id, unit, total)) => {
                    let density = t.ingredient(*id)?.density_g_per_ml;
                    *total += self.converter.convert(quantity, &line.unit, unit, density)?;
                }
                None => needs.push((line.ingredient_id, line.unit.clone(), quantity)),
            }
        }

        let mut plans = Vec::with_capacity(needs.len());
        for (ingredient_id, unit, quantity) in needs {
            let plan = plan_consumption(t, self.converter, ingredient_id, quantity, &unit)?;
            if !plan.is_satisfied() {
                let name = &t.ingredient(ingredient_id)?.name;
                warn!(ingredient = %ingredient_id, shortfall = %plan.shortfall, "production blocked by shortfall");
                return Err(shortfall_error(name, &plan, &unit));
            }
            plans.push((ingredient_id, plan));
        }
        Ok(plans)
    }

    /// Remove a run. Its loss and consumption records stay in the journal
    /// and inventory effects are not reversed.
    pub fn delete_production_run(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        run_id: ProductionRunId,
    ) -> DomainResult<ProductionRun> {
        self.db.run(uow, |uow| {
            let run = uow.tables_mut().delete_production_run(run_id)?;
            info!(run = %run_id, "production run deleted; audit records preserved");
            Ok(run)
        })
    }

    pub fn run(&self, run_id: ProductionRunId) -> DomainResult<ProductionRun> {
        self.db.read(|t| t.production_run(run_id).cloned())?
    }

    /// Live runs for a finished unit, oldest first.
    pub fn production_history(&self, finished_unit_id: FinishedUnitId) -> DomainResult<Vec<ProductionRun>> {
        self.db.read(|t| {
            let mut runs: Vec<ProductionRun> = t
                .production_runs()
                .filter(|r| r.finished_unit_id == finished_unit_id)
                .cloned()
                .collect();
            runs.sort_by_key(|r| r.produced_at);
            runs
        })
    }

    /// Totals over every recorded loss, including those of deleted runs.
    pub fn loss_summary(&self, finished_unit_id: FinishedUnitId) -> DomainResult<LossSummary> {
        self.db.read(|t| {
            let mut summary = LossSummary::default();
            for loss in t.audit().production_losses().filter(|l| l.finished_unit_id == finished_unit_id) {
                summary.quantity += loss.quantity;
                summary.cost += loss.total_loss_cost;
                *summary.by_category.entry(loss.category.clone()).or_default() += loss.quantity;
            }
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_catalog::{FinishedUnit, Ingredient, Recipe, RecipeLine};
    use larder_production::ProductionStatus;

    use crate::ledger::{IngredientPurchase, InventoryLedger};
    use crate::units::StandardUnitConverter;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn categories() -> CodeList {
        CodeList::new("loss category", ["burnt", "broken", "other"], "other").unwrap()
    }

    struct Bakery {
        db: Database,
        flour: IngredientId,
        recipe: RecipeId,
        cookie: FinishedUnitId,
    }

    /// 2 cups flour per batch of 24, with 10 cups at $0.10 in stock.
    fn bakery() -> Bakery {
        let db = Database::new();
        let flour = Ingredient::new("flour", "Flour", "baking", "cup").unwrap();
        let recipe = Recipe::new(
            "Sugar cookies",
            24,
            vec![RecipeLine { ingredient_id: flour.id, quantity: dec("2"), unit: "cup".into() }],
        )
        .unwrap();
        let cookie = FinishedUnit::new("sugar-cookie", "Sugar cookie", recipe.id).unwrap();
        let bakery = Bakery { db, flour: flour.id, recipe: recipe.id, cookie: cookie.id };
        bakery
            .db
            .run(None, |uow| {
                let t = uow.tables_mut();
                t.ingredients.insert(flour.id, flour);
                t.recipes.insert(recipe.id, recipe);
                t.finished_units.insert(cookie.id, cookie);
                Ok(())
            })
            .unwrap();
        let reasons = CodeList::new("depletion reason", ["other"], "other").unwrap();
        InventoryLedger::new(&bakery.db, &StandardUnitConverter, &reasons)
            .record_purchase(None, IngredientPurchase::new(bakery.flour, dec("10"), "cup", dec("1.00")))
            .unwrap();
        bakery
    }

    fn inventory(b: &Bakery) -> u64 {
        b.db.read(|t| t.finished_unit(b.cookie).map(|f| f.inventory_count)).unwrap().unwrap()
    }

    #[test]
    fn partial_loss_derives_loss_and_cost() {
        let b = bakery();
        let cats = categories();
        let tracker = ProductionLossTracker::new(&b.db, &StandardUnitConverter, &cats);

        let result = tracker
            .record_production(None, ProductionRequest::new(b.recipe, b.cookie, 1, 18).with_loss("burnt", None))
            .unwrap();

        assert_eq!(result.run.loss_quantity, 6);
        assert_eq!(result.run.status, ProductionStatus::PartialLoss);
        assert_eq!(result.run.total_ingredient_cost, dec("0.20"));
        let loss = result.loss.unwrap();
        assert_eq!(loss.category, "burnt");
        assert_eq!(loss.total_loss_cost, dec("6") * (dec("0.20") / dec("24")));
        assert_eq!(inventory(&b), 18);
        assert_eq!(result.consumptions.len(), 1);
        assert_eq!(result.consumptions[0].ingredient_name, "Flour");
    }

    #[test]
    fn loss_category_defaults_to_other() {
        let b = bakery();
        let cats = categories();
        let tracker = ProductionLossTracker::new(&b.db, &StandardUnitConverter, &cats);
        let result = tracker
            .record_production(None, ProductionRequest::new(b.recipe, b.cookie, 1, 20))
            .unwrap();
        assert_eq!(result.loss.unwrap().category, "other");
    }

    #[test]
    fn complete_run_writes_no_loss() {
        let b = bakery();
        let cats = categories();
        let tracker = ProductionLossTracker::new(&b.db, &StandardUnitConverter, &cats);
        let result = tracker
            .record_production(None, ProductionRequest::new(b.recipe, b.cookie, 2, 48))
            .unwrap();
        assert_eq!(result.run.status, ProductionStatus::Complete);
        assert!(result.loss.is_none());
        assert_eq!(result.run.per_unit_cost, dec("0.40") / dec("48"));
    }

    #[test]
    fn invalid_loss_category_is_rejected_before_consumption() {
        let b = bakery();
        let cats = categories();
        let tracker = ProductionLossTracker::new(&b.db, &StandardUnitConverter, &cats);
        let err = tracker
            .record_production(None, ProductionRequest::new(b.recipe, b.cookie, 1, 10).with_loss("stolen", None))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(b.db.read(|t| t.lots.values().map(|l| l.quantity()).sum::<Decimal>()).unwrap(), dec("10"));
    }

    #[test]
    fn shortfall_blocks_production() {
        let b = bakery();
        let cats = categories();
        let tracker = ProductionLossTracker::new(&b.db, &StandardUnitConverter, &cats);
        let err = tracker
            .record_production(None, ProductionRequest::new(b.recipe, b.cookie, 6, 144))
            .unwrap_err();
        assert!(err.to_string().contains("insufficient inventory for 'Flour'"));
        assert_eq!(inventory(&b), 0);
        assert_eq!(b.db.read(|t| t.production_runs().count()).unwrap(), 0);
    }

    #[test]
    fn wrong_recipe_for_unit_is_rejected() {
        let b = bakery();
        let cats = categories();
        let tracker = ProductionLossTracker::new(&b.db, &StandardUnitConverter, &cats);
        let err = tracker
            .record_production(None, ProductionRequest::new(RecipeId::new(), b.cookie, 1, 1))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn deleting_run_preserves_loss_history() {
        let b = bakery();
        let cats = categories();
        let tracker = ProductionLossTracker::new(&b.db, &StandardUnitConverter, &cats);
        let result = tracker
            .record_production(None, ProductionRequest::new(b.recipe, b.cookie, 1, 20).with_loss("broken", None))
            .unwrap();

        tracker.delete_production_run(None, result.run.id).unwrap();
        assert!(matches!(tracker.run(result.run.id), Err(DomainError::NotFound(_))));
        assert!(tracker.production_history(b.cookie).unwrap().is_empty());

        let summary = tracker.loss_summary(b.cookie).unwrap();
        assert_eq!(summary.quantity, 4);
        assert_eq!(summary.by_category.get("broken"), Some(&4));
        let recorder = ConsumptionRecorder::new(&b.db);
        assert_eq!(recorder.production_losses(result.run.id).unwrap().len(), 1);
        assert_eq!(recorder.production_consumptions(result.run.id).unwrap().len(), 1);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn yield_equation_holds(actual in 0u64..=24) {
                let b = bakery();
                let cats = categories();
                let tracker = ProductionLossTracker::new(&b.db, &StandardUnitConverter, &cats);
                let run = tracker
                    .record_production(None, ProductionRequest::new(b.recipe, b.cookie, 1, actual))
                    .unwrap()
                    .run;
                prop_assert_eq!(run.actual_yield + run.loss_quantity, run.expected_yield);
                prop_assert_eq!(inventory(&b), actual);
            }
        }
    }
}
