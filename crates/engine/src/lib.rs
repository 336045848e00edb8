//! Inventory costing and consumption engine.
//!
//! [`Engine`] owns the database and the configured code lists and hands out
//! borrowed service views over them. Every mutating service call accepts an
//! optional [`UnitOfWork`]; without one the call opens, and commits, its own.

pub mod catalog;
pub mod composition;
pub mod cost;
pub mod ledger;
pub mod production;
pub mod recorder;
pub mod units;
pub mod weighted_average;

use std::sync::Arc;

use larder_core::{CodeList, DomainResult};
use larder_infra::{ConfigError, CostingConfig, Database, EngineConfig, UnitOfWork};

pub use catalog::CatalogService;
pub use composition::{AssemblyPlan, CompositionResolver, ResolvedLine};
pub use cost::{CostBreakdown, CostEngine, CostLine, CostReport, CostTarget, IngredientCostPreview, RecipeCostPreview};
pub use ledger::{IngredientPurchase, IngredientValuation, InventoryLedger, InventoryValuation};
pub use production::{LossSummary, ProductionLossTracker, ProductionRequest, ProductionResult, YieldLookup};
pub use recorder::{AssemblyConsumptions, ConsumptionRecorder};
pub use units::{StandardUnitConverter, UnitConverter};
pub use weighted_average::WeightedAverageCostCalculator;

pub struct Engine {
    db: Database,
    converter: Arc<dyn UnitConverter>,
    depletion_reasons: CodeList,
    loss_categories: CodeList,
    costing: CostingConfig,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            db: Database::new(),
            converter: Arc::new(StandardUnitConverter),
            depletion_reasons: config.codes.depletion_reasons()?,
            loss_categories: config.codes.loss_categories()?,
            costing: config.costing.clone(),
        })
    }

    /// Swap in a different unit conversion collaborator.
    pub fn with_converter(mut self, converter: impl UnitConverter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Open a unit of work attributed to `actor`.
    pub fn begin_as(&self, actor: &str) -> DomainResult<UnitOfWork<'_>> {
        self.db.begin_as(actor)
    }

    pub fn depletion_reasons(&self) -> &CodeList {
        &self.depletion_reasons
    }

    pub fn loss_categories(&self) -> &CodeList {
        &self.loss_categories
    }

    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(&self.db)
    }

    pub fn ledger(&self) -> InventoryLedger<'_> {
        InventoryLedger::new(&self.db, self.converter.as_ref(), &self.depletion_reasons)
    }

    pub fn materials(&self) -> WeightedAverageCostCalculator<'_> {
        WeightedAverageCostCalculator::new(&self.db, self.converter.as_ref())
    }

    pub fn production(&self) -> ProductionLossTracker<'_> {
        ProductionLossTracker::new(&self.db, self.converter.as_ref(), &self.loss_categories)
    }

    pub fn costs(&self) -> CostEngine<'_> {
        CostEngine::new(&self.db, self.converter.as_ref(), self.costing.fallback_policy)
    }

    pub fn compositions(&self) -> CompositionResolver<'_> {
        CompositionResolver::new(&self.db)
    }

    pub fn recorder(&self) -> ConsumptionRecorder<'_> {
        ConsumptionRecorder::new(&self.db)
    }
}
