use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::{FinishedUnitId, RecipeId};
use larder_core::{DomainError, DomainResult, define_id};

define_id!(ProductionRunId, "ProductionRunId");

/// Derived outcome of a production run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionStatus {
    Complete,
    PartialLoss,
    TotalLoss,
}

/// Expected/actual/loss triple. `actual + loss == expected` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldOutcome {
    expected: u64,
    actual: u64,
    loss: u64,
}

impl YieldOutcome {
    /// Derive loss and status. Loss is never accepted as input.
    pub fn derive(expected: u64, actual: u64) -> DomainResult<Self> {
        if expected == 0 {
            return Err(DomainError::validation("expected yield must be positive"));
        }
        if actual > expected {
            return Err(DomainError::validation(format!(
                "actual yield {actual} exceeds expected yield {expected}"
            )));
        }
        Ok(Self {
            expected,
            actual,
            loss: expected - actual,
        })
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn actual(&self) -> u64 {
        self.actual
    }

    pub fn loss(&self) -> u64 {
        self.loss
    }

    pub fn status(&self) -> ProductionStatus {
        if self.loss == 0 {
            ProductionStatus::Complete
        } else if self.actual == 0 {
            ProductionStatus::TotalLoss
        } else {
            ProductionStatus::PartialLoss
        }
    }
}

/// A recorded production event. Immutable once written.
///
/// Recipe and finished-unit names are snapshots taken when the run was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRun {
    pub id: ProductionRunId,
    pub recipe_id: RecipeId,
    pub recipe_name: String,
    pub finished_unit_id: FinishedUnitId,
    pub finished_unit_name: String,
    pub num_batches: u32,
    pub expected_yield: u64,
    pub actual_yield: u64,
    pub loss_quantity: u64,
    pub status: ProductionStatus,
    pub total_ingredient_cost: Decimal,
    /// Ingredient cost spread over the *expected* yield.
    pub per_unit_cost: Decimal,
    pub produced_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl ProductionRun {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        recipe_id: RecipeId,
        recipe_name: &str,
        finished_unit_id: FinishedUnitId,
        finished_unit_name: &str,
        num_batches: u32,
        outcome: YieldOutcome,
        total_ingredient_cost: Decimal,
        produced_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: ProductionRunId::new(),
            recipe_id,
            recipe_name: recipe_name.to_string(),
            finished_unit_id,
            finished_unit_name: finished_unit_name.to_string(),
            num_batches,
            expected_yield: outcome.expected(),
            actual_yield: outcome.actual(),
            loss_quantity: outcome.loss(),
            status: outcome.status(),
            total_ingredient_cost,
            per_unit_cost: total_ingredient_cost / Decimal::from(outcome.expected()),
            produced_at,
            notes,
        }
    }

    pub fn yield_balances(&self) -> bool {
        self.actual_yield + self.loss_quantity == self.expected_yield
    }

    pub fn loss_cost(&self) -> Decimal {
        Decimal::from(self.loss_quantity) * self.per_unit_cost
    }
}
