use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::FinishedUnitId;
use larder_core::{CodeList, DomainResult};

use crate::run::{ProductionRun, ProductionRunId};

larder_core::define_id!(ProductionLossId, "ProductionLossId");

/// Immutable record of units lost in a production run.
///
/// Survives deletion of the parent run: `production_run_id` may dangle, the
/// snapshot fields keep the record readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionLoss {
    pub id: ProductionLossId,
    pub production_run_id: ProductionRunId,
    pub finished_unit_id: FinishedUnitId,
    pub finished_unit_name: String,
    pub quantity: u64,
    pub category: String,
    pub per_unit_cost: Decimal,
    pub total_loss_cost: Decimal,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ProductionLoss {
    /// Build the loss record for `run`, or `None` when nothing was lost.
    ///
    /// An unspecified category defaults to the list's "other" code.
    pub fn for_run(
        run: &ProductionRun,
        category: Option<&str>,
        notes: Option<String>,
        categories: &CodeList,
    ) -> DomainResult<Option<Self>> {
        if run.loss_quantity == 0 {
            return Ok(None);
        }
        let category = match category {
            Some(code) => categories.validate(code, notes.as_deref())?,
            None => categories.other_code().to_string(),
        };
        Ok(Some(Self {
            id: ProductionLossId::new(),
            production_run_id: run.id,
            finished_unit_id: run.finished_unit_id,
            finished_unit_name: run.finished_unit_name.clone(),
            quantity: run.loss_quantity,
            category,
            per_unit_cost: run.per_unit_cost,
            total_loss_cost: run.loss_cost(),
            notes,
            recorded_at: run.produced_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::YieldOutcome;
    use larder_catalog::RecipeId;
    use larder_core::DomainError;

    fn categories() -> CodeList {
        CodeList::new("loss category", ["burnt", "broken", "other"], "other").unwrap()
    }

    fn run(expected: u64, actual: u64) -> ProductionRun {
        ProductionRun::new(
            RecipeId::new(),
            "Brownies",
            FinishedUnitId::new(),
            "Brownie",
            2,
            YieldOutcome::derive(expected, actual).unwrap(),
            Decimal::from(48),
            Utc::now(),
            None,
        )
    }

    #[test]
    fn no_record_without_loss() {
        assert!(ProductionLoss::for_run(&run(24, 24), Some("burnt"), None, &categories())
            .unwrap()
            .is_none());
    }

    #[test]
    fn loss_cost_uses_per_unit_snapshot() {
        let loss = ProductionLoss::for_run(&run(24, 18), Some("burnt"), None, &categories())
            .unwrap()
            .unwrap();
        assert_eq!(loss.quantity, 6);
        assert_eq!(loss.per_unit_cost, Decimal::from(2));
        assert_eq!(loss.total_loss_cost, Decimal::from(12));
        assert_eq!(loss.category, "burnt");
    }

    #[test]
    fn category_defaults_to_other() {
        let loss = ProductionLoss::for_run(&run(24, 0), None, None, &categories())
            .unwrap()
            .unwrap();
        assert_eq!(loss.category, "other");
    }

    #[test]
    fn invalid_category_is_rejected() {
        let err = ProductionLoss::for_run(&run(24, 20), Some("eaten"), None, &categories()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
