//! Manual inventory adjustments and their immutable audit record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::IngredientId;
use larder_core::{CodeList, DomainError, DomainResult, define_id, ensure_positive};

use crate::item::{InventoryItem, InventoryItemId};

define_id!(DepletionId, "DepletionId");

/// Request to remove stock from one lot outside of production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAdjustment {
    pub item_id: InventoryItemId,
    pub quantity: Decimal,
    pub reason: String,
    pub notes: Option<String>,
}

/// Immutable audit record of a manual depletion.
///
/// Carries a snapshot of the ingredient's name so history survives renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDepletion {
    pub id: DepletionId,
    pub item_id: InventoryItemId,
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    pub quantity_depleted: Decimal,
    pub unit: String,
    pub reason: String,
    pub notes: Option<String>,
    pub cost: Decimal,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl InventoryDepletion {
    /// Validate `adjustment` against `item`, decrement the lot and return the
    /// audit record. On error the lot is untouched.
    pub fn apply(
        item: &mut InventoryItem,
        ingredient_name: &str,
        adjustment: &ManualAdjustment,
        reasons: &CodeList,
        actor: &str,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if adjustment.item_id != item.id() {
            return Err(DomainError::invariant("adjustment targets a different lot"));
        }
        ensure_positive("adjustment quantity", adjustment.quantity)?;
        if adjustment.quantity > item.quantity() {
            return Err(DomainError::validation(format!(
                "adjustment quantity {} exceeds available {} {}",
                adjustment.quantity,
                item.quantity(),
                item.unit()
            )));
        }
        let reason = reasons.validate(&adjustment.reason, adjustment.notes.as_deref())?;

        let cost = adjustment.quantity * item.unit_cost();
        item.decrement(adjustment.quantity)?;

        Ok(Self {
            id: DepletionId::new(),
            item_id: item.id(),
            ingredient_id: item.ingredient_id(),
            ingredient_name: ingredient_name.to_string(),
            quantity_depleted: adjustment.quantity,
            unit: item.unit().to_string(),
            reason,
            notes: adjustment.notes.clone(),
            cost,
            actor: actor.to_string(),
            occurred_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasons() -> CodeList {
        CodeList::new("depletion reason", ["spoilage", "gift", "correction", "other"], "other").unwrap()
    }

    fn lot() -> InventoryItem {
        InventoryItem::purchased(
            IngredientId::new(),
            None,
            Decimal::from(10),
            "lb",
            Decimal::from(5),
            Utc::now(),
            1,
        )
        .unwrap()
    }

    fn adjust(item: &InventoryItem, qty: i64, reason: &str, notes: Option<&str>) -> ManualAdjustment {
        ManualAdjustment {
            item_id: item.id(),
            quantity: Decimal::from(qty),
            reason: reason.to_string(),
            notes: notes.map(str::to_string),
        }
    }

    #[test]
    fn records_cost_and_decrements_lot() {
        let mut item = lot();
        let req = adjust(&item, 4, "spoilage", None);
        let rec = InventoryDepletion::apply(&mut item, "Butter", &req, &reasons(), "sam", Utc::now()).unwrap();

        assert_eq!(rec.cost, Decimal::from(2));
        assert_eq!(rec.ingredient_name, "Butter");
        assert_eq!(rec.actor, "sam");
        assert_eq!(item.quantity(), Decimal::from(6));
    }

    #[test]
    fn full_depletion_leaves_zero() {
        let mut item = lot();
        let req = adjust(&item, 10, "gift", None);
        InventoryDepletion::apply(&mut item, "Butter", &req, &reasons(), "sam", Utc::now()).unwrap();
        assert!(item.is_empty());
    }

    #[test]
    fn over_depletion_is_rejected_without_mutation() {
        let mut item = lot();
        let req = adjust(&item, 11, "spoilage", None);
        let err = InventoryDepletion::apply(&mut item, "Butter", &req, &reasons(), "sam", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(item.quantity(), Decimal::from(10));
    }

    #[test]
    fn other_reason_requires_notes() {
        let mut item = lot();
        let req = adjust(&item, 1, "other", None);
        assert!(InventoryDepletion::apply(&mut item, "Butter", &req, &reasons(), "sam", Utc::now()).is_err());
        assert_eq!(item.quantity(), Decimal::from(10));

        let req = adjust(&item, 1, "other", Some("used for a tasting"));
        assert!(InventoryDepletion::apply(&mut item, "Butter", &req, &reasons(), "sam", Utc::now()).is_ok());
    }

    #[test]
    fn unknown_reason_is_rejected() {
        let mut item = lot();
        let req = adjust(&item, 1, "theft", None);
        assert!(InventoryDepletion::apply(&mut item, "Butter", &req, &reasons(), "sam", Utc::now()).is_err());
    }

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        let mut item = lot();
        for qty in [0, -1] {
            let req = adjust(&item, qty, "spoilage", None);
            assert!(InventoryDepletion::apply(&mut item, "Butter", &req, &reasons(), "sam", Utc::now()).is_err());
        }
    }
}
