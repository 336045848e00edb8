//! First-in-first-out consumption planning.
//!
//! Planning is pure: it reads lots and returns the draws that *would* be made.
//! Applying a plan (decrementing lots) is a separate step, which is what makes
//! dry runs free of side effects and repeatable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, ensure_positive};

use crate::item::{InventoryItem, InventoryItemId};

/// One lot's contribution to a consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub lot_id: InventoryItemId,
    /// Amount removed, in the lot's own unit.
    pub lot_quantity: Decimal,
    pub lot_unit: String,
    /// Same amount expressed in the requested target unit.
    pub target_quantity: Decimal,
    pub unit_cost: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoPlan {
    /// Satisfied quantity, in the target unit.
    pub consumed: Decimal,
    /// Unsatisfied remainder, in the target unit. Never an error.
    pub shortfall: Decimal,
    pub total_cost: Decimal,
    pub lots_touched: Vec<LotDraw>,
}

impl FifoPlan {
    pub fn is_satisfied(&self) -> bool {
        self.shortfall.is_zero()
    }
}

/// Order lots oldest purchase first, ties broken by creation order.
pub fn fifo_order<'a>(lots: impl IntoIterator<Item = &'a InventoryItem>) -> Vec<&'a InventoryItem> {
    let mut ordered: Vec<&InventoryItem> = lots.into_iter().collect();
    ordered.sort_by_key(|l| (l.purchased_at(), l.sequence()));
    ordered
}

/// Plan consumption of `needed` target units across `lots`.
///
/// `target_per_lot_unit` returns how many target units one unit of the given
/// lot represents (1 when the units match).
pub fn plan_fifo<'a, F>(
    lots: impl IntoIterator<Item = &'a InventoryItem>,
    needed: Decimal,
    mut target_per_lot_unit: F,
) -> DomainResult<FifoPlan>
where
    F: FnMut(&InventoryItem) -> DomainResult<Decimal>,
{
    ensure_positive("quantity needed", needed)?;

    let mut remaining = needed;
    let mut total_cost = Decimal::ZERO;
    let mut draws = Vec::new();

    for lot in fifo_order(lots) {
        if remaining.is_zero() {
            break;
        }
        if lot.is_empty() {
            continue;
        }

        let factor = target_per_lot_unit(lot)?;
        if factor <= Decimal::ZERO {
            return Err(DomainError::conversion(format!(
                "non-positive conversion factor {factor} for lot {}",
                lot.id()
            )));
        }
        let available = lot.quantity() * factor;
        let (target_quantity, lot_quantity) = if available <= remaining {
            (available, lot.quantity())
        } else {
            (remaining, remaining / factor)
        };

        let cost = lot_quantity * lot.unit_cost();
        total_cost += cost;
        remaining -= target_quantity;
        draws.push(LotDraw {
            lot_id: lot.id(),
            lot_quantity,
            lot_unit: lot.unit().to_string(),
            target_quantity,
            unit_cost: lot.unit_cost(),
            cost,
        });
    }

    Ok(FifoPlan {
        consumed: needed - remaining,
        shortfall: remaining,
        total_cost,
        lots_touched: draws,
    })
}
