use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::{IngredientId, SupplierId};
use larder_core::{DomainError, DomainResult, define_id, ensure_non_negative, ensure_positive};

define_id!(
    /// Inventory lot identifier.
    InventoryItemId,
    "InventoryItemId"
);

/// A purchase-linked lot of a perishable ingredient.
///
/// Quantity is held in the lot's own `unit`; `unit_cost` is the price of one
/// such unit and never changes after the purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    ingredient_id: IngredientId,
    supplier_id: Option<SupplierId>,
    quantity: Decimal,
    unit: String,
    unit_cost: Decimal,
    purchased_at: DateTime<Utc>,
    /// Creation order; breaks ties between lots bought at the same instant.
    sequence: u64,
}

impl InventoryItem {
    /// Create a lot from a purchase. `unit_cost = total_price / quantity`.
    pub fn purchased(
        ingredient_id: IngredientId,
        supplier_id: Option<SupplierId>,
        quantity: Decimal,
        unit: impl Into<String>,
        total_price: Decimal,
        purchased_at: DateTime<Utc>,
        sequence: u64,
    ) -> DomainResult<Self> {
        ensure_positive("purchase quantity", quantity)?;
        ensure_non_negative("purchase price", total_price)?;
        Ok(Self {
            id: InventoryItemId::new(),
            ingredient_id,
            supplier_id,
            quantity,
            unit: unit.into(),
            unit_cost: total_price / quantity,
            purchased_at,
            sequence,
        })
    }

    pub fn id(&self) -> InventoryItemId {
        self.id
    }

    pub fn ingredient_id(&self) -> IngredientId {
        self.ingredient_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn purchased_at(&self) -> DateTime<Utc> {
        self.purchased_at
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Value of what remains in the lot.
    pub fn remaining_value(&self) -> Decimal {
        self.quantity * self.unit_cost
    }

    /// Remove `amount` (lot units). Over-consumption is rejected, never clamped.
    pub fn decrement(&mut self, amount: Decimal) -> DomainResult<()> {
        ensure_positive("decrement amount", amount)?;
        if amount > self.quantity {
            return Err(DomainError::validation(format!(
                "cannot remove {amount} {} from lot {}: only {} available",
                self.unit, self.id, self.quantity
            )));
        }
        self.quantity -= amount;
        Ok(())
    }
}
