use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::{MaterialId, MaterialProductId, SupplierId};
use larder_core::{DomainError, DomainResult, Entity, ensure_non_negative, ensure_positive};

/// Running weighted average after adding `added` units at `unit_cost`.
///
/// With no prior stock the new average is simply `unit_cost`.
pub fn weighted_average(
    old_quantity: Decimal,
    old_average: Decimal,
    added: Decimal,
    unit_cost: Decimal,
) -> Decimal {
    if old_quantity.is_zero() {
        return unit_cost;
    }
    (old_quantity * old_average + added * unit_cost) / (old_quantity + added)
}

/// A concrete, purchasable product backing an abstract material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialProduct {
    pub id: MaterialProductId,
    pub material_id: MaterialId,
    pub name: String,
    pub brand: Option<String>,
    pub supplier_id: Option<SupplierId>,
    current_inventory: Decimal,
    weighted_avg_cost: Decimal,
    /// Creation order, used for deterministic greedy allocation.
    pub sequence: u64,
}

impl MaterialProduct {
    pub fn new(
        material_id: MaterialId,
        name: impl Into<String>,
        brand: Option<String>,
        supplier_id: Option<SupplierId>,
        sequence: u64,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("material product name cannot be empty"));
        }
        Ok(Self {
            id: MaterialProductId::new(),
            material_id,
            name,
            brand,
            supplier_id,
            current_inventory: Decimal::ZERO,
            weighted_avg_cost: Decimal::ZERO,
            sequence,
        })
    }

    /// Restore a product with existing stock (catalog import, fixtures).
    pub fn with_stock(mut self, inventory: Decimal, weighted_avg_cost: Decimal) -> DomainResult<Self> {
        self.current_inventory = ensure_non_negative("inventory", inventory)?;
        self.weighted_avg_cost = ensure_non_negative("weighted average cost", weighted_avg_cost)?;
        Ok(self)
    }

    pub fn current_inventory(&self) -> Decimal {
        self.current_inventory
    }

    pub fn weighted_avg_cost(&self) -> Decimal {
        self.weighted_avg_cost
    }

    pub fn inventory_value(&self) -> Decimal {
        self.current_inventory * self.weighted_avg_cost
    }

    /// Blend a purchase into inventory and average cost.
    pub fn receive(&mut self, units_added: Decimal, unit_cost: Decimal) -> DomainResult<()> {
        ensure_positive("units added", units_added)?;
        ensure_non_negative("unit cost", unit_cost)?;
        self.weighted_avg_cost =
            weighted_average(self.current_inventory, self.weighted_avg_cost, units_added, unit_cost);
        self.current_inventory += units_added;
        Ok(())
    }

    /// Remove stock. The average cost is unaffected by consumption.
    pub fn issue(&mut self, quantity: Decimal) -> DomainResult<Decimal> {
        ensure_positive("consumption quantity", quantity)?;
        if quantity > self.current_inventory {
            return Err(DomainError::validation(format!(
                "insufficient inventory for '{}': need {quantity}, have {}",
                self.name, self.current_inventory
            )));
        }
        self.current_inventory -= quantity;
        Ok(quantity * self.weighted_avg_cost)
    }
}

impl Entity for MaterialProduct {
    type Id = MaterialProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// Unit cost of an abstract material across its products.
///
/// Inventory-weighted when any product has stock, otherwise the plain mean of
/// the products' averages; zero with no products.
pub fn blended_unit_cost<'a>(products: impl IntoIterator<Item = &'a MaterialProduct>) -> Decimal {
    let products: Vec<&MaterialProduct> = products.into_iter().collect();
    if products.is_empty() {
        return Decimal::ZERO;
    }
    let stocked: Decimal = products.iter().map(|p| p.current_inventory()).sum();
    if stocked > Decimal::ZERO {
        let value: Decimal = products.iter().map(|p| p.inventory_value()).sum();
        return value / stocked;
    }
    let total: Decimal = products.iter().map(|p| p.weighted_avg_cost()).sum();
    total / Decimal::from(products.len())
}
