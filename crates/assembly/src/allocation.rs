//! Resolving abstract material requirements onto concrete products.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::{CompositionId, MaterialProductId};
use larder_core::{DomainError, DomainResult, ensure_positive};

/// Quantity (material base units) drawn from one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAllocation {
    pub product_id: MaterialProductId,
    pub quantity: Decimal,
}

impl ProductAllocation {
    pub fn new(product_id: MaterialProductId, quantity: Decimal) -> Self {
        Self { product_id, quantity }
    }
}

/// Caller-chosen allocations for generic compositions, keyed by composition.
pub type Allocations = BTreeMap<CompositionId, Vec<ProductAllocation>>;

/// Check that `allocations` split `required` exactly.
pub fn validate_allocation(
    label: &str,
    required: Decimal,
    allocations: &[ProductAllocation],
) -> DomainResult<()> {
    if allocations.is_empty() {
        return Err(DomainError::validation(format!(
            "'{label}' is a generic placeholder and has not been resolved to a product"
        )));
    }
    for a in allocations {
        ensure_positive("allocated quantity", a.quantity)?;
    }
    let total: Decimal = allocations.iter().map(|a| a.quantity).sum();
    if total != required {
        return Err(DomainError::validation(format!(
            "allocations for '{label}' total {total} but {required} is required"
        )));
    }
    Ok(())
}

/// Fill `required` from `candidates` (product, available) in the given order.
pub fn allocate_greedy(
    label: &str,
    required: Decimal,
    candidates: &[(MaterialProductId, Decimal)],
) -> DomainResult<Vec<ProductAllocation>> {
    let mut remaining = required;
    let mut out = Vec::new();
    for (product_id, available) in candidates {
        if remaining.is_zero() {
            break;
        }
        let take = remaining.min(*available);
        if take > Decimal::ZERO {
            out.push(ProductAllocation::new(*product_id, take));
            remaining -= take;
        }
    }
    if remaining > Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "insufficient inventory for '{label}': need {required}, only {} available",
            required - remaining
        )));
    }
    Ok(out)
}

/// Total demand per product across every line of an assembly.
///
/// Two compositions may draw on the same product, so stock is checked against
/// the sum rather than line by line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterialDemand {
    by_product: BTreeMap<MaterialProductId, Decimal>,
}

impl MaterialDemand {
    pub fn add(&mut self, allocation: &ProductAllocation) {
        *self.by_product.entry(allocation.product_id).or_default() += allocation.quantity;
    }

    pub fn get(&self, product_id: MaterialProductId) -> Decimal {
        self.by_product.get(&product_id).copied().unwrap_or_default()
    }

    /// `stock` returns the product's display name and available quantity.
    pub fn ensure_available<F>(&self, mut stock: F) -> DomainResult<()>
    where
        F: FnMut(MaterialProductId) -> DomainResult<(String, Decimal)>,
    {
        for (product_id, needed) in &self.by_product {
            let (name, available) = stock(*product_id)?;
            if *needed > available {
                return Err(DomainError::validation(format!(
                    "insufficient inventory for '{name}': need {needed}, have {available}"
                )));
            }
        }
        Ok(())
    }
}
