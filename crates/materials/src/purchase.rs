use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_catalog::{MaterialProductId, SupplierId};
use larder_core::{DomainError, DomainResult, define_id, ensure_non_negative, ensure_positive};

define_id!(MaterialPurchaseId, "MaterialPurchaseId");

/// Immutable record of a material purchase.
///
/// `unit_cost` is fixed at creation; there is no update path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPurchase {
    pub id: MaterialPurchaseId,
    pub product_id: MaterialProductId,
    pub product_name: String,
    pub supplier_id: Option<SupplierId>,
    pub supplier_name: Option<String>,
    pub packages: u32,
    pub package_price: Decimal,
    pub package_quantity: Decimal,
    pub package_unit: String,
    /// Base units added across all packages.
    pub units_added: Decimal,
    pub unit_cost: Decimal,
    pub total_price: Decimal,
    pub purchased_at: DateTime<Utc>,
}

/// Inputs for a purchase after conversion into the material's base unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDraft {
    pub packages: u32,
    pub package_price: Decimal,
    pub package_quantity: Decimal,
    pub package_unit: String,
    /// Base units contained in one package.
    pub base_units_per_package: Decimal,
}

impl MaterialPurchase {
    pub fn from_draft(
        product_id: MaterialProductId,
        product_name: &str,
        supplier_id: Option<SupplierId>,
        supplier_name: Option<String>,
        draft: PurchaseDraft,
        purchased_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if draft.packages == 0 {
            return Err(DomainError::validation("packages must be positive"));
        }
        ensure_non_negative("package price", draft.package_price)?;
        ensure_positive("package quantity", draft.package_quantity)?;
        ensure_positive("base units per package", draft.base_units_per_package)?;

        let packages = Decimal::from(draft.packages);
        let total_price = packages * draft.package_price;
        let units_added = packages * draft.base_units_per_package;

        Ok(Self {
            id: MaterialPurchaseId::new(),
            product_id,
            product_name: product_name.to_string(),
            supplier_id,
            supplier_name,
            packages: draft.packages,
            package_price: draft.package_price,
            package_quantity: draft.package_quantity,
            package_unit: draft.package_unit,
            units_added,
            unit_cost: total_price / units_added,
            total_price,
            purchased_at,
        })
    }
}
