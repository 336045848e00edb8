//! Running weighted-average cost for non-perishable material products.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use larder_catalog::{MaterialId, MaterialProductId};
use larder_core::{DomainResult, ensure_non_negative};
use larder_infra::{Database, Tables, UnitOfWork};
use larder_materials::{
    MaterialAdjustment, MaterialAdjustmentId, MaterialConsumption, MaterialProduct, MaterialPurchase, PurchaseDraft,
    blended_unit_cost,
};

use crate::recorder::ConsumptionRecorder;
use crate::units::UnitConverter;

/// Blended unit cost of a material across its products.
pub(crate) fn material_cost(t: &Tables, material_id: MaterialId) -> DomainResult<Decimal> {
    t.material(material_id)?;
    Ok(blended_unit_cost(t.products_of(material_id)))
}

#[derive(Clone, Copy)]
pub struct WeightedAverageCostCalculator<'a> {
    db: &'a Database,
    converter: &'a dyn UnitConverter,
}

impl<'a> WeightedAverageCostCalculator<'a> {
    pub fn new(db: &'a Database, converter: &'a dyn UnitConverter) -> Self {
        Self { db, converter }
    }

    /// Receive `packages` packages of `package_quantity` `package_unit` each.
    ///
    /// The package size is converted to the material's base unit before the
    /// running average is blended.
    pub fn record_purchase(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        product_id: MaterialProductId,
        packages: u32,
        package_price: Decimal,
        package_quantity: Decimal,
        package_unit: &str,
    ) -> DomainResult<MaterialPurchase> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let product = t.material_product(product_id)?;
            let base_unit = t.material(product.material_id)?.base_unit.clone();
            let base_units_per_package = self.converter.convert(package_quantity, package_unit, &base_unit, None)?;

            let purchase = MaterialPurchase::from_draft(
                product_id,
                &product.name,
                product.supplier_id,
                t.supplier_name(product.supplier_id),
                PurchaseDraft {
                    packages,
                    package_price,
                    package_quantity,
                    package_unit: package_unit.to_string(),
                    base_units_per_package,
                },
                Utc::now(),
            )?;

            let product = t.material_product_mut(product_id)?;
            product.receive(purchase.units_added, purchase.unit_cost)?;
            info!(
                product = %product_id,
                units_added = %purchase.units_added,
                unit_cost = %purchase.unit_cost,
                weighted_avg_cost = %product.weighted_avg_cost(),
                "material purchase recorded"
            );
            ConsumptionRecorder::record_material_purchase(t, &purchase);
            Ok(purchase)
        })
    }

    /// Draw stock from a product at its current average cost.
    pub fn consume(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        product_id: MaterialProductId,
        quantity: Decimal,
        notes: Option<String>,
    ) -> DomainResult<MaterialConsumption> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let cost = t.material_product_mut(product_id)?.issue(quantity)?;
            let record =
                ConsumptionRecorder::record_material(t, Uuid::now_v7(), product_id, quantity, cost, notes, Utc::now())?;
            info!(product = %product_id, quantity = %quantity, cost = %cost, "material consumed");
            Ok(record)
        })
    }

    pub fn material_unit_cost(&self, material_id: MaterialId) -> DomainResult<Decimal> {
        self.db.read(|t| material_cost(t, material_id))?
    }

    pub fn product(&self, product_id: MaterialProductId) -> DomainResult<MaterialProduct> {
        self.db.read(|t| t.material_product(product_id).cloned())?
    }

    pub fn purchase_history(&self, product_id: MaterialProductId) -> DomainResult<Vec<MaterialPurchase>> {
        self.db.read(|t| {
            t.audit()
                .material_purchases()
                .filter(|p| p.product_id == product_id)
                .cloned()
                .collect()
        })
    }

    /// Set a product's stock to a physically counted `new_quantity`.
    ///
    /// Both directions are journaled at the current average cost. A reduction
    /// is also recorded as a consumption; an increase is received at the
    /// average, leaving it as is. Returns `None` when the count matches.
    pub fn adjust_inventory(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        product_id: MaterialProductId,
        new_quantity: Decimal,
        notes: Option<String>,
    ) -> DomainResult<Option<MaterialAdjustment>> {
        ensure_non_negative("counted quantity", new_quantity)?;
        self.db.run(uow, |uow| {
            let actor = uow.actor().to_string();
            let t = uow.tables_mut();
            let product = t.material_product(product_id)?;
            let current = product.current_inventory();
            if new_quantity == current {
                return Ok(None);
            }
            let material = t.material(product.material_id)?;
            let notes = notes.or_else(|| Some("inventory count adjustment".to_string()));
            let delta = new_quantity - current;
            let mut adjustment = MaterialAdjustment {
                id: MaterialAdjustmentId::new(),
                product_id,
                material_id: material.id,
                product_name: product.name.clone(),
                material_name: material.name.clone(),
                previous_quantity: current,
                new_quantity,
                delta,
                unit: material.base_unit.clone(),
                unit_cost: product.weighted_avg_cost(),
                cost_delta: delta * product.weighted_avg_cost(),
                notes,
                actor,
                adjusted_at: Utc::now(),
            };

            let product = t.material_product_mut(product_id)?;
            if delta < Decimal::ZERO {
                let cost = product.issue(-delta)?;
                adjustment.cost_delta = -cost;
                ConsumptionRecorder::record_material(
                    t,
                    *adjustment.id.as_uuid(),
                    product_id,
                    -delta,
                    cost,
                    adjustment.notes.clone(),
                    adjustment.adjusted_at,
                )?;
            } else {
                product.receive(delta, adjustment.unit_cost)?;
            }
            ConsumptionRecorder::record_material_adjustment(t, &adjustment);
            info!(
                product = %product_id,
                from = %current,
                to = %new_quantity,
                cost_delta = %adjustment.cost_delta,
                "material count adjusted"
            );
            Ok(Some(adjustment))
        })
    }

    /// Count corrections journaled for a product, oldest first.
    pub fn adjustment_history(&self, product_id: MaterialProductId) -> DomainResult<Vec<MaterialAdjustment>> {
        self.db.read(|t| {
            t.audit()
                .material_adjustments()
                .filter(|a| a.product_id == product_id)
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_catalog::{Material, Supplier};
    use larder_core::DomainError;

    use crate::units::StandardUnitConverter;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn setup(stock: &str, cost: &str) -> (Database, MaterialId, MaterialProductId) {
        let db = Database::new();
        let supplier = Supplier::new("Box Depot", None).unwrap();
        let boxes = Material::new("box", "Gift box", "packaging", "each").unwrap();
        let product = MaterialProduct::new(boxes.id, "Kraft box 6in", None, Some(supplier.id), 1)
            .unwrap()
            .with_stock(dec(stock), dec(cost))
            .unwrap();
        let ids = (boxes.id, product.id);
        db.run(None, |uow| {
            let t = uow.tables_mut();
            t.suppliers.insert(supplier.id, supplier);
            t.materials.insert(boxes.id, boxes);
            t.material_products.insert(product.id, product);
            Ok(())
        })
        .unwrap();
        (db, ids.0, ids.1)
    }

    #[test]
    fn purchase_blends_running_average() {
        let (db, _, product) = setup("200", "0.12");
        let calc = WeightedAverageCostCalculator::new(&db, &StandardUnitConverter);

        let purchase = calc.record_purchase(None, product, 1, dec("15.00"), dec("100"), "each").unwrap();
        assert_eq!(purchase.unit_cost, dec("0.15"));
        assert_eq!(purchase.supplier_name.as_deref(), Some("Box Depot"));

        let p = calc.product(product).unwrap();
        assert_eq!(p.current_inventory(), dec("300"));
        assert_eq!(p.weighted_avg_cost(), dec("0.13"));
        assert_eq!(calc.purchase_history(product).unwrap(), vec![purchase]);
    }

    #[test]
    fn package_size_is_converted_to_base_units() {
        let (db, _, product) = setup("0", "0");
        let calc = WeightedAverageCostCalculator::new(&db, &StandardUnitConverter);

        let purchase = calc.record_purchase(None, product, 2, dec("6.00"), dec("1"), "dozen").unwrap();
        assert_eq!(purchase.units_added, dec("24"));
        assert_eq!(purchase.unit_cost, dec("0.5"));
        assert_eq!(calc.product(product).unwrap().weighted_avg_cost(), dec("0.5"));
    }

    #[test]
    fn consumption_leaves_average_unchanged() {
        let (db, _, product) = setup("10", "0.40");
        let calc = WeightedAverageCostCalculator::new(&db, &StandardUnitConverter);

        let record = calc.consume(None, product, dec("4"), None).unwrap();
        assert_eq!(record.total_cost, dec("1.60"));
        assert_eq!(record.material_name, "Gift box");

        let p = calc.product(product).unwrap();
        assert_eq!(p.current_inventory(), dec("6"));
        assert_eq!(p.weighted_avg_cost(), dec("0.40"));
    }

    #[test]
    fn over_consumption_is_rejected_without_mutation() {
        let (db, _, product) = setup("3", "0.40");
        let calc = WeightedAverageCostCalculator::new(&db, &StandardUnitConverter);

        let err = calc.consume(None, product, dec("4"), None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(calc.product(product).unwrap().current_inventory(), dec("3"));
        assert!(calc.consume(None, product, Decimal::ZERO, None).is_err());
    }

    #[test]
    fn material_cost_blends_products_by_stock() {
        let (db, material, _) = setup("30", "0.10");
        db.run(None, |uow| {
            let p = MaterialProduct::new(material, "Kraft box 8in", None, None, 2)?
                .with_stock(dec("10"), dec("0.30"))?;
            uow.tables_mut().material_products.insert(p.id, p);
            Ok(())
        })
        .unwrap();
        let calc = WeightedAverageCostCalculator::new(&db, &StandardUnitConverter);
        assert_eq!(calc.material_unit_cost(material).unwrap(), dec("0.15"));
    }

    #[test]
    fn count_corrections_are_journaled_in_both_directions() {
        let (db, _, product) = setup("10", "0.40");
        let calc = WeightedAverageCostCalculator::new(&db, &StandardUnitConverter);
        let recorder = ConsumptionRecorder::new(&db);

        let down = calc.adjust_inventory(None, product, dec("7"), None).unwrap().unwrap();
        assert_eq!(down.delta, dec("-3"));
        assert_eq!(down.cost_delta, dec("-1.20"));
        assert_eq!(down.notes.as_deref(), Some("inventory count adjustment"));
        let consumed = recorder.material_consumptions(*down.id.as_uuid()).unwrap();
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed[0].quantity, dec("3"));

        let mut uow = db.begin_as("sam").unwrap();
        let up = calc
            .adjust_inventory(Some(&mut uow), product, dec("9"), Some("found behind shelf".into()))
            .unwrap()
            .unwrap();
        uow.commit().unwrap();
        assert!(up.is_increase());
        assert_eq!((up.previous_quantity, up.delta), (dec("7"), dec("2")));
        assert_eq!((up.unit_cost, up.cost_delta), (dec("0.40"), dec("0.80")));
        assert_eq!(up.actor, "sam");
        assert!(recorder.material_consumptions(*up.id.as_uuid()).unwrap().is_empty());

        assert!(calc.adjust_inventory(None, product, dec("9"), None).unwrap().is_none());
        assert_eq!(calc.adjustment_history(product).unwrap(), vec![down, up]);
        let p = calc.product(product).unwrap();
        assert_eq!(p.current_inventory(), dec("9"));
        assert_eq!(p.weighted_avg_cost(), dec("0.40"));
        assert!(calc.adjust_inventory(None, product, dec("-1"), None).is_err());
    }
}
