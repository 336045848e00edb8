//! Catalog export and import.
//!
//! The document carries definitions and compositions only. Lot quantities,
//! product stock, finished-good counts and audit history stay behind.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use larder_catalog::{
    ComponentRef, CompositionRow, FinishedGood, FinishedUnit, Ingredient, Material, MaterialId,
    MaterialProductId, MaterialUnit, Recipe, Supplier, SupplierId, creates_cycle,
};
use larder_core::DomainError;
use larder_materials::MaterialProduct;

use crate::store::{Database, Tables};

pub const CATALOG_SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Error)]
pub enum CatalogIoError {
    #[error("unsupported catalog schema version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },
    #[error("invalid catalog document: {0}")]
    Invalid(String),
    #[error("catalog import requires an empty catalog")]
    NotEmpty,
    #[error("catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Catalog entry for a material product, without stock or cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialProductEntry {
    pub id: MaterialProductId,
    pub material_id: MaterialId,
    pub name: String,
    pub brand: Option<String>,
    pub supplier_id: Option<SupplierId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub suppliers: Vec<Supplier>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub finished_units: Vec<FinishedUnit>,
    #[serde(default)]
    pub finished_goods: Vec<FinishedGood>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub material_products: Vec<MaterialProductEntry>,
    #[serde(default)]
    pub material_units: Vec<MaterialUnit>,
    #[serde(default)]
    pub compositions: Vec<CompositionRow>,
}

impl CatalogDocument {
    pub fn to_json(&self) -> Result<String, CatalogIoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogIoError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check version, referential integrity and the composition XOR rule.
    ///
    /// Nothing is inserted until this passes, so a bad document leaves the
    /// catalog untouched.
    pub fn validate(&self) -> Result<(), CatalogIoError> {
        if self.schema_version != CATALOG_SCHEMA_VERSION {
            return Err(CatalogIoError::SchemaVersion {
                found: self.schema_version,
                expected: CATALOG_SCHEMA_VERSION,
            });
        }

        let suppliers: BTreeSet<_> = self.suppliers.iter().map(|s| s.id).collect();
        let ingredients: BTreeSet<_> = self.ingredients.iter().map(|i| i.id).collect();
        let recipes: BTreeSet<_> = self.recipes.iter().map(|r| r.id).collect();
        let finished_units: BTreeSet<_> = self.finished_units.iter().map(|f| f.id).collect();
        let finished_goods: BTreeSet<_> = self.finished_goods.iter().map(|f| f.id).collect();
        let materials: BTreeSet<_> = self.materials.iter().map(|m| m.id).collect();
        let products: BTreeSet<_> = self.material_products.iter().map(|p| p.id).collect();
        let units: BTreeSet<_> = self.material_units.iter().map(|u| u.id).collect();

        let missing = |record: String, field: &str, id: String| {
            CatalogIoError::Invalid(format!("{record}: {field} {id} does not exist"))
        };

        for recipe in &self.recipes {
            if recipe.items_per_batch == 0 {
                return Err(CatalogIoError::Invalid(format!(
                    "recipe '{}': items_per_batch must be positive",
                    recipe.name
                )));
            }
            for line in &recipe.lines {
                if !ingredients.contains(&line.ingredient_id) {
                    return Err(missing(format!("recipe '{}'", recipe.name), "ingredient_id", line.ingredient_id.to_string()));
                }
            }
        }
        for fu in &self.finished_units {
            if !recipes.contains(&fu.recipe_id) {
                return Err(missing(format!("finished unit '{}'", fu.name), "recipe_id", fu.recipe_id.to_string()));
            }
        }
        for product in &self.material_products {
            if !materials.contains(&product.material_id) {
                return Err(missing(format!("material product '{}'", product.name), "material_id", product.material_id.to_string()));
            }
            if let Some(supplier) = product.supplier_id.filter(|s| !suppliers.contains(s)) {
                return Err(missing(format!("material product '{}'", product.name), "supplier_id", supplier.to_string()));
            }
        }
        for unit in &self.material_units {
            if !materials.contains(&unit.material_id) {
                return Err(missing(format!("material unit '{}'", unit.name), "material_id", unit.material_id.to_string()));
            }
        }

        let mut compositions = Vec::with_capacity(self.compositions.len());
        for row in &self.compositions {
            let record = format!("composition {}", row.id);
            let composition = larder_catalog::Composition::try_from(row.clone())
                .map_err(|e| CatalogIoError::Invalid(format!("{record}: {e}")))?;
            if !finished_goods.contains(&row.assembly_id) {
                return Err(missing(record, "assembly_id", row.assembly_id.to_string()));
            }
            let (field, exists, id) = match composition.component() {
                ComponentRef::FinishedUnit(id) => ("finished_unit_id", finished_units.contains(&id), id.to_string()),
                ComponentRef::FinishedGood(id) => ("finished_good_id", finished_goods.contains(&id), id.to_string()),
                ComponentRef::Packaging(id) => ("packaging_product_id", products.contains(&id), id.to_string()),
                ComponentRef::MaterialUnit(id) => ("material_unit_id", units.contains(&id), id.to_string()),
                ComponentRef::Material(id) => ("material_id", materials.contains(&id), id.to_string()),
            };
            if !exists {
                return Err(missing(record, field, id));
            }
            if let ComponentRef::FinishedGood(child) = composition.component() {
                if creates_cycle(&compositions, row.assembly_id, child) {
                    return Err(CatalogIoError::Invalid(format!(
                        "{record}: nesting finished good {child} creates a cycle"
                    )));
                }
            }
            compositions.push(composition);
        }
        Ok(())
    }
}

/// Snapshot the committed catalog.
pub fn export_catalog(db: &Database) -> Result<CatalogDocument, CatalogIoError> {
    let document = db.read(|t| CatalogDocument {
        schema_version: CATALOG_SCHEMA_VERSION,
        suppliers: t.suppliers.values().cloned().collect(),
        ingredients: t.ingredients.values().cloned().collect(),
        recipes: t.recipes.values().cloned().collect(),
        finished_units: t
            .finished_units
            .values()
            .map(|f| FinishedUnit { inventory_count: 0, ..f.clone() })
            .collect(),
        finished_goods: t
            .finished_goods
            .values()
            .map(|f| FinishedGood { inventory_count: 0, ..f.clone() })
            .collect(),
        materials: t.materials.values().cloned().collect(),
        material_products: product_entries(t),
        material_units: t.material_units.values().cloned().collect(),
        compositions: t.composition_rows().cloned().collect(),
    })?;
    info!(
        ingredients = document.ingredients.len(),
        compositions = document.compositions.len(),
        "catalog exported"
    );
    Ok(document)
}

fn product_entries(t: &Tables) -> Vec<MaterialProductEntry> {
    let mut products: Vec<&MaterialProduct> = t.material_products.values().collect();
    products.sort_by_key(|p| p.sequence);
    products
        .into_iter()
        .map(|p| MaterialProductEntry {
            id: p.id,
            material_id: p.material_id,
            name: p.name.clone(),
            brand: p.brand.clone(),
            supplier_id: p.supplier_id,
        })
        .collect()
}

/// Load `document` into an empty catalog in one unit of work.
pub fn import_catalog(db: &Database, document: CatalogDocument) -> Result<(), CatalogIoError> {
    if let Err(e) = document.validate() {
        warn!(error = %e, "catalog import rejected");
        return Err(e);
    }

    let mut uow = db.begin_as("catalog-import")?;
    let t = uow.tables_mut();
    let is_empty = t.suppliers.is_empty()
        && t.ingredients.is_empty()
        && t.recipes.is_empty()
        && t.finished_units.is_empty()
        && t.finished_goods.is_empty()
        && t.materials.is_empty()
        && t.material_products.is_empty()
        && t.material_units.is_empty()
        && t.composition_rows().next().is_none();
    if !is_empty {
        return Err(CatalogIoError::NotEmpty);
    }

    let counts = (document.ingredients.len(), document.compositions.len());
    t.suppliers.extend(document.suppliers.into_iter().map(|s| (s.id, s)));
    t.ingredients.extend(document.ingredients.into_iter().map(|i| (i.id, i)));
    t.recipes.extend(document.recipes.into_iter().map(|r| (r.id, r)));
    t.finished_units.extend(
        document
            .finished_units
            .into_iter()
            .map(|f| (f.id, FinishedUnit { inventory_count: 0, ..f })),
    );
    t.finished_goods.extend(
        document
            .finished_goods
            .into_iter()
            .map(|f| (f.id, FinishedGood { inventory_count: 0, ..f })),
    );
    t.materials.extend(document.materials.into_iter().map(|m| (m.id, m)));
    for entry in document.material_products {
        let sequence = t.next_sequence();
        let mut product =
            MaterialProduct::new(entry.material_id, entry.name, entry.brand, entry.supplier_id, sequence)?;
        product.id = entry.id;
        t.material_products.insert(product.id, product);
    }
    t.material_units.extend(document.material_units.into_iter().map(|u| (u.id, u)));
    for row in document.compositions {
        t.insert_composition_row(row)?;
    }

    uow.commit()?;
    info!(ingredients = counts.0, compositions = counts.1, "catalog imported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_catalog::{Composition, FinishedGoodId, FinishedUnitId, RecipeLine};
    use rust_decimal::Decimal;

    fn populated() -> Database {
        let db = Database::new();
        let mut uow = db.begin().unwrap();
        let t = uow.tables_mut();

        let flour = Ingredient::new("flour", "Flour", "baking", "cup").unwrap();
        let recipe = Recipe::new(
            "Cookies",
            24,
            vec![RecipeLine { ingredient_id: flour.id, quantity: Decimal::from(2), unit: "cup".into() }],
        )
        .unwrap();
        let mut cookie = FinishedUnit::new("cookie", "Cookie", recipe.id).unwrap();
        cookie.inventory_count = 40;
        let gift_box = FinishedGood::new("gift-box", "Gift box").unwrap();
        let ribbon = Material::new("ribbon", "Ribbon", "trim", "inch").unwrap();
        let red = MaterialProduct::new(ribbon.id, "Red ribbon", None, None, 1)
            .unwrap()
            .with_stock(Decimal::from(100), Decimal::new(5, 2))
            .unwrap();

        let c1 = Composition::new(gift_box.id, ComponentRef::FinishedUnit(cookie.id), Decimal::from(6), false).unwrap();
        let c2 = Composition::new(gift_box.id, ComponentRef::Material(ribbon.id), Decimal::from(12), true).unwrap();

        t.ingredients.insert(flour.id, flour);
        t.recipes.insert(recipe.id, recipe);
        t.finished_units.insert(cookie.id, cookie);
        t.finished_goods.insert(gift_box.id, gift_box);
        t.materials.insert(ribbon.id, ribbon);
        t.material_products.insert(red.id, red);
        t.insert_composition(&c1).unwrap();
        t.insert_composition(&c2).unwrap();
        uow.commit().unwrap();
        db
    }

    #[test]
    fn export_then_import_reproduces_catalog_without_stock() {
        let source = populated();
        let document = export_catalog(&source).unwrap();
        let json = document.to_json().unwrap();

        let target = Database::new();
        import_catalog(&target, CatalogDocument::from_json(&json).unwrap()).unwrap();

        let reexported = export_catalog(&target).unwrap();
        assert_eq!(reexported, document);
        target
            .read(|t| {
                assert!(t.finished_units.values().all(|f| f.inventory_count == 0));
                assert!(t.material_products.values().all(|p| p.current_inventory().is_zero()));
                assert!(t.audit().is_empty());
            })
            .unwrap();
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let mut document = export_catalog(&populated()).unwrap();
        document.schema_version = 2;
        let err = import_catalog(&Database::new(), document).unwrap_err();
        assert!(matches!(err, CatalogIoError::SchemaVersion { found: 2, expected: 3 }));
    }

    #[test]
    fn xor_violation_rejects_whole_import() {
        let mut document = export_catalog(&populated()).unwrap();
        document.compositions[0].finished_good_id = Some(FinishedGoodId::new());
        let target = Database::new();

        let err = import_catalog(&target, document).unwrap_err();
        assert!(err.to_string().contains("exactly one component"));
        assert_eq!(target.read(|t| t.ingredients.len()).unwrap(), 0);
    }

    #[test]
    fn dangling_reference_names_record_and_field() {
        let mut document = export_catalog(&populated()).unwrap();
        let row = document
            .compositions
            .iter_mut()
            .find(|r| r.finished_unit_id.is_some())
            .unwrap();
        row.finished_unit_id = Some(FinishedUnitId::new());

        let err = import_catalog(&Database::new(), document).unwrap_err().to_string();
        assert!(err.contains("composition"));
        assert!(err.contains("finished_unit_id"));
    }

    #[test]
    fn import_requires_empty_catalog() {
        let db = populated();
        let document = export_catalog(&db).unwrap();
        assert!(matches!(import_catalog(&db, document), Err(CatalogIoError::NotEmpty)));
    }
}
