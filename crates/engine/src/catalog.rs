//! Catalog maintenance with referential integrity checks.

use rust_decimal::Decimal;
use tracing::{info, warn};

use larder_catalog::{
    ComponentRef, Composition, CompositionId, FinishedGood, FinishedGoodId, FinishedUnit, FinishedUnitId, Ingredient,
    IngredientId, Material, MaterialId, MaterialProductId, MaterialUnit, MaterialUnitId, Recipe, RecipeId, Supplier,
    SupplierId, creates_cycle,
};
use larder_core::{DomainError, DomainResult};
use larder_infra::{Database, Tables, UnitOfWork};
use larder_materials::MaterialProduct;

fn integrity(kind: &str, name: &str, count: usize, what: &str) -> DomainError {
    DomainError::integrity(format!("cannot delete {kind} '{name}': referenced by {count} {what}(s)"))
}

/// Fail when any composition still points at `target`.
fn ensure_unreferenced(t: &Tables, kind: &str, target: ComponentRef, name: &str) -> DomainResult<()> {
    let count = t.references_to(target)?;
    if count > 0 {
        let err = integrity(kind, name, count, "composition");
        warn!(error = %err, "delete blocked");
        return Err(err);
    }
    Ok(())
}

#[derive(Clone, Copy)]
pub struct CatalogService<'a> {
    db: &'a Database,
}

impl<'a> CatalogService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn add_supplier(&self, uow: Option<&mut UnitOfWork<'_>>, supplier: Supplier) -> DomainResult<SupplierId> {
        self.db.run(uow, |uow| {
            let id = supplier.id;
            uow.tables_mut().suppliers.insert(id, supplier);
            Ok(id)
        })
    }

    pub fn add_ingredient(&self, uow: Option<&mut UnitOfWork<'_>>, ingredient: Ingredient) -> DomainResult<IngredientId> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            if !ingredient.slug.is_empty() && t.ingredients.values().any(|i| i.slug == ingredient.slug) {
                return Err(DomainError::validation(format!(
                    "ingredient slug '{}' already exists",
                    ingredient.slug
                )));
            }
            let id = ingredient.id;
            info!(ingredient = %id, name = %ingredient.name, "ingredient added");
            t.ingredients.insert(id, ingredient);
            Ok(id)
        })
    }

    pub fn add_recipe(&self, uow: Option<&mut UnitOfWork<'_>>, recipe: Recipe) -> DomainResult<RecipeId> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            for line in &recipe.lines {
                t.ingredient(line.ingredient_id)?;
            }
            let id = recipe.id;
            t.recipes.insert(id, recipe);
            Ok(id)
        })
    }

    pub fn add_finished_unit(&self, uow: Option<&mut UnitOfWork<'_>>, unit: FinishedUnit) -> DomainResult<FinishedUnitId> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            t.recipe(unit.recipe_id)?;
            let id = unit.id;
            t.finished_units.insert(id, unit);
            Ok(id)
        })
    }

    pub fn add_finished_good(&self, uow: Option<&mut UnitOfWork<'_>>, good: FinishedGood) -> DomainResult<FinishedGoodId> {
        self.db.run(uow, |uow| {
            let id = good.id;
            uow.tables_mut().finished_goods.insert(id, good);
            Ok(id)
        })
    }

    pub fn add_material(&self, uow: Option<&mut UnitOfWork<'_>>, material: Material) -> DomainResult<MaterialId> {
        self.db.run(uow, |uow| {
            let id = material.id;
            uow.tables_mut().materials.insert(id, material);
            Ok(id)
        })
    }

    /// Add a product with no stock; stock arrives through purchases.
    pub fn add_material_product(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        material_id: MaterialId,
        name: &str,
        brand: Option<String>,
        supplier_id: Option<SupplierId>,
    ) -> DomainResult<MaterialProduct> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            t.material(material_id)?;
            if let Some(supplier) = supplier_id {
                t.supplier(supplier)?;
            }
            let sequence = t.next_sequence();
            let product = MaterialProduct::new(material_id, name, brand, supplier_id, sequence)?;
            t.material_products.insert(product.id, product.clone());
            Ok(product)
        })
    }

    pub fn add_material_unit(&self, uow: Option<&mut UnitOfWork<'_>>, unit: MaterialUnit) -> DomainResult<MaterialUnitId> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            t.material(unit.material_id)?;
            let id = unit.id;
            t.material_units.insert(id, unit);
            Ok(id)
        })
    }

    /// Add a component line to a finished good.
    pub fn add_composition(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        assembly_id: FinishedGoodId,
        component: ComponentRef,
        quantity: Decimal,
        is_generic: bool,
    ) -> DomainResult<Composition> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            t.finished_good(assembly_id)?;
            if !t.component_exists(component) {
                return Err(DomainError::not_found(format!("{} referenced by composition", component.kind())));
            }
            let composition = Composition::new(assembly_id, component, quantity, is_generic)?;
            if let ComponentRef::FinishedGood(child) = component {
                if creates_cycle(&t.compositions()?, assembly_id, child) {
                    return Err(DomainError::validation(format!(
                        "adding '{}' to '{}' would make it contain itself",
                        t.finished_good(child)?.name,
                        t.finished_good(assembly_id)?.name
                    )));
                }
            }
            t.insert_composition(&composition)?;
            info!(composition = %composition.id(), assembly = %assembly_id, kind = %component.kind(), "composition added");
            Ok(composition)
        })
    }

    pub fn remove_composition(&self, uow: Option<&mut UnitOfWork<'_>>, id: CompositionId) -> DomainResult<Composition> {
        self.db.run(uow, |uow| uow.tables_mut().remove_composition(id))
    }

    pub fn delete_supplier(&self, uow: Option<&mut UnitOfWork<'_>>, id: SupplierId) -> DomainResult<Supplier> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let name = t.supplier(id)?.name.clone();
            let count = t.lots.values().filter(|l| l.supplier_id() == Some(id)).count()
                + t.material_products.values().filter(|p| p.supplier_id == Some(id)).count();
            if count > 0 {
                return Err(integrity("supplier", &name, count, "lot or product"));
            }
            t.suppliers.remove(&id).ok_or_else(|| DomainError::not_found(format!("supplier {id}")))
        })
    }

    /// Delete an ingredient that no recipe uses and that has no stock left.
    pub fn delete_ingredient(&self, uow: Option<&mut UnitOfWork<'_>>, id: IngredientId) -> DomainResult<Ingredient> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let name = t.ingredient(id)?.name.clone();
            let recipes = t
                .recipes
                .values()
                .filter(|r| r.lines.iter().any(|l| l.ingredient_id == id))
                .count();
            if recipes > 0 {
                return Err(integrity("ingredient", &name, recipes, "recipe"));
            }
            if t.lots_of(id).any(|l| !l.is_empty()) {
                return Err(DomainError::integrity(format!(
                    "cannot delete ingredient '{name}': inventory lots still hold stock"
                )));
            }
            t.ingredients.remove(&id).ok_or_else(|| DomainError::not_found(format!("ingredient {id}")))
        })
    }

    pub fn delete_recipe(&self, uow: Option<&mut UnitOfWork<'_>>, id: RecipeId) -> DomainResult<Recipe> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let name = t.recipe(id)?.name.clone();
            let units = t.finished_units.values().filter(|u| u.recipe_id == id).count();
            if units > 0 {
                return Err(integrity("recipe", &name, units, "finished unit"));
            }
            t.recipes.remove(&id).ok_or_else(|| DomainError::not_found(format!("recipe {id}")))
        })
    }

    pub fn delete_finished_unit(&self, uow: Option<&mut UnitOfWork<'_>>, id: FinishedUnitId) -> DomainResult<FinishedUnit> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let name = t.finished_unit(id)?.name.clone();
            ensure_unreferenced(t, "finished unit", ComponentRef::FinishedUnit(id), &name)?;
            t.finished_units.remove(&id).ok_or_else(|| DomainError::not_found(format!("finished unit {id}")))
        })
    }

    /// Delete a finished good and its own component lines. Fails while
    /// another good still contains it.
    pub fn delete_finished_good(&self, uow: Option<&mut UnitOfWork<'_>>, id: FinishedGoodId) -> DomainResult<FinishedGood> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let name = t.finished_good(id)?.name.clone();
            ensure_unreferenced(t, "finished good", ComponentRef::FinishedGood(id), &name)?;
            for composition in t.compositions_of(id)? {
                t.remove_composition(composition.id())?;
            }
            t.finished_goods.remove(&id).ok_or_else(|| DomainError::not_found(format!("finished good {id}")))
        })
    }

    pub fn delete_material(&self, uow: Option<&mut UnitOfWork<'_>>, id: MaterialId) -> DomainResult<Material> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let name = t.material(id)?.name.clone();
            ensure_unreferenced(t, "material", ComponentRef::Material(id), &name)?;
            let dependents = t.products_of(id).len() + t.material_units.values().filter(|u| u.material_id == id).count();
            if dependents > 0 {
                return Err(integrity("material", &name, dependents, "product or unit"));
            }
            t.materials.remove(&id).ok_or_else(|| DomainError::not_found(format!("material {id}")))
        })
    }

    pub fn delete_material_product(
        &self,
        uow: Option<&mut UnitOfWork<'_>>,
        id: MaterialProductId,
    ) -> DomainResult<MaterialProduct> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let name = t.material_product(id)?.name.clone();
            ensure_unreferenced(t, "material product", ComponentRef::Packaging(id), &name)?;
            t.material_products
                .remove(&id)
                .ok_or_else(|| DomainError::not_found(format!("material product {id}")))
        })
    }

    pub fn delete_material_unit(&self, uow: Option<&mut UnitOfWork<'_>>, id: MaterialUnitId) -> DomainResult<MaterialUnit> {
        self.db.run(uow, |uow| {
            let t = uow.tables_mut();
            let name = t.material_unit(id)?.name.clone();
            ensure_unreferenced(t, "material unit", ComponentRef::MaterialUnit(id), &name)?;
            t.material_units
                .remove(&id)
                .ok_or_else(|| DomainError::not_found(format!("material unit {id}")))
        })
    }
}
