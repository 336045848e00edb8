use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, Entity, define_id, ensure_positive};

define_id!(SupplierId, "SupplierId");
define_id!(IngredientId, "IngredientId");
define_id!(RecipeId, "RecipeId");
define_id!(FinishedUnitId, "FinishedUnitId");
define_id!(FinishedGoodId, "FinishedGoodId");
define_id!(MaterialId, "MaterialId");
define_id!(
    /// A concrete, purchasable material product (declared here so compositions
    /// can reference packaging without depending on the materials crate).
    MaterialProductId,
    "MaterialProductId"
);
define_id!(MaterialUnitId, "MaterialUnitId");

fn ensure_named(what: &str, name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation(format!("{what} name cannot be empty")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub city: Option<String>,
}

impl Supplier {
    pub fn new(name: impl Into<String>, city: Option<String>) -> DomainResult<Self> {
        let name = name.into();
        ensure_named("supplier", &name)?;
        Ok(Self {
            id: SupplierId::new(),
            name,
            city,
        })
    }
}

/// Perishable ingredient, tracked in FIFO lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub slug: String,
    pub name: String,
    pub category: String,
    /// Unit lots are purchased and stored in (e.g. "cup", "lb").
    pub purchase_unit: String,
    /// Grams per millilitre; enables volume <-> weight conversion.
    pub density_g_per_ml: Option<Decimal>,
}

impl Ingredient {
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        purchase_unit: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        ensure_named("ingredient", &name)?;
        let purchase_unit = purchase_unit.into();
        if purchase_unit.trim().is_empty() {
            return Err(DomainError::validation("ingredient purchase unit cannot be empty"));
        }
        Ok(Self {
            id: IngredientId::new(),
            slug: slug.into(),
            name,
            category: category.into(),
            purchase_unit,
            density_g_per_ml: None,
        })
    }

    pub fn with_density(mut self, grams_per_ml: Decimal) -> DomainResult<Self> {
        self.density_g_per_ml = Some(ensure_positive("density", grams_per_ml)?);
        Ok(self)
    }
}

impl Entity for Ingredient {
    type Id = IngredientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_id: IngredientId,
    /// Quantity per batch.
    pub quantity: Decimal,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub items_per_batch: u32,
    pub lines: Vec<RecipeLine>,
}

impl Recipe {
    pub fn new(
        name: impl Into<String>,
        items_per_batch: u32,
        lines: Vec<RecipeLine>,
    ) -> DomainResult<Self> {
        let name = name.into();
        ensure_named("recipe", &name)?;
        if items_per_batch == 0 {
            return Err(DomainError::validation("items per batch must be positive"));
        }
        for line in &lines {
            ensure_positive("recipe line quantity", line.quantity)?;
        }
        Ok(Self {
            id: RecipeId::new(),
            name,
            items_per_batch,
            lines,
        })
    }
}

/// A single produced item (e.g. one cookie) made by a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedUnit {
    pub id: FinishedUnitId,
    pub slug: String,
    pub name: String,
    pub recipe_id: RecipeId,
    pub inventory_count: u64,
}

impl FinishedUnit {
    pub fn new(slug: impl Into<String>, name: impl Into<String>, recipe_id: RecipeId) -> DomainResult<Self> {
        let name = name.into();
        ensure_named("finished unit", &name)?;
        Ok(Self {
            id: FinishedUnitId::new(),
            slug: slug.into(),
            name,
            recipe_id,
            inventory_count: 0,
        })
    }
}

impl Entity for FinishedUnit {
    type Id = FinishedUnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// A sellable assembly (gift box, tray) built from compositions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedGood {
    pub id: FinishedGoodId,
    pub slug: String,
    pub name: String,
    pub inventory_count: u64,
}

impl FinishedGood {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        ensure_named("finished good", &name)?;
        Ok(Self {
            id: FinishedGoodId::new(),
            slug: slug.into(),
            name,
            inventory_count: 0,
        })
    }
}

impl Entity for FinishedGood {
    type Id = FinishedGoodId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// Abstract material (e.g. "Red Ribbon"), backed by one or more products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub slug: String,
    pub name: String,
    pub category: String,
    /// Unit material products are stocked in (e.g. "inch", "each").
    pub base_unit: String,
}

impl Material {
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        base_unit: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        ensure_named("material", &name)?;
        Ok(Self {
            id: MaterialId::new(),
            slug: slug.into(),
            name,
            category: category.into(),
            base_unit: base_unit.into(),
        })
    }
}

impl Entity for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// A consumable portion of a material (e.g. "6-inch ribbon").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialUnit {
    pub id: MaterialUnitId,
    pub slug: String,
    pub name: String,
    pub material_id: MaterialId,
    /// Material base units consumed per unit.
    pub quantity_per_unit: Decimal,
}

impl MaterialUnit {
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        material_id: MaterialId,
        quantity_per_unit: Decimal,
    ) -> DomainResult<Self> {
        let name = name.into();
        ensure_named("material unit", &name)?;
        Ok(Self {
            id: MaterialUnitId::new(),
            slug: slug.into(),
            name,
            material_id,
            quantity_per_unit: ensure_positive("quantity per unit", quantity_per_unit)?,
        })
    }
}

impl Entity for MaterialUnit {
    type Id = MaterialUnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_rejects_zero_yield() {
        let err = Recipe::new("Sugar cookies", 0, vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn recipe_rejects_non_positive_line() {
        let line = RecipeLine {
            ingredient_id: IngredientId::new(),
            quantity: Decimal::ZERO,
            unit: "cup".to_string(),
        };
        assert!(Recipe::new("Sugar cookies", 24, vec![line]).is_err());
    }

    #[test]
    fn ingredient_density_must_be_positive() {
        let flour = Ingredient::new("flour", "All-purpose flour", "baking", "cup").unwrap();
        assert!(flour.clone().with_density(Decimal::ZERO).is_err());
        assert!(flour.with_density(Decimal::new(53, 2)).is_ok());
    }

    #[test]
    fn definitions_require_names() {
        assert!(FinishedGood::new("box", "  ").is_err());
        assert!(Material::new("ribbon", "", "ribbon", "inch").is_err());
        assert!(Supplier::new("", None).is_err());
    }

    #[test]
    fn new_finished_items_start_with_empty_inventory() {
        let unit = FinishedUnit::new("cookie", "Sugar cookie", RecipeId::new()).unwrap();
        assert_eq!(unit.inventory_count, 0);
    }
}
