//! Catalog domain module.
//!
//! Definitions of everything that can be purchased, produced or assembled, and
//! the polymorphic bill-of-materials (`Composition`). Pure domain logic: no IO,
//! no storage. Costs are deliberately absent from every definition; they are
//! computed on demand from transaction history.

pub mod composition;
pub mod definitions;

pub use composition::{ComponentKind, ComponentRef, Composition, CompositionId, CompositionRow, creates_cycle};
pub use definitions::{
    FinishedGood, FinishedGoodId, FinishedUnit, FinishedUnitId, Ingredient, IngredientId,
    Material, MaterialId, MaterialProductId, MaterialUnit, MaterialUnitId, Recipe, RecipeId,
    RecipeLine, Supplier, SupplierId,
};
