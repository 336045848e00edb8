//! Inventory domain module.
//!
//! Perishable ingredient lots, FIFO consumption planning and the immutable
//! manual-depletion record. Pure domain logic (no IO, no storage); the engine
//! crate applies plans inside a unit of work.

pub mod consumption;
pub mod depletion;
pub mod fifo;
pub mod item;

pub use consumption::{IngredientConsumption, IngredientConsumptionId};
pub use depletion::{DepletionId, InventoryDepletion, ManualAdjustment};
pub use fifo::{FifoPlan, LotDraw, fifo_order, plan_fifo};
pub use item::{InventoryItem, InventoryItemId};
