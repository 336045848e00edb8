//! Materials domain module.
//!
//! Non-perishable packaging and craft materials, costed by running weighted
//! average rather than per-lot FIFO. Pure domain logic.

pub mod adjustment;
pub mod consumption;
pub mod product;
pub mod purchase;

pub use adjustment::{MaterialAdjustment, MaterialAdjustmentId};
pub use consumption::{MaterialConsumption, MaterialConsumptionId};
pub use product::{MaterialProduct, blended_unit_cost, weighted_average};
pub use purchase::{MaterialPurchase, MaterialPurchaseId, PurchaseDraft};
