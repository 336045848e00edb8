//! Production domain module.
//!
//! Production runs, yield/loss derivation and the records a run leaves behind.
//! Pure domain logic (no IO, no storage).

pub mod consumption;
pub mod loss;
pub mod run;

pub use consumption::{ProductionConsumption, ProductionConsumptionId};
pub use loss::{ProductionLoss, ProductionLossId};
pub use run::{ProductionRun, ProductionRunId, ProductionStatus, YieldOutcome};
