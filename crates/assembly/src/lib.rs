//! Assembly domain module.
//!
//! Allocation rules for generic material placeholders and the immutable
//! records an assembly leaves behind. Pure domain logic.

pub mod allocation;
pub mod run;

pub use allocation::{Allocations, MaterialDemand, ProductAllocation, allocate_greedy, validate_allocation};
pub use run::{AssemblyConsumption, AssemblyConsumptionId, AssemblyRun, AssemblyRunId};
