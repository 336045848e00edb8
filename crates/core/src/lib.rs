//! `larder-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, decimal quantity helpers and configurable
//! code lists.

pub mod codes;
pub mod entity;
pub mod error;
pub mod id;
pub mod quantity;

pub use codes::CodeList;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use quantity::{ensure_non_negative, ensure_positive};

// Re-exported so id macros expanded in downstream crates resolve without
// each crate naming `uuid` directly.
#[doc(hidden)]
pub use uuid;
