//! Infrastructure layer: storage, transactional scope, audit journal,
//! catalog import/export and configuration.

pub mod audit;
pub mod catalog_io;
pub mod config;
pub mod store;

pub use audit::{AuditRecord, AuditTrail};
pub use catalog_io::{
    CATALOG_SCHEMA_VERSION, CatalogDocument, CatalogIoError, MaterialProductEntry, export_catalog, import_catalog,
};
pub use config::{CodeConfig, ConfigError, CostingConfig, EngineConfig, FallbackPolicy};
pub use store::{Database, Tables, UnitOfWork};
