//! # Catalog
//!
//! The product catalog: four models, the migration that creates their tables
//! and a small store that enforces the rules the schema cannot express.

pub mod config;
pub mod error;
pub mod migrations;
pub mod models;
pub mod store;

pub use config::{Config, ConfigError};
pub use error::CatalogError;
pub use models::{Brand, Category, Feature, Product};
pub use store::Catalog;
