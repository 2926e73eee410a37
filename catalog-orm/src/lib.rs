//! # Catalog ORM
//!
//! A lightweight ORM built on top of sqlx's `Any` driver. Models describe their
//! tables through `#[derive(Model)]`, migrations create and drop those tables in
//! order, and a small query builder covers the CRUD operations applications need.
//!
//! ```rust,ignore
//! use catalog_orm::{Database, Model};
//!
//! #[derive(Model, Debug, Clone)]
//! #[orm(table = "shop_category")]
//! struct Category {
//!     #[orm(primary_key, auto_increment)]
//!     id: i64,
//!     #[orm(size = 100)]
//!     name: String,
//! }
//!
//! let db = Database::connect("sqlite::memory:").await?;
//! let stored = db.model::<Category>().insert(&category).await?;
//! ```

// The derive macro emits absolute `catalog_orm::` paths; this lets the crate use it on its own types.
extern crate self as catalog_orm;

pub mod database;
pub mod error;
pub mod migration;
pub mod model;
pub mod query;
pub mod relation;
pub mod schema;
pub mod transaction;
pub mod value;

pub use catalog_orm_macro::Model;

pub use database::{Connection, Database, DatabaseBuilder, Drivers, ForeignKeyInfo, RawQuery};
pub use error::Error;
pub use migration::{Migration, MigrationStatus, Migrator, SchemaManager};
pub use model::{ColumnInfo, ForeignKey, ManyToManyInfo, Model, OnDelete, SqlType};
pub use query::{Op, Order, QueryBuilder};
pub use relation::ManyToMany;
pub use transaction::Transaction;
pub use value::{ColumnValue, Value};

pub use async_trait::async_trait;
pub use sqlx;
pub use sqlx::any::AnyRow;
