//! Schema migrations of the catalog app, oldest first.

use catalog_orm::Migration;

mod m0001_initial;

pub use m0001_initial::Initial;

pub const APP: &str = "catalog";

/// Every catalog migration in the order it must be applied.
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![Box::new(Initial)]
}
