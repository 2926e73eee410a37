//! # Catalog ORM Macros
//!
//! Procedural macros for catalog-orm.
//!
//! - `#[derive(Model)]`: implements `catalog_orm::Model` from a struct and its
//!   `#[orm(...)]` attributes.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod derive_model;
mod types;

/// Derives `catalog_orm::Model`.
///
/// Struct attributes:
/// - `#[orm(table = "name")]`: table name (defaults to the struct name in snake_case).
/// - `#[orm(many_to_many(field = "Target"))]`: a join table to the `Target` model.
///
/// Field attributes: `primary_key`, `auto_increment`, `size = N`, `max_digits = N`,
/// `decimal_places = N`, `default = <literal>`, `blank`, `create_time`,
/// `update_time`, `unique`, `index`, `foreign_key = "Model::column"` and
/// `on_delete = "cascade" | "restrict" | "set_null" | "no_action"`.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Model)]
/// #[orm(table = "shop_item", many_to_many(tags = "Tag"))]
/// struct Item {
///     #[orm(primary_key, auto_increment)]
///     id: i64,
///     #[orm(size = 200)]
///     name: String,
///     #[orm(foreign_key = "Shelf::id", on_delete = "cascade")]
///     shelf_id: i64,
/// }
/// ```
#[proc_macro_derive(Model, attributes(orm))]
pub fn model_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    derive_model::expand(ast).unwrap_or_else(syn::Error::into_compile_error).into()
}
