//! Catalog models.
//!
//! Products belong to one category and one brand and carry any number of
//! features. Deleting a category or brand deletes its products.

use catalog_orm::Model;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Model, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[orm(table = "catalog_category")]
pub struct Category {
    #[orm(primary_key, auto_increment)]
    pub id: i64,
    #[orm(size = 100)]
    pub name: String,
    #[orm(blank)]
    pub description: String,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id: 0, name: name.into(), description: description.into() }
    }
}

#[derive(Model, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[orm(table = "catalog_brand")]
pub struct Brand {
    #[orm(primary_key, auto_increment)]
    pub id: i64,
    #[orm(size = 100)]
    pub name: String,
    #[orm(blank)]
    pub description: String,
}

impl Brand {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id: 0, name: name.into(), description: description.into() }
    }
}

/// A named attribute such as `color = red`, shared between products.
#[derive(Model, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[orm(table = "catalog_feature")]
pub struct Feature {
    #[orm(primary_key, auto_increment)]
    pub id: i64,
    #[orm(size = 100)]
    pub name: String,
    #[orm(size = 200)]
    pub value: String,
}

impl Feature {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { id: 0, name: name.into(), value: value.into() }
    }
}

#[derive(Model, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[orm(table = "catalog_product", many_to_many(features = "Feature"))]
pub struct Product {
    #[orm(primary_key, auto_increment)]
    pub id: i64,
    #[orm(size = 200)]
    pub name: String,
    #[orm(max_digits = 10, decimal_places = 2)]
    pub price: Decimal,
    #[orm(default = 0)]
    pub stock: i32,
    /// Set by the database layer on insert and never rewritten.
    #[orm(create_time)]
    pub date_added: DateTime<Utc>,
    #[orm(blank)]
    pub description: String,
    #[orm(foreign_key = "Category::id", on_delete = "cascade")]
    pub category_id: i64,
    #[orm(foreign_key = "Brand::id", on_delete = "cascade")]
    pub brand_id: i64,
}

impl Product {
    /// A product ready to insert. `stock` starts at zero and `date_added` is
    /// replaced with the insertion time.
    pub fn new(name: impl Into<String>, price: Decimal, category_id: i64, brand_id: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            price,
            stock: 0,
            date_added: Utc::now(),
            description: String::new(),
            category_id,
            brand_id,
        }
    }

    pub fn with_stock(mut self, stock: i32) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_orm::{OnDelete, SqlType};

    #[test]
    fn product_columns() {
        let columns = Product::columns();
        let names: Vec<_> = columns.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            ["id", "name", "price", "stock", "date_added", "description", "category_id", "brand_id"]
        );

        let price = &columns[2];
        assert_eq!(price.sql_type, SqlType::Decimal { max_digits: 10, decimal_places: 2 });
        assert_eq!(columns[3].default, Some("0"));
        assert!(columns[4].create_time);
        assert!(columns[5].blank);

        let category = columns[6].foreign_key.as_ref().unwrap();
        assert_eq!(category.table, "catalog_category");
        assert_eq!(category.on_delete, OnDelete::Cascade);
        assert!(columns[6].index);
    }

    #[test]
    fn features_join_table() {
        let relations = Product::many_to_many();
        assert_eq!(relations.len(), 1);
        let features = &relations[0];
        assert_eq!(features.join_table, "catalog_product_features");
        assert_eq!(features.source_column, "product_id");
        assert_eq!(features.target_column, "feature_id");
        assert_eq!(features.target_table, "catalog_feature");
    }

    #[test]
    fn string_bounds() {
        assert_eq!(Category::columns()[1].sql_type, SqlType::Varchar(100));
        assert_eq!(Feature::columns()[2].sql_type, SqlType::Varchar(200));
        assert_eq!(Brand::columns()[2].sql_type, SqlType::Text);
    }
}
