//! # Catalog Store
//!
//! CRUD entry points for the catalog. Column constraints (lengths, blank
//! strings, decimal digits, references) are checked by the ORM and the
//! database; the store adds the rules the schema leaves to the application.

use catalog_orm::{Database, Order};
use rust_decimal::Decimal;

use crate::{
    config::Config,
    error::CatalogError,
    migrations,
    models::{Brand, Category, Feature, Product},
};

/// Relation name of a product's features.
const FEATURES: &str = "features";

/// Handle on the catalog tables. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connects with the pool size and URL from `config`.
    pub async fn connect(config: &Config) -> Result<Self, CatalogError> {
        let db = Database::builder().max_connections(config.max_connections).connect(&config.database_url).await?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Applies pending catalog migrations, returning the labels applied.
    pub async fn migrate(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.db.migrator().register_all(migrations::all()).run().await?)
    }

    pub async fn create_category(&self, name: &str, description: &str) -> Result<Category, CatalogError> {
        Ok(self.db.model::<Category>().insert(&Category::new(name, description)).await?)
    }

    pub async fn create_brand(&self, name: &str, description: &str) -> Result<Brand, CatalogError> {
        Ok(self.db.model::<Brand>().insert(&Brand::new(name, description)).await?)
    }

    pub async fn create_feature(&self, name: &str, value: &str) -> Result<Feature, CatalogError> {
        Ok(self.db.model::<Feature>().insert(&Feature::new(name, value)).await?)
    }

    /// Stores a new product. `date_added` is set to the insertion time.
    pub async fn add_product(&self, product: &Product) -> Result<Product, CatalogError> {
        check_quantities(product)?;
        let stored = self.db.model::<Product>().insert(product).await?;
        log::debug!("added product {} ({})", stored.id, stored.name);
        Ok(stored)
    }

    /// Writes every field of `product` except `date_added`.
    pub async fn update_product(&self, product: &Product) -> Result<Product, CatalogError> {
        check_quantities(product)?;
        Ok(self.db.model::<Product>().update(product).await?)
    }

    pub async fn product(&self, id: i64) -> Result<Product, CatalogError> {
        Ok(self.db.model::<Product>().find(id).await?)
    }

    pub async fn products_in_category(&self, category_id: i64) -> Result<Vec<Product>, CatalogError> {
        Ok(self.db.model::<Product>().equals("category_id", category_id).order_by("id", Order::Asc).scan().await?)
    }

    pub async fn products_of_brand(&self, brand_id: i64) -> Result<Vec<Product>, CatalogError> {
        Ok(self.db.model::<Product>().equals("brand_id", brand_id).order_by("id", Order::Asc).scan().await?)
    }

    /// Deletes a category together with its products. Returns whether it existed.
    pub async fn delete_category(&self, id: i64) -> Result<bool, CatalogError> {
        let deleted = self.db.model::<Category>().equals("id", id).delete().await?;
        Ok(deleted > 0)
    }

    /// Deletes a brand together with its products. Returns whether it existed.
    pub async fn delete_brand(&self, id: i64) -> Result<bool, CatalogError> {
        let deleted = self.db.model::<Brand>().equals("id", id).delete().await?;
        Ok(deleted > 0)
    }

    pub async fn delete_product(&self, id: i64) -> Result<bool, CatalogError> {
        let deleted = self.db.model::<Product>().equals("id", id).delete().await?;
        Ok(deleted > 0)
    }

    /// Links features to a product. Features already linked are skipped.
    pub async fn attach_features(&self, product_id: i64, feature_ids: &[i64]) -> Result<u64, CatalogError> {
        Ok(self.db.many_to_many::<Product>(FEATURES)?.add(product_id, feature_ids).await?)
    }

    pub async fn detach_features(&self, product_id: i64, feature_ids: &[i64]) -> Result<u64, CatalogError> {
        Ok(self.db.many_to_many::<Product>(FEATURES)?.remove(product_id, feature_ids).await?)
    }

    /// Features linked to a product, ordered by id.
    pub async fn product_features(&self, product_id: i64) -> Result<Vec<Feature>, CatalogError> {
        Ok(self.db.many_to_many::<Product>(FEATURES)?.fetch::<Feature>(product_id).await?)
    }
}

fn check_quantities(product: &Product) -> Result<(), CatalogError> {
    if product.price < Decimal::ZERO {
        return Err(CatalogError::NegativePrice(product.price));
    }
    if product.stock < 0 {
        return Err(CatalogError::NegativeStock(product.stock));
    }
    Ok(())
}
