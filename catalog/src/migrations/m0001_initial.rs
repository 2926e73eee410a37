use catalog_orm::{async_trait, Error, Migration, SchemaManager};

use crate::models::{Brand, Category, Feature, Product};

/// Creates the feature, category, brand and product tables.
///
/// Products come last since they reference the other three.
pub struct Initial;

#[async_trait]
impl Migration for Initial {
    fn app(&self) -> &'static str {
        super::APP
    }

    fn name(&self) -> &'static str {
        "0001_initial"
    }

    async fn up(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.create_model::<Feature>().await?;
        schema.create_model::<Category>().await?;
        schema.create_model::<Brand>().await?;
        schema.create_model::<Product>().await?;
        Ok(())
    }

    async fn down(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.drop_model::<Product>().await?;
        schema.drop_model::<Brand>().await?;
        schema.drop_model::<Category>().await?;
        schema.drop_model::<Feature>().await?;
        Ok(())
    }
}
