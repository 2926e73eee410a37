use catalog::{migrations, Catalog};
use catalog_orm::{Database, OnDelete};

const TABLES: [&str; 5] =
    ["catalog_feature", "catalog_category", "catalog_brand", "catalog_product", "catalog_product_features"];

async fn database() -> Result<Database, Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    Ok(Database::builder().max_connections(1).connect("sqlite::memory:").await?)
}

#[tokio::test]
async fn test_initial_migration_creates_catalog_tables() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;
    let applied = Catalog::new(db.clone()).migrate().await?;
    assert_eq!(applied, vec!["catalog.0001_initial".to_string()]);

    for table in TABLES {
        assert!(db.table_exists(table).await?, "{} should exist", table);
    }

    assert_eq!(
        db.get_table_columns("catalog_product").await?,
        ["id", "name", "price", "stock", "date_added", "description", "category_id", "brand_id"]
    );
    assert_eq!(db.get_table_columns("catalog_feature").await?, ["id", "name", "value"]);
    assert_eq!(db.get_table_columns("catalog_product_features").await?, ["product_id", "feature_id"]);

    let mut keys = db.get_foreign_keys("catalog_product").await?;
    keys.sort_by(|a, b| a.column.cmp(&b.column));
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].column, "brand_id");
    assert_eq!(keys[0].foreign_table, "catalog_brand");
    assert_eq!(keys[1].column, "category_id");
    assert_eq!(keys[1].foreign_table, "catalog_category");
    assert!(keys.iter().all(|k| k.foreign_column == "id" && k.on_delete == Some(OnDelete::Cascade)));

    let join_keys = db.get_foreign_keys("catalog_product_features").await?;
    assert_eq!(join_keys.len(), 2);
    assert!(join_keys.iter().all(|k| k.on_delete == Some(OnDelete::Cascade)));

    let indexes = db.get_table_indexes("catalog_product").await?;
    assert!(indexes.contains(&"idx_catalog_product_category_id".to_string()));
    assert!(indexes.contains(&"idx_catalog_product_brand_id".to_string()));
    let indexes = db.get_table_indexes("catalog_product_features").await?;
    assert!(indexes.contains(&"idx_catalog_product_features_feature_id".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_migrating_twice_applies_once() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;
    let catalog = Catalog::new(db.clone());

    assert_eq!(catalog.migrate().await?.len(), 1);
    assert!(catalog.migrate().await?.is_empty());

    let status = db.migrator().register_all(migrations::all()).status().await?;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].app, "catalog");
    assert_eq!(status[0].name, "0001_initial");
    assert!(status[0].is_applied());
    Ok(())
}

#[tokio::test]
async fn test_status_before_migrating() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;
    let status = db.migrator().register_all(migrations::all()).status().await?;
    assert_eq!(status.len(), 1);
    assert!(!status[0].is_applied());
    assert!(!db.table_exists("catalog_product").await?);

    let json = serde_json::to_value(&status)?;
    assert_eq!(json[0]["name"], "0001_initial");
    assert!(json[0]["applied"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_rollback_drops_tables_and_allows_reapply() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;
    let catalog = Catalog::new(db.clone());
    catalog.migrate().await?;

    let reverted = db.migrator().register_all(migrations::all()).rollback().await?;
    assert_eq!(reverted.as_deref(), Some("catalog.0001_initial"));
    for table in TABLES {
        assert!(!db.table_exists(table).await?, "{} should be gone", table);
    }
    assert!(db.migrator().register_all(migrations::all()).rollback().await?.is_none());

    assert_eq!(catalog.migrate().await?, vec!["catalog.0001_initial".to_string()]);
    assert!(db.table_exists("catalog_product").await?);
    Ok(())
}

#[tokio::test]
async fn test_untracked_tables_are_not_adopted() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;
    db.raw("CREATE TABLE \"catalog_brand\" (\"id\" INTEGER PRIMARY KEY)").execute().await?;

    let err = Catalog::new(db.clone()).migrate().await.expect_err("catalog_brand already exists");
    assert!(matches!(err, catalog::CatalogError::Orm(catalog_orm::Error::Migration { .. })));

    // the failed migration left nothing behind
    assert!(!db.table_exists("catalog_feature").await?);
    let status = db.migrator().register_all(migrations::all()).status().await?;
    assert!(!status[0].is_applied());
    Ok(())
}
