use catalog::{Brand, Feature, Product};
use catalog_orm::{schema, Drivers};

#[test]
fn test_product_ddl_on_postgres() {
    let statements = schema::create_table_statements::<Product>(Drivers::Postgres, false);
    assert_eq!(statements.len(), 5);

    assert_eq!(
        statements[0],
        "CREATE TABLE \"catalog_product\" (\
         \"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY, \
         \"name\" VARCHAR(200) NOT NULL, \
         \"price\" DECIMAL(10, 2) NOT NULL, \
         \"stock\" INTEGER NOT NULL DEFAULT 0, \
         \"date_added\" TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP, \
         \"description\" TEXT NOT NULL, \
         \"category_id\" BIGINT NOT NULL, \
         \"brand_id\" BIGINT NOT NULL, \
         CONSTRAINT \"fk_catalog_product_category_id\" FOREIGN KEY (\"category_id\") REFERENCES \"catalog_category\" (\"id\") ON DELETE CASCADE, \
         CONSTRAINT \"fk_catalog_product_brand_id\" FOREIGN KEY (\"brand_id\") REFERENCES \"catalog_brand\" (\"id\") ON DELETE CASCADE)"
    );
    assert_eq!(statements[1], "CREATE INDEX \"idx_catalog_product_category_id\" ON \"catalog_product\" (\"category_id\")");
    assert_eq!(statements[2], "CREATE INDEX \"idx_catalog_product_brand_id\" ON \"catalog_product\" (\"brand_id\")");
    assert_eq!(
        statements[3],
        "CREATE TABLE \"catalog_product_features\" (\
         \"product_id\" BIGINT NOT NULL, \
         \"feature_id\" BIGINT NOT NULL, \
         PRIMARY KEY (\"product_id\", \"feature_id\"), \
         CONSTRAINT \"fk_catalog_product_features_product_id\" FOREIGN KEY (\"product_id\") REFERENCES \"catalog_product\" (\"id\") ON DELETE CASCADE, \
         CONSTRAINT \"fk_catalog_product_features_feature_id\" FOREIGN KEY (\"feature_id\") REFERENCES \"catalog_feature\" (\"id\") ON DELETE CASCADE)"
    );
    assert_eq!(
        statements[4],
        "CREATE INDEX \"idx_catalog_product_features_feature_id\" ON \"catalog_product_features\" (\"feature_id\")"
    );
}

#[test]
fn test_mysql_quoting_and_types() {
    let statements = schema::create_table_statements::<Brand>(Drivers::MySQL, false);
    assert_eq!(
        statements,
        ["CREATE TABLE `catalog_brand` (`id` BIGINT AUTO_INCREMENT PRIMARY KEY, `name` VARCHAR(100) NOT NULL, `description` LONGTEXT NOT NULL)"]
    );

    let product = schema::create_table_statements::<Product>(Drivers::MySQL, false);
    assert!(product[0].contains("`date_added` DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)"));
}

#[test]
fn test_sqlite_feature_table() {
    let statements = schema::create_table_statements::<Feature>(Drivers::SQLite, false);
    assert_eq!(
        statements,
        ["CREATE TABLE \"catalog_feature\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" VARCHAR(100) NOT NULL, \"value\" VARCHAR(200) NOT NULL)"]
    );
}

#[test]
fn test_drop_order() {
    assert_eq!(
        schema::drop_table_statements::<Product>(Drivers::SQLite),
        ["DROP TABLE \"catalog_product_features\"", "DROP TABLE \"catalog_product\""]
    );
}
