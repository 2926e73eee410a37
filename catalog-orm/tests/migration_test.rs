use catalog_orm::{Database, Error, Migration, Model, SchemaManager, async_trait};

#[derive(Debug, Clone, Model, PartialEq)]
struct Account {
    #[orm(primary_key, auto_increment)]
    id: i64,
    #[orm(size = 40, index)]
    email: String,
}

struct CreateAccounts;

#[async_trait]
impl Migration for CreateAccounts {
    fn app(&self) -> &'static str {
        "auth"
    }

    fn name(&self) -> &'static str {
        "0001_accounts"
    }

    async fn up(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.create_model::<Account>().await
    }

    async fn down(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.drop_model::<Account>().await
    }
}

/// Seeds data through the migration's own transaction.
struct SeedAdmin;

#[async_trait]
impl Migration for SeedAdmin {
    fn app(&self) -> &'static str {
        "auth"
    }

    fn name(&self) -> &'static str {
        "0002_seed_admin"
    }

    async fn up(&self, schema: &SchemaManager) -> Result<(), Error> {
        assert!(schema.table_exists("account").await?);
        schema.model::<Account>().insert(&Account { id: 0, email: "admin@example.com".to_string() }).await?;
        Ok(())
    }

    async fn down(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.model::<Account>().equals("email", "admin@example.com".to_string()).delete().await?;
        Ok(())
    }
}

/// Creates a table, then fails.
struct Broken;

#[async_trait]
impl Migration for Broken {
    fn app(&self) -> &'static str {
        "auth"
    }

    fn name(&self) -> &'static str {
        "0003_broken"
    }

    async fn up(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.execute("CREATE TABLE scratch (id INTEGER)").await?;
        schema.execute("INSERT INTO missing_table VALUES (1)").await?;
        Ok(())
    }

    async fn down(&self, _schema: &SchemaManager) -> Result<(), Error> {
        Ok(())
    }
}

/// Ends its transaction early, then fails, so the rollback fails as well.
struct EndsTransaction;

#[async_trait]
impl Migration for EndsTransaction {
    fn app(&self) -> &'static str {
        "auth"
    }

    fn name(&self) -> &'static str {
        "0004_ends_transaction"
    }

    async fn up(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.execute("COMMIT").await?;
        schema.execute("INSERT INTO missing_table VALUES (1)").await?;
        Ok(())
    }

    async fn down(&self, _schema: &SchemaManager) -> Result<(), Error> {
        Ok(())
    }
}

async fn database() -> Result<Database, Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    Ok(Database::builder().max_connections(1).connect("sqlite::memory:").await?)
}

#[tokio::test]
async fn test_migrations_run_in_order_once() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;

    let applied = db.migrator().register(CreateAccounts).register(SeedAdmin).run().await?;
    assert_eq!(applied, ["auth.0001_accounts", "auth.0002_seed_admin"]);

    let applied = db.migrator().register(CreateAccounts).register(SeedAdmin).run().await?;
    assert!(applied.is_empty());

    assert_eq!(db.model::<Account>().count().await?, 1);
    assert!(db.get_table_indexes("account").await?.contains(&"idx_account_email".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_failed_migration_is_rolled_back() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;

    let err = db
        .migrator()
        .register(CreateAccounts)
        .register(Broken)
        .run()
        .await
        .expect_err("0003_broken fails");
    match err {
        Error::Migration { name, source } => {
            assert_eq!(name, "auth.0003_broken");
            assert!(matches!(*source, Error::Database(_)));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(db.table_exists("account").await?);
    assert!(!db.table_exists("scratch").await?);

    let status = db.migrator().register(CreateAccounts).register(Broken).status().await?;
    assert!(status[0].is_applied());
    assert!(!status[1].is_applied());
    Ok(())
}

#[tokio::test]
async fn test_rollback_reverts_latest_first() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;
    let migrator = db.migrator().register(CreateAccounts).register(SeedAdmin);
    migrator.run().await?;

    assert_eq!(migrator.rollback().await?.as_deref(), Some("auth.0002_seed_admin"));
    assert_eq!(db.model::<Account>().count().await?, 0);
    assert!(db.table_exists("account").await?);

    assert_eq!(migrator.rollback().await?.as_deref(), Some("auth.0001_accounts"));
    assert!(!db.table_exists("account").await?);
    assert!(migrator.rollback().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_rollback_of_unregistered_migration() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;
    db.migrator().register(CreateAccounts).run().await?;

    let result = db.migrator().rollback().await;
    assert!(matches!(result, Err(Error::UnknownMigration(label)) if label == "auth.0001_accounts"));
    Ok(())
}

#[tokio::test]
async fn test_failed_rollback_keeps_the_original_cause() -> Result<(), Box<dyn std::error::Error>> {
    let db = database().await?;

    let err = db.migrator().register(EndsTransaction).run().await.expect_err("0004 fails");
    match err {
        Error::Migration { name, source } => {
            assert_eq!(name, "auth.0004_ends_transaction");
            assert!(matches!(*source, Error::Database(_)));
            assert!(source.to_string().contains("missing_table"), "unexpected cause: {source}");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}
