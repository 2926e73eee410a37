//! # Migrations
//!
//! Versioned schema changes. Each [`Migration`] is identified by its app label
//! and name, runs inside its own transaction, and is recorded in the
//! `orm_migrations` table so it is applied exactly once.
//!
//! ```rust,ignore
//! db.migrator()
//!     .register(catalog::migrations::Initial)
//!     .run()
//!     .await?;
//! ```

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    database::{self, Connection, Database, Drivers},
    query::Order,
    schema,
    transaction::Transaction,
    Error, Model, QueryBuilder,
};

// ============================================================================
// Migration Trait
// ============================================================================

/// A reversible schema change.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Label of the application the migration belongs to (e.g. `catalog`).
    fn app(&self) -> &'static str;

    /// Name unique within the app, ordered by convention (`0001_initial`).
    fn name(&self) -> &'static str;

    async fn up(&self, schema: &SchemaManager) -> Result<(), Error>;

    async fn down(&self, schema: &SchemaManager) -> Result<(), Error>;
}

fn label(migration: &dyn Migration) -> String {
    format!("{}.{}", migration.app(), migration.name())
}

// ============================================================================
// Schema Manager
// ============================================================================

/// Schema operations available to a migration, all bound to its transaction.
pub struct SchemaManager {
    tx: Transaction,
}

impl SchemaManager {
    pub(crate) fn new(tx: Transaction) -> Self {
        Self { tx }
    }

    pub fn driver(&self) -> Drivers {
        self.tx.driver()
    }

    /// Creates the table of `T` with its indexes and join tables.
    pub async fn create_model<T: Model>(&self) -> Result<(), Error> {
        for statement in schema::create_table_statements::<T>(self.driver(), false) {
            self.execute(&statement).await?;
        }
        Ok(())
    }

    /// Drops the table of `T` and its join tables.
    pub async fn drop_model<T: Model>(&self) -> Result<(), Error> {
        for statement in schema::drop_table_statements::<T>(self.driver()) {
            self.execute(&statement).await?;
        }
        Ok(())
    }

    /// Runs a raw statement.
    pub async fn execute(&self, sql: &str) -> Result<u64, Error> {
        let result = self.tx.execute(sql, Default::default()).await?;
        Ok(result.rows_affected())
    }

    pub async fn table_exists(&self, table_name: &str) -> Result<bool, Error> {
        database::table_exists(&self.tx, table_name).await
    }

    /// Data access inside the migration's transaction.
    pub fn model<T: Model>(&self) -> QueryBuilder<T, Transaction> {
        self.tx.model::<T>()
    }
}

// ============================================================================
// Tracking Table
// ============================================================================

/// One applied migration.
#[derive(crate::Model, Debug, Clone, PartialEq)]
#[orm(table = "orm_migrations")]
pub(crate) struct MigrationRecord {
    #[orm(primary_key, auto_increment)]
    pub id: i64,
    #[orm(size = 255)]
    pub app: String,
    #[orm(size = 255)]
    pub name: String,
    #[orm(create_time)]
    pub applied: DateTime<Utc>,
}

impl MigrationRecord {
    fn new(migration: &dyn Migration) -> Self {
        Self { id: 0, app: migration.app().to_string(), name: migration.name().to_string(), applied: Utc::now() }
    }

    fn is(&self, migration: &dyn Migration) -> bool {
        self.app == migration.app() && self.name == migration.name()
    }
}

/// Whether a registered migration has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub app: String,
    pub name: String,
    pub applied: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied.is_some()
    }
}

/// Rolls back a failed migration's transaction. The migration's own error is
/// what gets reported; a failing rollback is only logged.
async fn abort(tx: Transaction, migration: &dyn Migration, cause: Error) -> Error {
    if let Err(e) = tx.rollback().await {
        log::error!("rolling back {} failed: {}", label(migration), e);
    }
    Error::Migration { name: label(migration), source: Box::new(cause) }
}

// ============================================================================
// Migrator
// ============================================================================

/// Schema migration manager.
///
/// Holds migrations in registration order and applies the pending ones.
pub struct Migrator<'a> {
    db: &'a Database,
    migrations: Vec<Box<dyn Migration>>,
}

impl<'a> Migrator<'a> {
    /// Creates a new Migrator instance associated with a Database.
    pub fn new(db: &'a Database) -> Self {
        Self { db, migrations: Vec::new() }
    }

    /// Registers a migration. Migrations run in the order they are registered.
    pub fn register<M: Migration + 'static>(mut self, migration: M) -> Self {
        self.migrations.push(Box::new(migration));
        self
    }

    pub fn register_all(mut self, migrations: impl IntoIterator<Item = Box<dyn Migration>>) -> Self {
        self.migrations.extend(migrations);
        self
    }

    /// Applies every pending migration and returns the labels of those applied.
    ///
    /// Each migration runs in its own transaction together with its tracking
    /// record; a failure rolls that migration back and stops the run.
    pub async fn run(&self) -> Result<Vec<String>, Error> {
        let applied = self.applied().await?;
        let mut done = Vec::new();

        for migration in &self.migrations {
            let migration = migration.as_ref();
            if applied.iter().any(|record| record.is(migration)) {
                log::debug!("{} already applied", label(migration));
                continue;
            }

            log::info!("applying {}", label(migration));
            let started = Instant::now();
            let tx = self.db.begin().await?;
            let schema = SchemaManager::new(tx.clone());

            let outcome = match migration.up(&schema).await {
                Ok(()) => tx.model::<MigrationRecord>().insert(&MigrationRecord::new(migration)).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                log::error!("{} failed: {}", label(migration), e);
                return Err(abort(tx, migration, e).await);
            }

            tx.commit().await?;
            log::info!("applied {} in {:?}", label(migration), started.elapsed());
            done.push(label(migration));
        }

        Ok(done)
    }

    /// Reverts the most recently applied migration.
    ///
    /// Returns its label, or `None` when nothing has been applied.
    pub async fn rollback(&self) -> Result<Option<String>, Error> {
        let Some(record) = self.applied().await?.pop() else {
            return Ok(None);
        };
        let migration = self
            .migrations
            .iter()
            .map(|m| m.as_ref())
            .find(|m| record.is(*m))
            .ok_or_else(|| Error::UnknownMigration(format!("{}.{}", record.app, record.name)))?;

        log::info!("reverting {}", label(migration));
        let tx = self.db.begin().await?;
        let schema = SchemaManager::new(tx.clone());

        let outcome = match migration.down(&schema).await {
            Ok(()) => tx.model::<MigrationRecord>().equals("id", record.id).delete().await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            log::error!("reverting {} failed: {}", label(migration), e);
            return Err(abort(tx, migration, e).await);
        }

        tx.commit().await?;
        Ok(Some(label(migration)))
    }

    /// Lists registered migrations with the time each was applied.
    pub async fn status(&self) -> Result<Vec<MigrationStatus>, Error> {
        let applied = self.applied().await?;
        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                app: m.app().to_string(),
                name: m.name().to_string(),
                applied: applied.iter().find(|record| record.is(m.as_ref())).map(|record| record.applied),
            })
            .collect())
    }

    /// Applied migrations, oldest first. Creates the tracking table on first use.
    async fn applied(&self) -> Result<Vec<MigrationRecord>, Error> {
        for statement in schema::create_table_statements::<MigrationRecord>(self.db.driver(), true) {
            self.db.execute(&statement, Default::default()).await?;
        }
        self.db.model::<MigrationRecord>().order_by("id", Order::Asc).scan().await
    }
}
