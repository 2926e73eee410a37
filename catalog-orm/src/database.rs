//! # Database Module
//!
//! This module provides the core database connection and management functionality.
//! It handles connection pooling, driver detection, identifier quoting and schema
//! introspection across PostgreSQL, MySQL, and SQLite.

// ============================================================================
// External Crate Imports
// ============================================================================

use futures::future::BoxFuture;
use sqlx::{
    any::{AnyArguments, AnyPoolOptions, AnyQueryResult, AnyRow},
    AnyPool, Arguments, Executor, Row,
};

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::{
    migration::Migrator,
    model::{OnDelete, SqlType},
    relation::ManyToMany,
    transaction::Transaction,
    Error, Model, QueryBuilder,
};

// ============================================================================
// Database Driver Enum
// ============================================================================

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drivers {
    /// PostgreSQL driver
    Postgres,
    /// MySQL driver
    MySQL,
    /// SQLite driver
    SQLite,
}

impl Drivers {
    /// Detects the driver from a connection URL.
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres") {
            Drivers::Postgres
        } else if url.starts_with("mysql") || url.starts_with("mariadb") {
            Drivers::MySQL
        } else {
            Drivers::SQLite
        }
    }

    /// Quotes an identifier (table, column, index or constraint name).
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Drivers::MySQL => format!("`{}`", ident.replace('`', "``")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Placeholder for the `index`-th (1-based) bound parameter of a column of `sql_type`.
    ///
    /// Text-encoded values need an explicit cast on PostgreSQL.
    pub fn placeholder(&self, index: usize, sql_type: &SqlType) -> String {
        match self {
            Drivers::Postgres if sql_type.is_text_encoded() => {
                format!("CAST(${} AS {})", index, sql_type.render(*self))
            }
            Drivers::Postgres => format!("${}", index),
            _ => "?".to_string(),
        }
    }

    /// Select expression for a column, casting text-encoded types to text.
    pub fn select_expr(&self, qualifier: Option<&str>, column: &str, sql_type: &SqlType) -> String {
        let reference = match qualifier {
            Some(q) => format!("{}.{}", self.quote(q), self.quote(column)),
            None => self.quote(column),
        };
        if !sql_type.is_text_encoded() {
            return reference;
        }
        let text = match self {
            Drivers::MySQL => "CHAR",
            _ => "TEXT",
        };
        format!("CAST({} AS {}) AS {}", reference, text, self.quote(column))
    }
}

// ============================================================================
// Database Struct
// ============================================================================

/// The main entry point for database operations.
///
/// `Database` manages a connection pool and provides methods for starting
/// transactions, running migrations, and building queries for models.
///
/// It is cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct Database {
    /// The underlying SQLx connection pool
    pub(crate) pool: AnyPool,
    /// The detected database driver
    pub(crate) driver: Drivers,
}

// ============================================================================
// Database Implementation
// ============================================================================

impl Database {
    /// Creates a new DatabaseBuilder for configuring the connection.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Connects to a database using the provided connection string.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        DatabaseBuilder::new().connect(url).await
    }

    pub fn driver(&self) -> Drivers {
        self.driver
    }

    /// Returns a new Migrator instance for managing schema changes.
    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(self)
    }

    /// Starts building a query for the specified model.
    pub fn model<T: Model>(&self) -> QueryBuilder<T, Self> {
        QueryBuilder::new(self.clone())
    }

    /// Accesses the join table of one of `T`'s many-to-many relations.
    pub fn many_to_many<T: Model>(&self, field: &str) -> Result<ManyToMany<Self>, Error> {
        ManyToMany::new::<T>(self.clone(), field)
    }

    /// Creates a raw SQL query builder.
    pub fn raw<'a>(&self, sql: &'a str) -> RawQuery<'a, Self> {
        RawQuery::new(self.clone(), sql)
    }

    /// Starts a new database transaction.
    pub async fn begin(&self) -> Result<Transaction, Error> {
        let tx = self.pool.begin().await?;
        Ok(Transaction::new(tx, self.driver))
    }

    /// Checks if a table exists in the database.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool, Error> {
        table_exists(self, table_name).await
    }

    /// Returns the current columns of a table.
    pub async fn get_table_columns(&self, table_name: &str) -> Result<Vec<String>, Error> {
        get_table_columns(self, table_name).await
    }

    /// Returns the current indexes of a table.
    pub async fn get_table_indexes(&self, table_name: &str) -> Result<Vec<String>, Error> {
        get_table_indexes(self, table_name).await
    }

    /// Returns the foreign keys declared on a table.
    pub async fn get_foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyInfo>, Error> {
        get_foreign_keys(self, table_name).await
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ============================================================================
// DatabaseBuilder Struct
// ============================================================================

pub struct DatabaseBuilder {
    max_connections: u32,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self { max_connections: 5 }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub async fn connect(self, url: &str) -> Result<Database, Error> {
        sqlx::any::install_default_drivers();
        let driver = Drivers::from_url(url);

        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    // cascades depend on it; SQLite enforces foreign keys per connection
                    if driver == Drivers::SQLite {
                        conn.execute("PRAGMA foreign_keys = ON").await?;
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await?;

        log::debug!("connected to {:?} database ({} connections max)", driver, self.max_connections);
        Ok(Database { pool, driver })
    }
}

// ============================================================================
// Connection Trait
// ============================================================================

/// Something queries can run on: the pool or an open transaction.
pub trait Connection: Clone + Send + Sync {
    fn driver(&self) -> Drivers;
    fn execute<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<AnyQueryResult, sqlx::Error>>;
    fn fetch_all<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<Vec<AnyRow>, sqlx::Error>>;
    fn fetch_one<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<AnyRow, sqlx::Error>>;
    fn fetch_optional<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<Option<AnyRow>, sqlx::Error>>;
}

impl Connection for Database {
    fn driver(&self) -> Drivers {
        self.driver
    }
    fn execute<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<AnyQueryResult, sqlx::Error>> {
        log::debug!("{}", sql);
        Box::pin(async move { sqlx::query_with(sql, args).execute(&self.pool).await })
    }
    fn fetch_all<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<Vec<AnyRow>, sqlx::Error>> {
        log::debug!("{}", sql);
        Box::pin(async move { sqlx::query_with(sql, args).fetch_all(&self.pool).await })
    }
    fn fetch_one<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<AnyRow, sqlx::Error>> {
        log::debug!("{}", sql);
        Box::pin(async move { sqlx::query_with(sql, args).fetch_one(&self.pool).await })
    }
    fn fetch_optional<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<Option<AnyRow>, sqlx::Error>> {
        log::debug!("{}", sql);
        Box::pin(async move { sqlx::query_with(sql, args).fetch_optional(&self.pool).await })
    }
}

// ============================================================================
// Raw SQL Query Builder
// ============================================================================

pub struct RawQuery<'a, C> {
    conn: C,
    sql: &'a str,
    args: AnyArguments<'a>,
    error: Option<sqlx::Error>,
}

impl<'a, C> RawQuery<'a, C>
where
    C: Connection,
{
    pub(crate) fn new(conn: C, sql: &'a str) -> Self {
        Self { conn, sql, args: AnyArguments::default(), error: None }
    }

    pub fn bind<T>(mut self, value: T) -> Self
    where
        T: 'a + sqlx::Encode<'a, sqlx::Any> + sqlx::Type<sqlx::Any> + Send + Sync,
    {
        if let Err(e) = self.args.add(value) {
            self.error.get_or_insert(sqlx::Error::Encode(e));
        }
        self
    }

    pub async fn fetch_all<T>(self) -> Result<Vec<T>, Error>
    where
        T: for<'r> sqlx::FromRow<'r, AnyRow> + Send + Unpin,
    {
        let (conn, sql, args) = self.into_parts()?;
        let rows = conn.fetch_all(sql, args).await?;
        Ok(rows.iter().map(|row| T::from_row(row)).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn fetch_one<T>(self) -> Result<T, Error>
    where
        T: for<'r> sqlx::FromRow<'r, AnyRow> + Send + Unpin,
    {
        let (conn, sql, args) = self.into_parts()?;
        let row = conn.fetch_one(sql, args).await?;
        Ok(T::from_row(&row)?)
    }

    pub async fn fetch_optional<T>(self) -> Result<Option<T>, Error>
    where
        T: for<'r> sqlx::FromRow<'r, AnyRow> + Send + Unpin,
    {
        let (conn, sql, args) = self.into_parts()?;
        let row = conn.fetch_optional(sql, args).await?;
        Ok(row.as_ref().map(|row| T::from_row(row)).transpose()?)
    }

    pub async fn execute(self) -> Result<u64, Error> {
        let (conn, sql, args) = self.into_parts()?;
        let result = conn.execute(sql, args).await?;
        Ok(result.rows_affected())
    }

    fn into_parts(self) -> Result<(C, &'a str, AnyArguments<'a>), Error> {
        match self.error {
            Some(e) => Err(e.into()),
            None => Ok((self.conn, self.sql, self.args)),
        }
    }
}

// ============================================================================
// Schema Introspection
// ============================================================================

/// A foreign key as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub on_delete: Option<OnDelete>,
}

pub(crate) async fn table_exists<C: Connection>(conn: &C, table_name: &str) -> Result<bool, Error> {
    let driver = conn.driver();
    let query = match driver {
        Drivers::Postgres => {
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1 AND table_schema = 'public')"
        }
        Drivers::MySQL => {
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ? AND table_schema = DATABASE()"
        }
        Drivers::SQLite => "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?",
    };

    let mut args = AnyArguments::default();
    args.add(table_name.to_string()).map_err(sqlx::Error::Encode)?;
    let row = conn.fetch_one(query, args).await?;

    match driver {
        Drivers::Postgres => Ok(row.try_get::<bool, _>(0)?),
        _ => Ok(row.try_get::<i64, _>(0)? > 0),
    }
}

pub(crate) async fn get_table_columns<C: Connection>(conn: &C, table_name: &str) -> Result<Vec<String>, Error> {
    let driver = conn.driver();
    let rows = match driver {
        Drivers::SQLite => {
            let query = format!("PRAGMA table_info({})", driver.quote(table_name));
            conn.fetch_all(&query, AnyArguments::default()).await?
        }
        Drivers::Postgres => {
            let query = "SELECT column_name::TEXT FROM information_schema.columns WHERE table_name = $1 AND table_schema = 'public' ORDER BY ordinal_position";
            conn.fetch_all(query, single_arg(table_name)?).await?
        }
        Drivers::MySQL => {
            let query = "SELECT column_name FROM information_schema.columns WHERE table_name = ? AND table_schema = DATABASE() ORDER BY ordinal_position";
            conn.fetch_all(query, single_arg(table_name)?).await?
        }
    };

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let col_name: String = if let Drivers::SQLite = driver { row.try_get("name")? } else { row.try_get(0)? };
        columns.push(col_name);
    }
    Ok(columns)
}

pub(crate) async fn get_table_indexes<C: Connection>(conn: &C, table_name: &str) -> Result<Vec<String>, Error> {
    let driver = conn.driver();
    let rows = match driver {
        Drivers::SQLite => {
            let query = format!("PRAGMA index_list({})", driver.quote(table_name));
            conn.fetch_all(&query, AnyArguments::default()).await?
        }
        Drivers::Postgres => {
            let query = "SELECT indexname::TEXT FROM pg_indexes WHERE tablename = $1 AND schemaname = 'public'";
            conn.fetch_all(query, single_arg(table_name)?).await?
        }
        Drivers::MySQL => {
            let query = "SELECT DISTINCT INDEX_NAME FROM information_schema.STATISTICS WHERE TABLE_NAME = ? AND TABLE_SCHEMA = DATABASE()";
            conn.fetch_all(query, single_arg(table_name)?).await?
        }
    };

    let mut indexes = Vec::with_capacity(rows.len());
    for row in rows {
        let idx_name: String = if let Drivers::SQLite = driver { row.try_get("name")? } else { row.try_get(0)? };
        indexes.push(idx_name);
    }
    Ok(indexes)
}

pub(crate) async fn get_foreign_keys<C: Connection>(conn: &C, table_name: &str) -> Result<Vec<ForeignKeyInfo>, Error> {
    let driver = conn.driver();
    let rows = match driver {
        Drivers::SQLite => {
            let query = format!("PRAGMA foreign_key_list({})", driver.quote(table_name));
            conn.fetch_all(&query, AnyArguments::default()).await?
        }
        Drivers::Postgres => {
            let query = "SELECT kcu.column_name::TEXT, ccu.table_name::TEXT, ccu.column_name::TEXT, rc.delete_rule::TEXT \
                FROM information_schema.table_constraints tc \
                JOIN information_schema.key_column_usage kcu \
                  ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
                JOIN information_schema.constraint_column_usage ccu \
                  ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
                JOIN information_schema.referential_constraints rc \
                  ON rc.constraint_name = tc.constraint_name AND rc.constraint_schema = tc.table_schema \
                WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_name = $1 AND tc.table_schema = 'public'";
            conn.fetch_all(query, single_arg(table_name)?).await?
        }
        Drivers::MySQL => {
            let query = "SELECT kcu.COLUMN_NAME, kcu.REFERENCED_TABLE_NAME, kcu.REFERENCED_COLUMN_NAME, rc.DELETE_RULE \
                FROM information_schema.KEY_COLUMN_USAGE kcu \
                JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
                  ON rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME AND rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA \
                WHERE kcu.TABLE_NAME = ? AND kcu.TABLE_SCHEMA = DATABASE() AND kcu.REFERENCED_TABLE_NAME IS NOT NULL";
            conn.fetch_all(query, single_arg(table_name)?).await?
        }
    };

    let mut keys = Vec::with_capacity(rows.len());
    for row in rows {
        let (column, foreign_table, foreign_column, rule): (String, String, String, String) =
            if let Drivers::SQLite = driver {
                (row.try_get("from")?, row.try_get("table")?, row.try_get("to")?, row.try_get("on_delete")?)
            } else {
                (row.try_get(0)?, row.try_get(1)?, row.try_get(2)?, row.try_get(3)?)
            };
        keys.push(ForeignKeyInfo { column, foreign_table, foreign_column, on_delete: OnDelete::from_rule(&rule) });
    }
    Ok(keys)
}

fn single_arg(value: &str) -> Result<AnyArguments<'static>, Error> {
    let mut args = AnyArguments::default();
    args.add(value.to_string()).map_err(sqlx::Error::Encode)?;
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_driver_from_url() {
        assert_eq!(Drivers::from_url("postgres://localhost/shop"), Drivers::Postgres);
        assert_eq!(Drivers::from_url("postgresql://localhost/shop"), Drivers::Postgres);
        assert_eq!(Drivers::from_url("mysql://root@localhost/shop"), Drivers::MySQL);
        assert_eq!(Drivers::from_url("sqlite::memory:"), Drivers::SQLite);
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(Drivers::SQLite.quote("order"), "\"order\"");
        assert_eq!(Drivers::MySQL.quote("order"), "`order`");
        assert_eq!(Drivers::Postgres.quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn text_encoded_types_are_cast() {
        let price = SqlType::Decimal { max_digits: 10, decimal_places: 2 };
        assert_eq!(Drivers::Postgres.placeholder(3, &price), "CAST($3 AS DECIMAL(10, 2))");
        assert_eq!(Drivers::Postgres.placeholder(1, &SqlType::BigInt), "$1");
        assert_eq!(Drivers::MySQL.placeholder(1, &price), "?");

        assert_eq!(
            Drivers::SQLite.select_expr(Some("p"), "price", &price),
            "CAST(\"p\".\"price\" AS TEXT) AS \"price\""
        );
        assert_eq!(Drivers::MySQL.select_expr(None, "date_added", &SqlType::Timestamp), "CAST(`date_added` AS CHAR) AS `date_added`");
        assert_eq!(Drivers::SQLite.select_expr(None, "id", &SqlType::BigInt), "\"id\"");
    }
}
