use futures::future::BoxFuture;
use sqlx::any::{AnyArguments, AnyQueryResult, AnyRow};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    database::{Connection, Drivers},
    relation::ManyToMany,
    Error, Model, QueryBuilder,
};

/// A wrapper around a SQLx transaction.
///
/// Provides a way to execute multiple queries atomically. If any query fails,
/// the transaction can be rolled back. If all succeed, it can be committed.
///
/// Clones share the same underlying transaction, so a handle can be passed to
/// query builders and migrations while the owner keeps the right to commit.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub(crate) tx: Arc<Mutex<Option<sqlx::Transaction<'static, sqlx::Any>>>>,
    pub(crate) driver: Drivers,
}

impl Transaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, sqlx::Any>, driver: Drivers) -> Self {
        Self { tx: Arc::new(Mutex::new(Some(tx))), driver }
    }

    /// Starts building a query within this transaction.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let tx = db.begin().await?;
    ///
    /// // These operations are part of the transaction
    /// tx.model::<Category>().insert(&category).await?;
    /// tx.model::<Brand>().insert(&brand).await?;
    ///
    /// tx.commit().await?;
    /// ```
    pub fn model<T: Model>(&self) -> QueryBuilder<T, Self> {
        QueryBuilder::new(self.clone())
    }

    /// Accesses a many-to-many join table within this transaction.
    pub fn many_to_many<T: Model>(&self, field: &str) -> Result<ManyToMany<Self>, Error> {
        ManyToMany::new::<T>(self.clone(), field)
    }

    /// Commits the transaction.
    ///
    /// Persists all changes made during the transaction to the database.
    pub async fn commit(self) -> Result<(), Error> {
        let tx = self.tx.lock().await.take().ok_or(Error::TransactionFinished)?;
        tx.commit().await?;
        Ok(())
    }

    /// Rolls back the transaction.
    ///
    /// Reverts all changes made during the transaction. This happens automatically
    /// when the last handle is dropped without committing.
    pub async fn rollback(self) -> Result<(), Error> {
        let tx = self.tx.lock().await.take().ok_or(Error::TransactionFinished)?;
        tx.rollback().await?;
        Ok(())
    }
}

fn finished() -> sqlx::Error {
    sqlx::Error::Protocol("transaction has already been committed or rolled back".to_string())
}

impl Connection for Transaction {
    fn driver(&self) -> Drivers {
        self.driver
    }
    fn execute<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<AnyQueryResult, sqlx::Error>> {
        log::debug!("{}", sql);
        Box::pin(async move {
            let mut guard = self.tx.lock().await;
            let tx = guard.as_mut().ok_or_else(finished)?;
            sqlx::query_with(sql, args).execute(&mut **tx).await
        })
    }
    fn fetch_all<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<Vec<AnyRow>, sqlx::Error>> {
        log::debug!("{}", sql);
        Box::pin(async move {
            let mut guard = self.tx.lock().await;
            let tx = guard.as_mut().ok_or_else(finished)?;
            sqlx::query_with(sql, args).fetch_all(&mut **tx).await
        })
    }
    fn fetch_one<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<AnyRow, sqlx::Error>> {
        log::debug!("{}", sql);
        Box::pin(async move {
            let mut guard = self.tx.lock().await;
            let tx = guard.as_mut().ok_or_else(finished)?;
            sqlx::query_with(sql, args).fetch_one(&mut **tx).await
        })
    }
    fn fetch_optional<'a, 'q: 'a>(&'a self, sql: &'q str, args: AnyArguments<'q>) -> BoxFuture<'a, Result<Option<AnyRow>, sqlx::Error>> {
        log::debug!("{}", sql);
        Box::pin(async move {
            let mut guard = self.tx.lock().await;
            let tx = guard.as_mut().ok_or_else(finished)?;
            sqlx::query_with(sql, args).fetch_optional(&mut **tx).await
        })
    }
}
