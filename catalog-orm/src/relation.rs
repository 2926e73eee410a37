//! # Many-to-many Relations
//!
//! Manages the rows of a join table for one source row at a time.

use sqlx::{Row, any::AnyArguments};

use crate::{
    database::{Connection, Drivers},
    model::{ManyToManyInfo, SqlType},
    query::select_list,
    value::Value,
    Error, Model,
};

/// Handle on one many-to-many relation, bound to a connection.
///
/// ```rust,ignore
/// let features = db.many_to_many::<Product>("features")?;
/// features.add(product.id, &[color.id, size.id]).await?;
/// let attached: Vec<Feature> = features.fetch(product.id).await?;
/// ```
pub struct ManyToMany<C> {
    conn: C,
    driver: Drivers,
    info: ManyToManyInfo,
}

impl<C: Connection> ManyToMany<C> {
    /// Looks up the relation named `field` on `T`.
    pub fn new<T: Model>(conn: C, field: &str) -> Result<Self, Error> {
        let info = T::many_to_many()
            .into_iter()
            .find(|r| r.field == field)
            .ok_or_else(|| Error::UnknownRelation { model: T::model_name(), field: field.to_string() })?;
        let driver = conn.driver();
        Ok(Self { conn, driver, info })
    }

    pub fn info(&self) -> &ManyToManyInfo {
        &self.info
    }

    /// Keys of the target rows linked to `source`, ascending.
    pub async fn ids(&self, source: i64) -> Result<Vec<i64>, Error> {
        let q = |ident: &str| self.driver.quote(ident);
        let sql = format!(
            "SELECT {target} FROM {join} WHERE {source} = {ph} ORDER BY {target}",
            target = q(&self.info.target_column),
            join = q(&self.info.join_table),
            source = q(&self.info.source_column),
            ph = self.driver.placeholder(1, &SqlType::BigInt),
        );
        let args = bind_all(self.driver, &[source])?;
        let rows = self.conn.fetch_all(&sql, args).await?;
        Ok(rows.iter().map(|row| row.try_get::<i64, _>(0)).collect::<Result<Vec<_>, _>>()?)
    }

    /// Loads the target rows linked to `source`, ordered by their key.
    pub async fn fetch<U: Model>(&self, source: i64) -> Result<Vec<U>, Error> {
        if U::table_name() != self.info.target_table {
            return Err(Error::RelationMismatch {
                field: self.info.field,
                expected: self.info.target_table,
                found: U::table_name(),
            });
        }
        let q = |ident: &str| self.driver.quote(ident);
        let sql = format!(
            "SELECT {columns} FROM {target} INNER JOIN {join} ON {join}.{target_column} = {target}.{target_key} \
             WHERE {join}.{source_column} = {ph} ORDER BY {target}.{target_key}",
            columns = select_list(self.driver, Some(self.info.target_table), &U::columns()),
            target = q(self.info.target_table),
            join = q(&self.info.join_table),
            target_column = q(&self.info.target_column),
            target_key = q(self.info.target_key),
            source_column = q(&self.info.source_column),
            ph = self.driver.placeholder(1, &SqlType::BigInt),
        );
        let args = bind_all(self.driver, &[source])?;
        let rows = self.conn.fetch_all(&sql, args).await?;
        Ok(rows.iter().map(U::from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Links `targets` to `source`. Pairs that already exist are left alone.
    ///
    /// Returns the number of links created.
    pub async fn add(&self, source: i64, targets: &[i64]) -> Result<u64, Error> {
        let existing = self.ids(source).await?;
        let mut missing: Vec<i64> = targets.iter().copied().filter(|t| !existing.contains(t)).collect();
        missing.sort_unstable();
        missing.dedup();

        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            self.driver.quote(&self.info.join_table),
            self.driver.quote(&self.info.source_column),
            self.driver.quote(&self.info.target_column),
            self.driver.placeholder(1, &SqlType::BigInt),
            self.driver.placeholder(2, &SqlType::BigInt),
        );
        let mut created = 0;
        for target in missing {
            let args = bind_all(self.driver, &[source, target])?;
            created += self.conn.execute(&sql, args).await?.rows_affected();
        }
        Ok(created)
    }

    /// Unlinks `targets` from `source`. Returns the number of links removed.
    pub async fn remove(&self, source: i64, targets: &[i64]) -> Result<u64, Error> {
        if targets.is_empty() {
            return Ok(0);
        }
        let placeholders = (0..targets.len())
            .map(|i| self.driver.placeholder(i + 2, &SqlType::BigInt))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DELETE FROM {} WHERE {} = {} AND {} IN ({})",
            self.driver.quote(&self.info.join_table),
            self.driver.quote(&self.info.source_column),
            self.driver.placeholder(1, &SqlType::BigInt),
            self.driver.quote(&self.info.target_column),
            placeholders,
        );
        let mut keys = Vec::with_capacity(targets.len() + 1);
        keys.push(source);
        keys.extend_from_slice(targets);
        let args = bind_all(self.driver, &keys)?;
        Ok(self.conn.execute(&sql, args).await?.rows_affected())
    }

    /// Unlinks every target from `source`.
    pub async fn clear(&self, source: i64) -> Result<u64, Error> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.driver.quote(&self.info.join_table),
            self.driver.quote(&self.info.source_column),
            self.driver.placeholder(1, &SqlType::BigInt),
        );
        let args = bind_all(self.driver, &[source])?;
        Ok(self.conn.execute(&sql, args).await?.rows_affected())
    }

    /// Makes `targets` the exact set linked to `source`.
    pub async fn set(&self, source: i64, targets: &[i64]) -> Result<(), Error> {
        let existing = self.ids(source).await?;
        let stale: Vec<i64> = existing.iter().copied().filter(|id| !targets.contains(id)).collect();
        self.remove(source, &stale).await?;
        self.add(source, targets).await?;
        Ok(())
    }
}

fn bind_all(driver: Drivers, keys: &[i64]) -> Result<AnyArguments<'static>, Error> {
    let mut args = AnyArguments::default();
    for key in keys {
        Value::Int(*key).bind(driver, &mut args)?;
    }
    Ok(args)
}
