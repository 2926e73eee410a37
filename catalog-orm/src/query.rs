//! # Query Builder
//!
//! Typed CRUD for models. Every terminal operation builds one SQL statement,
//! binds its values through the connection's driver and maps rows back into
//! the model with [`Model::from_row`].

use std::marker::PhantomData;

use chrono::Utc;
use sqlx::{Row, any::AnyArguments};

use crate::{
    database::{Connection, Drivers},
    model::ColumnInfo,
    value::{ColumnValue, Value},
    Error, Model,
};

/// Comparison operators for filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl Op {
    fn as_sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
struct Filter {
    column: String,
    op: Op,
    value: Value,
}

/// Builds and runs queries against the table of `T`.
pub struct QueryBuilder<T, C> {
    conn: C,
    driver: Drivers,
    table: &'static str,
    columns: Vec<ColumnInfo>,
    filters: Vec<Filter>,
    orders: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    _model: PhantomData<fn() -> T>,
}

impl<T, C> QueryBuilder<T, C>
where
    T: Model,
    C: Connection,
{
    pub fn new(conn: C) -> Self {
        let driver = conn.driver();
        Self {
            conn,
            driver,
            table: T::table_name(),
            columns: T::columns(),
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            _model: PhantomData,
        }
    }

    // ------------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------------

    /// Adds a `column <op> value` condition. Conditions are joined with `AND`.
    pub fn filter<V: ColumnValue>(mut self, column: &str, op: Op, value: V) -> Self {
        self.filters.push(Filter { column: column.to_string(), op, value: value.to_value() });
        self
    }

    pub fn equals<V: ColumnValue>(self, column: &str, value: V) -> Self {
        self.filter(column, Op::Eq, value)
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.orders.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Fetches every matching row.
    pub async fn scan(self) -> Result<Vec<T>, Error> {
        let mut args = AnyArguments::default();
        let mut sql = format!("SELECT {} FROM {}", self.select_list(None), self.driver.quote(self.table));
        sql.push_str(&self.where_clause(&mut args, &mut 0)?);
        sql.push_str(&self.order_clause()?);
        sql.push_str(&self.limit_clause());

        let rows = self.conn.fetch_all(&sql, args).await?;
        Ok(rows.iter().map(T::from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Fetches the first matching row, failing with [`Error::NotFound`] when there is none.
    pub async fn first(self) -> Result<T, Error> {
        let table = self.table;
        self.limit(1).scan().await?.into_iter().next().ok_or(Error::NotFound(table))
    }

    /// Fetches a row by primary key.
    pub async fn find<V: ColumnValue>(self, key: V) -> Result<T, Error> {
        let pk = self.primary_key()?;
        self.filter(pk.name, Op::Eq, key).first().await
    }

    pub async fn count(self) -> Result<i64, Error> {
        let mut args = AnyArguments::default();
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.driver.quote(self.table));
        sql.push_str(&self.where_clause(&mut args, &mut 0)?);

        let row = self.conn.fetch_one(&sql, args).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    /// Inserts a row and returns it as stored.
    ///
    /// Auto-increment keys are left to the database; `create_time` and
    /// `update_time` columns are stamped with the current time.
    pub async fn insert(self, model: &T) -> Result<T, Error> {
        let pk = self.primary_key()?;
        let key = self.insert_row(model, &pk).await?;
        self.reload(&pk, key).await
    }

    /// Inserts several rows, returning them as stored.
    pub async fn batch_insert(self, models: &[T]) -> Result<Vec<T>, Error> {
        let pk = self.primary_key()?;
        let mut stored = Vec::with_capacity(models.len());
        for model in models {
            let key = self.insert_row(model, &pk).await?;
            stored.push(self.reload(&pk, key).await?);
        }
        Ok(stored)
    }

    /// Writes every column of `model` to the row with the same primary key.
    ///
    /// The primary key and `create_time` columns are never written.
    pub async fn update(self, model: &T) -> Result<T, Error> {
        let pk = self.primary_key()?;
        let values = model.to_values();
        let now = Utc::now();

        let mut assignments = Vec::new();
        let mut args = AnyArguments::default();
        for column in &self.columns {
            if column.is_primary_key || column.create_time {
                continue;
            }
            let value = if column.update_time { Value::Timestamp(now) } else { value_of(&values, column.name) };
            column.validate(&value)?;
            assignments.push(format!(
                "{} = {}",
                self.driver.quote(column.name),
                self.driver.placeholder(assignments.len() + 1, &column.sql_type)
            ));
            value.bind(self.driver, &mut args)?;
        }

        let key = value_of(&values, pk.name);
        if assignments.is_empty() {
            return self.reload(&pk, key).await;
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.driver.quote(self.table),
            assignments.join(", "),
            self.driver.quote(pk.name),
            self.driver.placeholder(assignments.len() + 1, &pk.sql_type)
        );
        key.clone().bind(self.driver, &mut args)?;
        self.conn.execute(&sql, args).await?;

        self.reload(&pk, key).await
    }

    /// Deletes every matching row and returns how many were removed.
    ///
    /// Without filters this empties the table.
    pub async fn delete(self) -> Result<u64, Error> {
        let mut args = AnyArguments::default();
        let mut sql = format!("DELETE FROM {}", self.driver.quote(self.table));
        sql.push_str(&self.where_clause(&mut args, &mut 0)?);

        let result = self.conn.execute(&sql, args).await?;
        Ok(result.rows_affected())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn primary_key(&self) -> Result<ColumnInfo, Error> {
        self.columns.iter().find(|c| c.is_primary_key).cloned().ok_or(Error::MissingPrimaryKey(self.table))
    }

    fn column(&self, name: &str) -> Result<&ColumnInfo, Error> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::UnknownColumn { table: self.table, column: name.to_string() })
    }

    fn select_list(&self, qualifier: Option<&str>) -> String {
        select_list(self.driver, qualifier, &self.columns)
    }

    fn where_clause(&self, args: &mut AnyArguments<'_>, bound: &mut usize) -> Result<String, Error> {
        if self.filters.is_empty() {
            return Ok(String::new());
        }
        let mut conditions = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            let column = self.column(&filter.column)?;
            *bound += 1;
            conditions.push(format!(
                "{} {} {}",
                self.driver.quote(column.name),
                filter.op.as_sql(),
                self.driver.placeholder(*bound, &column.sql_type)
            ));
            filter.value.clone().bind(self.driver, args)?;
        }
        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }

    fn order_clause(&self) -> Result<String, Error> {
        if self.orders.is_empty() {
            return Ok(String::new());
        }
        let mut terms = Vec::with_capacity(self.orders.len());
        for (name, order) in &self.orders {
            let column = self.column(name)?;
            let direction = match order {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            terms.push(format!("{} {}", self.driver.quote(column.name), direction));
        }
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }

    fn limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
            (Some(limit), None) => format!(" LIMIT {}", limit),
            (None, Some(offset)) => match self.driver {
                Drivers::Postgres => format!(" OFFSET {}", offset),
                Drivers::SQLite => format!(" LIMIT -1 OFFSET {}", offset),
                Drivers::MySQL => format!(" LIMIT 18446744073709551615 OFFSET {}", offset),
            },
            (None, None) => String::new(),
        }
    }

    /// Runs the INSERT and returns the primary key of the new row.
    async fn insert_row(&self, model: &T, pk: &ColumnInfo) -> Result<Value, Error> {
        let values = model.to_values();
        let now = Utc::now();

        let mut names = Vec::new();
        let mut placeholders = Vec::new();
        let mut args = AnyArguments::default();
        let mut key = Value::Null;

        for column in &self.columns {
            if column.auto_increment {
                continue;
            }
            let value = if column.create_time || column.update_time {
                Value::Timestamp(now)
            } else {
                value_of(&values, column.name)
            };
            column.validate(&value)?;
            if column.is_primary_key {
                key = value.clone();
            }
            names.push(self.driver.quote(column.name));
            placeholders.push(self.driver.placeholder(placeholders.len() + 1, &column.sql_type));
            value.bind(self.driver, &mut args)?;
        }

        let table = self.driver.quote(self.table);
        let mut sql = match (names.is_empty(), self.driver) {
            (true, Drivers::MySQL) => format!("INSERT INTO {} () VALUES ()", table),
            (true, _) => format!("INSERT INTO {} DEFAULT VALUES", table),
            (false, _) => format!("INSERT INTO {} ({}) VALUES ({})", table, names.join(", "), placeholders.join(", ")),
        };

        if !pk.auto_increment {
            self.conn.execute(&sql, args).await?;
            return Ok(key);
        }

        // the SQLite `Any` driver never reports a last insert id
        let id = match self.driver {
            Drivers::Postgres | Drivers::SQLite => {
                sql.push_str(&format!(" RETURNING {}", self.driver.quote(pk.name)));
                let row = self.conn.fetch_one(&sql, args).await?;
                row.try_get::<i64, _>(0)?
            }
            _ => {
                let result = self.conn.execute(&sql, args).await?;
                result.last_insert_id().ok_or(Error::MissingInsertId(self.table))?
            }
        };
        Ok(Value::Int(id))
    }

    async fn reload(&self, pk: &ColumnInfo, key: Value) -> Result<T, Error> {
        let mut query = QueryBuilder::<T, C>::new(self.conn.clone());
        query.filters.push(Filter { column: pk.name.to_string(), op: Op::Eq, value: key });
        query.first().await
    }
}

/// Comma-separated select expressions for `columns`, optionally qualified by a table name.
pub(crate) fn select_list(driver: Drivers, qualifier: Option<&str>, columns: &[ColumnInfo]) -> String {
    columns
        .iter()
        .map(|c| driver.select_expr(qualifier, c.name, &c.sql_type))
        .collect::<Vec<_>>()
        .join(", ")
}

fn value_of(values: &[(&'static str, Value)], column: &str) -> Value {
    values.iter().find(|(name, _)| *name == column).map(|(_, v)| v.clone()).unwrap_or(Value::Null)
}
