//! # Model Metadata
//!
//! Describes tables the way the database sees them: column types, keys,
//! constraints and many-to-many join tables. The `#[derive(Model)]` macro
//! generates all of this from a struct definition.

use rust_decimal::Decimal;
use sqlx::any::AnyRow;

use crate::{database::Drivers, value::Value, Error};

// ============================================================================
// SQL Types
// ============================================================================

/// Column types supported by the schema generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    BigInt,
    Boolean,
    Double,
    /// Bounded string, length counted in characters.
    Varchar(usize),
    Text,
    /// Fixed-point number with `max_digits` in total, `decimal_places` of them after the point.
    Decimal { max_digits: u32, decimal_places: u32 },
    Timestamp,
}

impl SqlType {
    /// Renders the type name used in DDL for the given driver.
    pub fn render(&self, driver: Drivers) -> String {
        match (self, driver) {
            (SqlType::Integer, _) => "INTEGER".to_string(),
            (SqlType::BigInt, _) => "BIGINT".to_string(),
            // sqlx's `Any` driver cannot decode SQLite's BOOLEAN declared type
            (SqlType::Boolean, Drivers::SQLite) => "INTEGER".to_string(),
            (SqlType::Boolean, _) => "BOOLEAN".to_string(),
            (SqlType::Double, Drivers::Postgres) => "DOUBLE PRECISION".to_string(),
            (SqlType::Double, Drivers::MySQL) => "DOUBLE".to_string(),
            (SqlType::Double, Drivers::SQLite) => "REAL".to_string(),
            (SqlType::Varchar(len), _) => format!("VARCHAR({})", len),
            (SqlType::Text, Drivers::MySQL) => "LONGTEXT".to_string(),
            (SqlType::Text, _) => "TEXT".to_string(),
            (SqlType::Decimal { max_digits, decimal_places }, _) => {
                format!("DECIMAL({}, {})", max_digits, decimal_places)
            }
            (SqlType::Timestamp, Drivers::Postgres) => "TIMESTAMPTZ".to_string(),
            (SqlType::Timestamp, Drivers::MySQL) => "DATETIME(6)".to_string(),
            (SqlType::Timestamp, Drivers::SQLite) => "TIMESTAMP".to_string(),
        }
    }

    /// Types that are exchanged with the database as text and parsed on the Rust side.
    pub fn is_text_encoded(&self) -> bool {
        matches!(self, SqlType::Decimal { .. } | SqlType::Timestamp)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, SqlType::Varchar(_) | SqlType::Text)
    }
}

// ============================================================================
// Foreign Keys
// ============================================================================

/// Referential action taken when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    Restrict,
    SetNull,
    NoAction,
}

impl OnDelete {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
            OnDelete::NoAction => "NO ACTION",
        }
    }

    /// Parses the rule names reported by database introspection (`CASCADE`, `SET NULL`, ...).
    pub fn from_rule(rule: &str) -> Option<Self> {
        match rule.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => Some(OnDelete::Cascade),
            "RESTRICT" => Some(OnDelete::Restrict),
            "SET NULL" => Some(OnDelete::SetNull),
            "NO ACTION" => Some(OnDelete::NoAction),
            _ => None,
        }
    }
}

/// A column's reference to another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

// ============================================================================
// Column Metadata
// ============================================================================

/// Metadata information about a database column.
///
/// This structure is used to generate table schemas, bind values and validate
/// them before they are written. It is usually populated by `#[derive(Model)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// The column name in the database.
    pub name: &'static str,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
    /// Whether the database generates the value on insert.
    pub auto_increment: bool,
    /// Whether this column allows NULL values.
    pub is_nullable: bool,
    /// Whether an empty string is an acceptable value.
    pub blank: bool,
    /// Literal SQL used as the column default.
    pub default: Option<&'static str>,
    /// Populated with the current time when the row is inserted, never updated.
    pub create_time: bool,
    /// Populated with the current time on every insert and update.
    pub update_time: bool,
    pub unique: bool,
    pub index: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnInfo {
    /// Checks a value against the column's declared constraints.
    pub fn validate(&self, value: &Value) -> Result<(), Error> {
        let fail = |message: String| Err(Error::Validation { column: self.name, message });

        match value {
            Value::Null if !self.is_nullable && !self.auto_increment => {
                fail("this field cannot be null".to_string())
            }
            Value::Text(text) if self.sql_type.is_textual() => {
                if text.is_empty() && !self.blank {
                    return fail("this field cannot be blank".to_string());
                }
                if let SqlType::Varchar(max) = self.sql_type {
                    let len = text.chars().count();
                    if len > max {
                        return fail(format!(
                            "ensure this value has at most {} characters (it has {})",
                            max, len
                        ));
                    }
                }
                Ok(())
            }
            Value::Decimal(number) => match self.sql_type {
                SqlType::Decimal { max_digits, decimal_places } => {
                    validate_decimal(*number, max_digits, decimal_places).or_else(fail)
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

/// Digit checks for fixed-point columns.
fn validate_decimal(number: Decimal, max_digits: u32, decimal_places: u32) -> Result<(), String> {
    let normalized = number.normalize();
    let decimals = normalized.scale();
    let digits = normalized.mantissa().unsigned_abs().to_string().len() as u32;
    let digits = digits.max(decimals);
    let whole_digits = digits - decimals;

    if digits > max_digits {
        return Err(format!("ensure that there are no more than {} digits in total", max_digits));
    }
    if decimals > decimal_places {
        return Err(format!("ensure that there are no more than {} decimal places", decimal_places));
    }
    if whole_digits > max_digits - decimal_places {
        return Err(format!(
            "ensure that there are no more than {} digits before the decimal point",
            max_digits - decimal_places
        ));
    }
    Ok(())
}

// ============================================================================
// Many-to-many Relations
// ============================================================================

/// Describes the join table behind a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManyToManyInfo {
    /// Relation name on the source model (e.g. `features`).
    pub field: &'static str,
    pub join_table: String,
    pub source_table: &'static str,
    /// Join table column referencing the source row.
    pub source_column: String,
    /// Primary key of the source table.
    pub source_key: &'static str,
    pub target_table: &'static str,
    pub target_column: String,
    pub target_key: &'static str,
}

impl ManyToManyInfo {
    /// Builds the relation from the metadata of both models.
    ///
    /// The join table is named `<source table>_<field>`, its columns `<model>_id`.
    /// A model related to itself gets `from_<model>_id` and `to_<model>_id`.
    pub fn new<S: Model, T: Model>(field: &'static str) -> Self {
        let mut source_column = format!("{}_id", S::model_name());
        let mut target_column = format!("{}_id", T::model_name());
        if source_column == target_column {
            source_column = format!("from_{}", source_column);
            target_column = format!("to_{}", target_column);
        }

        Self {
            field,
            join_table: format!("{}_{}", S::table_name(), field),
            source_table: S::table_name(),
            source_column,
            source_key: primary_key_name::<S>(),
            target_table: T::table_name(),
            target_column,
            target_key: primary_key_name::<T>(),
        }
    }
}

fn primary_key_name<T: Model>() -> &'static str {
    T::primary_key().map(|c| c.name).unwrap_or("id")
}

// ============================================================================
// Model Trait
// ============================================================================

/// The core trait defining a database model (table).
///
/// This trait is typically implemented automatically via the `#[derive(Model)]` macro.
///
/// # Example
///
/// ```rust,ignore
/// use catalog_orm::Model;
///
/// #[derive(Model)]
/// #[orm(table = "shop_brand")]
/// struct Brand {
///     #[orm(primary_key, auto_increment)]
///     id: i64,
///     #[orm(size = 100)]
///     name: String,
/// }
/// ```
pub trait Model: Sized + Send + Sync + Unpin {
    /// Returns the table name associated with this model.
    fn table_name() -> &'static str;

    /// The struct name in snake_case, used to name join table columns.
    fn model_name() -> &'static str;

    /// Returns the list of column definitions for this model.
    fn columns() -> Vec<ColumnInfo>;

    /// Many-to-many relations owned by this model.
    fn many_to_many() -> Vec<ManyToManyInfo> {
        Vec::new()
    }

    /// Converts the model instance into column values, in column order.
    fn to_values(&self) -> Vec<(&'static str, Value)>;

    /// Builds the model from a row selected with the model's columns.
    fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error>;

    fn primary_key() -> Option<ColumnInfo> {
        Self::columns().into_iter().find(|c| c.is_primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(sql_type: SqlType) -> ColumnInfo {
        ColumnInfo {
            name: "name",
            sql_type,
            is_primary_key: false,
            auto_increment: false,
            is_nullable: false,
            blank: false,
            default: None,
            create_time: false,
            update_time: false,
            unique: false,
            index: false,
            foreign_key: None,
        }
    }

    #[test]
    fn varchar_counts_characters_not_bytes() {
        let col = column(SqlType::Varchar(3));
        assert!(col.validate(&Value::Text("ñññ".to_string())).is_ok());
        assert!(col.validate(&Value::Text("abcd".to_string())).is_err());
    }

    #[test]
    fn blank_strings_need_opt_in() {
        let mut col = column(SqlType::Text);
        assert!(col.validate(&Value::Text(String::new())).is_err());
        col.blank = true;
        assert!(col.validate(&Value::Text(String::new())).is_ok());
    }

    #[test]
    fn decimal_digit_limits() {
        let col = column(SqlType::Decimal { max_digits: 10, decimal_places: 2 });
        assert!(col.validate(&Value::Decimal(Decimal::new(1999, 2))).is_ok());
        assert!(col.validate(&Value::Decimal(Decimal::new(2000, 2))).is_ok());
        assert!(col.validate(&Value::Decimal(Decimal::new(99_999_999_99, 2))).is_ok());
        // three decimal places
        assert!(col.validate(&Value::Decimal(Decimal::new(1999, 3))).is_err());
        // nine integer digits
        assert!(col.validate(&Value::Decimal(Decimal::new(100_000_000, 0))).is_err());
    }

    #[test]
    fn null_only_where_allowed() {
        let mut col = column(SqlType::BigInt);
        assert!(col.validate(&Value::Null).is_err());
        col.is_nullable = true;
        assert!(col.validate(&Value::Null).is_ok());
    }

    #[test]
    fn delete_rules_round_trip_through_sql() {
        for rule in [OnDelete::Cascade, OnDelete::Restrict, OnDelete::SetNull, OnDelete::NoAction] {
            assert_eq!(OnDelete::from_rule(rule.as_sql()), Some(rule));
        }
        assert_eq!(OnDelete::from_rule("cascade"), Some(OnDelete::Cascade));
    }
}
