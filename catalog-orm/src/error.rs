use thiserror::Error;

/// Errors produced by catalog-orm.
#[derive(Debug, Error)]
pub enum Error {
    /// An error reported by sqlx or the database engine (constraint violations included).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A value was rejected before reaching the database.
    #[error("invalid value for `{column}`: {message}")]
    Validation { column: &'static str, message: String },

    #[error("no `{0}` row matched the query")]
    NotFound(&'static str),

    #[error("unknown column `{column}` on `{table}`")]
    UnknownColumn { table: &'static str, column: String },

    #[error("`{model}` has no many-to-many relation named `{field}`")]
    UnknownRelation { model: &'static str, field: String },

    /// A relation was asked to load rows of a table it does not point to.
    #[error("relation `{field}` targets `{expected}`, not `{found}`")]
    RelationMismatch { field: &'static str, expected: &'static str, found: &'static str },

    #[error("`{0}` has no primary key")]
    MissingPrimaryKey(&'static str),

    #[error("the database did not report the generated key for `{0}`")]
    MissingInsertId(&'static str),

    #[error("transaction has already been committed or rolled back")]
    TransactionFinished,

    #[error("migration `{name}` failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// The tracking table records a migration the migrator does not know about.
    #[error("applied migration `{0}` is not registered")]
    UnknownMigration(String),
}

impl Error {
    /// Returns `true` when the database rejected a row because a referenced row is missing.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(e)) => e.is_foreign_key_violation(),
            Error::Migration { source, .. } => source.is_foreign_key_violation(),
            _ => false,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}
