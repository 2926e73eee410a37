use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Orm(#[from] catalog_orm::Error),

    #[error("price cannot be negative (got {0})")]
    NegativePrice(rust_decimal::Decimal),

    #[error("stock cannot be negative (got {0})")]
    NegativeStock(i32),
}

impl CatalogError {
    /// Returns `true` when a referenced category, brand or feature does not exist.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, CatalogError::Orm(e) if e.is_foreign_key_violation())
    }

    pub fn is_validation(&self) -> bool {
        match self {
            CatalogError::Orm(e) => e.is_validation(),
            CatalogError::NegativePrice(_) | CatalogError::NegativeStock(_) => true,
        }
    }
}
