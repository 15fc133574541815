//! Crate-level error

use crate::catalog::CatalogError;
use crate::eval::EvalError;
use crate::storage::StoreError;

/// Every failure the crate reports, kept distinguishable by kind
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Catalog(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
