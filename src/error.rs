// Domain errors callers branch on. Everything else travels as anyhow::Error.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FinanceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid {kind} type: {value}")]
    InvalidType { kind: &'static str, value: String },
}

impl FinanceError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        FinanceError::NotFound { entity, id }
    }
}
