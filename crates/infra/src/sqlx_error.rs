//! SQLx error mapping.
//!
//! Raw driver messages are logged server-side only; the returned domain error
//! carries just the failing operation name, which is all clients ever see.

use memberhub_core::DomainError;

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres foreign-key-violation SQLSTATE.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Map a sqlx error raised by `operation` into the domain taxonomy.
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    tracing::error!(operation, error = %err, "database operation failed");

    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => DomainError::UniqueConstraint {
                field: db_err
                    .constraint()
                    .unwrap_or("unknown")
                    .to_string(),
                value: String::new(),
            },
            Some(FOREIGN_KEY_VIOLATION) => {
                DomainError::validation(format!("{operation}: referenced row does not exist"))
            }
            _ => DomainError::Database(operation.to_string()),
        },
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            DomainError::Connection(operation.to_string())
        }
        _ => DomainError::Database(operation.to_string()),
    }
}

/// Like [`map_sqlx_error`] but for transaction begin/commit/rollback.
pub fn map_tx_error(operation: &str, err: sqlx::Error) -> DomainError {
    tracing::error!(operation, error = %err, "transaction boundary failed");
    DomainError::Transaction(operation.to_string())
}

/// True if the error is a Postgres unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == UNIQUE_VIOLATION;
        }
    }
    false
}
