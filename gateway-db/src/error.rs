use gateway_data::DataError;

/// Extension trait for converting `sqlx::Error` into `DataError`.
///
/// Connection-level failures (pool timeout, broken pipe, protocol errors)
/// map to `Transient` so the usage pipeline can distinguish retryable
/// failures from constraint violations.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match &self {
            sqlx::Error::RowNotFound => DataError::NotFound("row not found".into()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DataError::Constraint(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DataError::Constraint(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DataError::transient(self)
            }
            _ => DataError::database(self),
        }
    }
}

pub type SqlxResult<T> = Result<T, DataError>;
