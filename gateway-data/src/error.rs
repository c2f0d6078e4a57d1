/// Errors that can occur in the data layer.
///
/// `Transient` covers connection loss / interface errors the usage pipeline
/// treats as retryable; `Constraint` covers unique/foreign-key violations,
/// which are terminal for the calling transaction.
#[derive(Debug)]
pub enum DataError {
    NotFound(String),
    Transient(Box<dyn std::error::Error + Send + Sync>),
    Constraint(String),
    Database(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    /// Construct a `Transient` variant from any error type.
    pub fn transient(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Transient(Box::new(err))
    }

    /// True for errors the usage pipeline should treat as retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DataError::Transient(_))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "not found: {msg}"),
            DataError::Transient(err) => write!(f, "transient database error: {err}"),
            DataError::Constraint(msg) => write!(f, "constraint violation: {msg}"),
            DataError::Database(err) => write!(f, "database error: {err}"),
            DataError::Other(msg) => write!(f, "data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) | DataError::Transient(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<DataError> for gateway_core::AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => gateway_core::AppError::NotFound(msg),
            DataError::Constraint(msg) => gateway_core::AppError::BadRequest(msg),
            DataError::Transient(e) => gateway_core::AppError::Internal(e.to_string()),
            DataError::Database(e) => gateway_core::AppError::Internal(e.to_string()),
            DataError::Other(msg) => gateway_core::AppError::Internal(msg),
        }
    }
}
