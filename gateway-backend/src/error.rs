use std::fmt;

/// Errors crossing the Backend Client boundary. The gateway binary maps
/// these onto the failure semantics in the external interface contract:
/// unreachable/deadline becomes a 500, everything else is surfaced as
/// detail on that 500 (model-not-found and scope errors are caught
/// earlier, before a client is ever constructed).
#[derive(Debug)]
pub enum BackendError {
    Unreachable(String),
    DeadlineExceeded,
    StreamAborted(String),
    DecoderFailure(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unreachable(msg) => write!(f, "backend unreachable: {msg}"),
            BackendError::DeadlineExceeded => write!(f, "backend deadline exceeded"),
            BackendError::StreamAborted(msg) => write!(f, "backend stream aborted: {msg}"),
            BackendError::DecoderFailure(msg) => write!(f, "backend decoder failure: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<tonic::transport::Error> for BackendError {
    fn from(err: tonic::transport::Error) -> Self {
        BackendError::Unreachable(err.to_string())
    }
}

impl From<tonic::Status> for BackendError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::DeadlineExceeded => BackendError::DeadlineExceeded,
            tonic::Code::Unavailable | tonic::Code::Unknown => {
                BackendError::Unreachable(status.message().to_string())
            }
            _ => BackendError::StreamAborted(status.message().to_string()),
        }
    }
}

impl From<BackendError> for gateway_core::AppError {
    fn from(err: BackendError) -> Self {
        gateway_core::AppError::Internal(err.to_string())
    }
}
