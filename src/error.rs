use thiserror::Error;
use tonic::Status;

/// Faults surfaced to RPC callers. Missing input and unmatched lookups are not
/// errors; they produce empty messages.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("metadata lookup failed: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for MetadataError {
    fn from(err: anyhow::Error) -> Self {
        let detail = format!("{err:#}");
        match err.downcast_ref::<sqlx::Error>() {
            Some(
                sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_),
            ) => Self::Unavailable(detail),
            _ => Self::Internal(detail),
        }
    }
}

impl From<MetadataError> for Status {
    fn from(err: MetadataError) -> Self {
        match &err {
            MetadataError::Unavailable(_) => Status::unavailable(err.to_string()),
            MetadataError::Internal(_) => Status::internal(err.to_string()),
        }
    }
}
