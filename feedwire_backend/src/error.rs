use thiserror::Error;

/// Failures surfaced by the feed core.
///
/// A long-poll deadline is deliberately absent: it is a normal outcome of a
/// wait, see [`crate::feed::WaitOutcome`].
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("service unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;

impl From<anyhow::Error> for FeedError {
    /// Storage closures return `anyhow::Error`; a `FeedError` raised inside
    /// one is recovered as-is, anything else is a storage failure.
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<FeedError>() {
            Ok(feed_err) => feed_err,
            Err(err) => FeedError::Unavailable(err),
        }
    }
}

impl FeedError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        FeedError::InvalidArgument(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        FeedError::NotFound(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_errors_survive_an_anyhow_round_trip() {
        let wrapped: anyhow::Error = FeedError::DataIntegrity("post 7 has no author".into()).into();
        match FeedError::from(wrapped) {
            FeedError::DataIntegrity(msg) => assert_eq!(msg, "post 7 has no author"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn foreign_errors_become_unavailable() {
        let err = FeedError::from(anyhow::anyhow!("disk I/O error"));
        assert!(matches!(err, FeedError::Unavailable(_)));
    }
}
