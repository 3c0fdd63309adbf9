use thiserror::Error;

/// Per-provider failures. These never fail a batch; they are recorded on the
/// provider's record as its error string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("ledger query failed: {0}")]
    LedgerQueryFailed(String),

    #[error("status query failed: {0}")]
    StatusQueryFailed(String),

    #[error("concurrency limit exceeded")]
    ConcurrencyLimitExceeded,

    #[error("batch deadline exceeded")]
    BatchDeadlineExceeded,

    #[error("provider task aborted: {0}")]
    TaskAborted(String),
}
