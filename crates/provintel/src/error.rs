use provintel_cache::CacheError;
use provintel_fetch::FetchError;
use provintel_select::SelectError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no provider data available")]
    NoProviderData,

    #[error("config error: {0}")]
    Config(String),

    #[error("client setup failed: {0}")]
    Client(#[from] FetchError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SelectError> for ServiceError {
    fn from(e: SelectError) -> Self {
        match e {
            SelectError::NoProviderData => ServiceError::NoProviderData,
        }
    }
}
