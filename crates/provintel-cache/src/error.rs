use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache sweeper task failed: {0}")]
    Sweeper(String),
}
