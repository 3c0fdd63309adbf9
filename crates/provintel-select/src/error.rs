use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectError {
    #[error("no provider data available")]
    NoProviderData,
}
