pub mod aggregator;
pub mod error;
pub mod health;
pub mod ledger;
pub mod status;
pub mod test_support;

pub use aggregator::{Aggregator, FanOutSettings};
pub use error::FetchError;
pub use health::health_score;
pub use ledger::{LedgerClient, RestLedgerClient};
pub use status::{decode_status, HttpStatusClient, StatusClient};
