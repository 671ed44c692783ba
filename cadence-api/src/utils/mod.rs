//! Utility modules for cadence-api

pub mod db_retry;
pub mod transaction;

pub use db_retry::retry_on_lock;
pub use transaction::TransactionScope;
