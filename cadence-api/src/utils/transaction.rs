//! Transaction scope
//!
//! Wraps a pool transaction so multi-step flows (organization registration)
//! commit or roll back as one unit. Dropping an unfinished scope rolls the
//! transaction back. Acquisition wait and held time are logged the same way
//! for every caller.

use cadence_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;

pub struct TransactionScope {
    tx: Option<Transaction<'static, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl TransactionScope {
    /// Begin a transaction on the pool, logging slow acquisition
    pub async fn begin(pool: &SqlitePool, caller: &'static str) -> Result<Self> {
        let start = Instant::now();
        tracing::debug!(caller, "Connection acquisition requested");

        let tx = pool.begin().await?;

        let wait_ms = start.elapsed().as_millis();
        if wait_ms > 1000 {
            tracing::warn!(
                caller,
                wait_ms,
                "SLOW CONNECTION ACQUISITION - Pool may be saturated"
            );
        } else {
            tracing::debug!(caller, wait_ms, "Connection acquired");
        }

        Ok(Self {
            tx: Some(tx),
            caller,
            acquired_at: Instant::now(),
        })
    }

    /// Connection every repository call inside the scope goes through
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        let caller = self.caller;
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already finished", caller)))
    }

    pub async fn commit(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.commit().await?;
        self.log_release("commit");
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.rollback().await?;
        self.log_release("rollback");
        Ok(())
    }

    fn take(&mut self) -> Result<Transaction<'static, Sqlite>> {
        self.tx
            .take()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already finished", self.caller)))
    }

    fn log_release(&self, how: &'static str) {
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms,
                how,
                "LONG TRANSACTION - Connection held for extended period"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms, how, "Connection released");
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        // sqlx rolls the inner transaction back when it is dropped
        if self.tx.is_some() {
            tracing::warn!(
                caller = self.caller,
                held_ms = self.acquired_at.elapsed().as_millis(),
                "Transaction dropped without commit, rolling back"
            );
        }
    }
}
