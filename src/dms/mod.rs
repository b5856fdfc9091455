//! Dead Man's Snitch monitor client
//!
//! The reconciler talks to the monitor service only through [`MonitorClient`],
//! so tests can substitute a mock for the HTTP implementation.

mod client;
mod error;
mod types;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

pub use client::{DmsClient, DEFAULT_BASE_URL};
pub use error::{DmsError, Result};
pub use types::{
    NewSnitch, Snitch, SnitchSchedule, SnitchStatus, DEFAULT_ALERT_TYPE, DEFAULT_INTERVAL,
};

/// Operations the operator needs from the monitor service
///
/// Every call is a single bounded request; timeouts are enforced by the
/// implementation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MonitorClient: Send + Sync {
    /// Create a snitch
    async fn create(&self, snitch: &NewSnitch) -> Result<Snitch>;

    /// Delete a snitch by token. Returns `false` if it was already gone.
    async fn delete(&self, token: &str) -> Result<bool>;

    /// All snitches whose name equals `name`; empty when there are none
    async fn find_snitches_by_name(&self, name: &str) -> Result<Vec<Snitch>>;

    /// Check in against the snitch's check-in URL
    async fn check_in(&self, snitch: &Snitch) -> Result<()>;
}
