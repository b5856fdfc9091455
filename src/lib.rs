//! snitch-operator: Dead Man's Snitch integration for Hive clusters
//!
//! Watches Hive ClusterDeployments and, for every installed managed cluster,
//! provisions a Dead Man's Snitch and delivers its check-in URL to the cluster
//! through a SyncSet. The snitch is removed again when the cluster is deleted
//! or opts out of alerting.

pub mod config;
pub mod controller;
pub mod crd;
pub mod dms;
pub mod error;
pub mod store;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
