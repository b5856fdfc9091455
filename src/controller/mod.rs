//! Controller module for ClusterDeployment reconciliation
//! This module contains the main controller loop, the reconciliation
//! decisions, and finalizer handling for monitored clusters.

pub mod engine;
mod finalizers;
#[cfg(feature = "metrics")]
pub mod metrics;
mod reconciler;

pub use engine::{decide, monitored_clusters, Decision, Footprint, MonitoredCluster, MonitoringState};
pub use finalizers::DMS_FINALIZER;
pub use reconciler::{reconcile_cluster, run_controller, ControllerState, CONTROLLER_NAME};
