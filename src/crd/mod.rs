//! Custom Resource Definitions consumed by the operator
//!
//! Both resources are owned by Hive; the operator never installs them.

mod cluster_deployment;
pub mod sync_set;

pub use cluster_deployment::{
    ClusterDeployment, ClusterDeploymentSpec, ClusterDeploymentStatus, MANAGED_LABEL,
    NOALERTS_LABEL,
};
pub use sync_set::{
    build_sync_set, sync_set_name, ClusterDeploymentRef, SnitchPayload, SyncSet, SyncSetSpec,
    SYNC_SET_POSTFIX,
};
