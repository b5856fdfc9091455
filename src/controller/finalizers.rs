//! Finalizer handling for ClusterDeployment cleanup
//!
//! The finalizer is the durable record that a snitch may exist for a cluster.
//! It is added before the SyncSet is created and removed only after the
//! snitch and SyncSet are confirmed gone, so Hive cannot finish deleting a
//! ClusterDeployment while its snitch is still live.

use kube::ResourceExt;
use tracing::info;

use crate::crd::ClusterDeployment;
use crate::error::Result;
use crate::store::ResourceStore;

/// Finalizer name used to protect ClusterDeployment resources
pub const DMS_FINALIZER: &str = "dms.managed.openshift.io/deadmanssnitch";

/// Check if the cluster has our finalizer
pub fn has_finalizer(cluster: &ClusterDeployment) -> bool {
    cluster.has_finalizer(DMS_FINALIZER)
}

/// Add the finalizer if not present
pub async fn add_finalizer(store: &dyn ResourceStore, cluster: &ClusterDeployment) -> Result<()> {
    if has_finalizer(cluster) {
        return Ok(());
    }

    let mut finalizers = cluster.finalizers().to_vec();
    finalizers.push(DMS_FINALIZER.to_string());
    store.set_cluster_finalizers(cluster, finalizers).await?;

    info!(
        "Added finalizer to ClusterDeployment {}/{}",
        cluster.namespace().unwrap_or_default(),
        cluster.name_any()
    );
    Ok(())
}

/// Remove the finalizer after cleanup is complete
///
/// Other controllers' finalizers are preserved.
pub async fn remove_finalizer(store: &dyn ResourceStore, cluster: &ClusterDeployment) -> Result<()> {
    if !has_finalizer(cluster) {
        return Ok(());
    }

    let finalizers: Vec<String> = cluster
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != DMS_FINALIZER)
        .cloned()
        .collect();
    store.set_cluster_finalizers(cluster, finalizers).await?;

    info!(
        "Removed finalizer from ClusterDeployment {}/{}",
        cluster.namespace().unwrap_or_default(),
        cluster.name_any()
    );
    Ok(())
}
