//! Access to the Kubernetes objects the reconciler reads and writes
//!
//! [`ResourceStore`] is the seam between the reconciliation logic and the API
//! server. [`KubeStore`] is the production implementation.

mod kube_store;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;

use crate::crd::{ClusterDeployment, SyncSet};
use crate::error::Result;

pub use kube_store::KubeStore;

/// CRUD access to ClusterDeployments, SyncSets and Secrets
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a ClusterDeployment; `None` when it does not exist
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<ClusterDeployment>>;

    /// Replace the finalizer list of `cluster`.
    ///
    /// The write is conditional on the resource version carried by `cluster`;
    /// a stale version fails with a 409 conflict.
    async fn set_cluster_finalizers(
        &self,
        cluster: &ClusterDeployment,
        finalizers: Vec<String>,
    ) -> Result<()>;

    /// Fetch a SyncSet; `None` when it does not exist
    async fn get_sync_set(&self, namespace: &str, name: &str) -> Result<Option<SyncSet>>;

    /// All SyncSets in `namespace`, or in every namespace when `None`
    async fn list_sync_sets(&self, namespace: Option<&str>) -> Result<Vec<SyncSet>>;

    async fn create_sync_set(&self, sync_set: &SyncSet) -> Result<()>;

    /// Delete a SyncSet. Returns `false` if it did not exist.
    async fn delete_sync_set(&self, namespace: &str, name: &str) -> Result<bool>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;
}
