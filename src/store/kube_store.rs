//! ResourceStore backed by the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Client, ResourceExt,
};
use serde_json::json;
use tracing::debug;

use super::ResourceStore;
use crate::crd::{ClusterDeployment, SyncSet};
use crate::error::{Error, Result};

/// Field manager recorded on writes
pub const FIELD_MANAGER: &str = "deadmanssnitch-operator";

pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn clusters(&self, namespace: &str) -> Api<ClusterDeployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn sync_sets(&self, namespace: &str) -> Api<SyncSet> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<ClusterDeployment>> {
        Ok(self.clusters(namespace).get_opt(name).await?)
    }

    async fn set_cluster_finalizers(
        &self,
        cluster: &ClusterDeployment,
        finalizers: Vec<String>,
    ) -> Result<()> {
        let namespace = cluster
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let resource_version = cluster
            .resource_version()
            .ok_or(Error::MissingObjectKey(".metadata.resourceVersion"))?;

        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": resource_version,
            }
        });
        self.clusters(&namespace)
            .patch(
                &cluster.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        debug!(
            "Set finalizers on ClusterDeployment {}/{}",
            namespace,
            cluster.name_any()
        );
        Ok(())
    }

    async fn get_sync_set(&self, namespace: &str, name: &str) -> Result<Option<SyncSet>> {
        Ok(self.sync_sets(namespace).get_opt(name).await?)
    }

    async fn list_sync_sets(&self, namespace: Option<&str>) -> Result<Vec<SyncSet>> {
        let api: Api<SyncSet> = match namespace {
            Some(ns) => self.sync_sets(ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn create_sync_set(&self, sync_set: &SyncSet) -> Result<()> {
        let namespace = sync_set
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.sync_sets(&namespace).create(&params, sync_set).await?;
        Ok(())
    }

    async fn delete_sync_set(&self, namespace: &str, name: &str) -> Result<bool> {
        match self
            .sync_sets(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = Error::KubeError(e);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}
