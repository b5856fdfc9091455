//! In-memory ResourceStore used by the reconciler tests
//!
//! Mimics the API server behaviours the reconciler depends on: resource
//! versions with conflict detection, NotFound on missing objects, and
//! removal of a deleted ClusterDeployment once its last finalizer is gone.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;

use super::ResourceStore;
use crate::crd::{ClusterDeployment, SyncSet};
use crate::error::{api_error, Error, Result};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn object_key<K: ResourceExt>(obj: &K) -> Result<Key> {
    let namespace = obj
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    Ok((namespace, obj.name_any()))
}

#[derive(Default)]
pub struct MemoryStore {
    clusters: Mutex<BTreeMap<Key, ClusterDeployment>>,
    sync_sets: Mutex<BTreeMap<Key, SyncSet>>,
    secrets: Mutex<BTreeMap<Key, Secret>>,
    failing: Mutex<HashSet<&'static str>>,
    version: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn check_failure(&self, op: &'static str) -> Result<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(api_error(500, "InternalError"));
        }
        Ok(())
    }

    /// Make every call of `op` fail with a 500 until [`MemoryStore::heal`]
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    /// Number of successful mutating calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Seed or overwrite a ClusterDeployment, assigning a fresh resource version
    pub fn put_cluster(&self, mut cluster: ClusterDeployment) {
        cluster.metadata.resource_version = Some(self.next_version());
        let k = object_key(&cluster).unwrap();
        self.clusters.lock().unwrap().insert(k, cluster);
    }

    pub fn put_sync_set(&self, mut sync_set: SyncSet) {
        sync_set.metadata.resource_version = Some(self.next_version());
        let k = object_key(&sync_set).unwrap();
        self.sync_sets.lock().unwrap().insert(k, sync_set);
    }

    pub fn put_secret(&self, secret: Secret) {
        let k = object_key(&secret).unwrap();
        self.secrets.lock().unwrap().insert(k, secret);
    }

    pub fn cluster(&self, namespace: &str, name: &str) -> Option<ClusterDeployment> {
        self.clusters.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn sync_sets(&self, namespace: &str) -> Vec<SyncSet> {
        self.sync_sets
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, ss)| ss.clone())
            .collect()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<ClusterDeployment>> {
        self.check_failure("get_cluster")?;
        Ok(self.cluster(namespace, name))
    }

    async fn set_cluster_finalizers(
        &self,
        cluster: &ClusterDeployment,
        finalizers: Vec<String>,
    ) -> Result<()> {
        self.check_failure("set_cluster_finalizers")?;
        let k = object_key(cluster)?;
        let mut clusters = self.clusters.lock().unwrap();
        let stored = clusters
            .get_mut(&k)
            .ok_or_else(|| api_error(404, "NotFound"))?;

        if stored.metadata.resource_version != cluster.metadata.resource_version {
            return Err(api_error(409, "Conflict"));
        }

        if stored.metadata.deletion_timestamp.is_some() && finalizers.is_empty() {
            clusters.remove(&k);
        } else {
            stored.metadata.finalizers = Some(finalizers);
            stored.metadata.resource_version = Some(self.next_version());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_sync_set(&self, namespace: &str, name: &str) -> Result<Option<SyncSet>> {
        self.check_failure("get_sync_set")?;
        Ok(self
            .sync_sets
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned())
    }

    async fn list_sync_sets(&self, namespace: Option<&str>) -> Result<Vec<SyncSet>> {
        self.check_failure("list_sync_sets")?;
        Ok(self
            .sync_sets
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| namespace.map_or(true, |want| ns == want))
            .map(|(_, ss)| ss.clone())
            .collect())
    }

    async fn create_sync_set(&self, sync_set: &SyncSet) -> Result<()> {
        self.check_failure("create_sync_set")?;
        let k = object_key(sync_set)?;
        let mut sync_sets = self.sync_sets.lock().unwrap();
        if sync_sets.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let mut stored = sync_set.clone();
        stored.metadata.resource_version = Some(self.next_version());
        sync_sets.insert(k, stored);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_sync_set(&self, namespace: &str, name: &str) -> Result<bool> {
        self.check_failure("delete_sync_set")?;
        let removed = self
            .sync_sets
            .lock()
            .unwrap()
            .remove(&key(namespace, name))
            .is_some();
        if removed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        self.check_failure("get_secret")?;
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned())
    }
}
