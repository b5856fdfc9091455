//! Reconciliation decisions for a single ClusterDeployment
//!
//! Nothing here performs I/O. The reconciler observes a [`Footprint`], asks
//! [`decide`] what to do, and carries the answer out. No state is kept
//! between passes: where a cluster sits in its monitoring lifecycle is
//! reconstructed every time from the finalizer and the owned SyncSet.

use kube::ResourceExt;
use serde::Serialize;
use tracing::warn;

use crate::crd::{
    sync_set_name, ClusterDeployment, SnitchPayload, SyncSet, MANAGED_LABEL, NOALERTS_LABEL,
    SYNC_SET_POSTFIX,
};

use super::finalizers::has_finalizer;

/// Whether the cluster should have a snitch.
///
/// Requires the cluster to be installed, not being deleted, labelled managed
/// with the exact value `"true"`, and to carry no noalerts label at all.
pub fn is_monitorable(cluster: &ClusterDeployment) -> bool {
    !cluster.is_being_deleted()
        && cluster.is_installed()
        && cluster.label(MANAGED_LABEL) == Some("true")
        && !cluster.has_label(NOALERTS_LABEL)
}

/// Name of the snitch belonging to a cluster
///
/// `<clusterName>.<baseDomain>`, or just the cluster name when no base domain
/// is set. The record name stands in for an empty spec cluster name.
pub fn snitch_name(cluster: &ClusterDeployment) -> String {
    let cluster_name = if cluster.spec.cluster_name.is_empty() {
        cluster.name_any()
    } else {
        cluster.spec.cluster_name.clone()
    };
    match cluster.spec.base_domain.as_deref() {
        Some(domain) if !domain.is_empty() => format!("{cluster_name}.{domain}"),
        _ => cluster_name,
    }
}

/// Whether `sync_set` is the one this operator manages for `cluster_name`.
///
/// Both the derived name and the cluster reference must match; any other
/// SyncSet in the namespace is left alone.
pub fn is_owned_sync_set(sync_set: &SyncSet, cluster_name: &str) -> bool {
    sync_set.name_any() == sync_set_name(cluster_name) && sync_set.references_cluster(cluster_name)
}

/// What this operator currently has in place for a cluster
#[derive(Clone, Debug, Default)]
pub struct Footprint {
    /// Our finalizer is set on the ClusterDeployment
    pub finalizer: bool,
    /// The SyncSet we own for this cluster, if it exists
    pub sync_set: Option<SyncSet>,
    /// Payload decoded from that SyncSet, when it could be decoded
    pub payload: Option<SnitchPayload>,
}

impl Footprint {
    pub fn new(cluster: &ClusterDeployment, sync_set: Option<SyncSet>) -> Self {
        let cluster_name = cluster.name_any();
        let sync_set = sync_set.filter(|ss| is_owned_sync_set(ss, &cluster_name));
        let payload = sync_set.as_ref().and_then(|ss| ss.snitch_payload().ok());
        Self {
            finalizer: has_finalizer(cluster),
            sync_set,
            payload,
        }
    }

    /// Whether anything of ours is left behind for this cluster
    pub fn exists(&self) -> bool {
        self.finalizer || self.sync_set.is_some()
    }
}

/// Lifecycle position of a cluster, reconstructed from a snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitoringState {
    Unmonitored,
    Provisioning,
    Monitored,
    TearingDown,
}

/// What the reconciler should do for a cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Not monitorable and nothing of ours exists; touch nothing
    Skip,
    /// Create or reuse the snitch, set the finalizer, create the SyncSet
    Provision,
    /// Monitored already; only make sure the finalizer is set
    InSync,
    /// Delete the snitch and SyncSet, then drop the finalizer
    Teardown,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Skip => "skip",
            Decision::Provision => "provision",
            Decision::InSync => "in_sync",
            Decision::Teardown => "teardown",
        }
    }

    /// The lifecycle state this decision acts on
    pub fn state(&self) -> MonitoringState {
        match self {
            Decision::Skip => MonitoringState::Unmonitored,
            Decision::Provision => MonitoringState::Provisioning,
            Decision::InSync => MonitoringState::Monitored,
            Decision::Teardown => MonitoringState::TearingDown,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a cluster and its footprint to the action that converges them
pub fn decide(cluster: &ClusterDeployment, footprint: &Footprint) -> Decision {
    match (is_monitorable(cluster), footprint.exists()) {
        (false, false) => Decision::Skip,
        (false, true) => Decision::Teardown,
        (true, _) if footprint.sync_set.is_some() => Decision::InSync,
        (true, _) => Decision::Provision,
    }
}

/// A cluster the operator currently delivers a check-in URL to
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredCluster {
    pub namespace: String,
    pub cluster_name: String,
    pub sync_set: String,
    pub check_in_url: String,
    pub tag: Option<String>,
}

/// Collect the monitored clusters from a SyncSet listing
///
/// Only operator-owned SyncSets count. Those whose payload cannot be decoded
/// are skipped with a warning.
pub fn monitored_clusters(sync_sets: &[SyncSet]) -> Vec<MonitoredCluster> {
    let mut clusters = Vec::new();
    for ss in sync_sets {
        let name = ss.name_any();
        let Some(cluster_name) = name.strip_suffix(SYNC_SET_POSTFIX) else {
            continue;
        };
        if !is_owned_sync_set(ss, cluster_name) {
            continue;
        }
        match ss.snitch_payload() {
            Ok(payload) => clusters.push(MonitoredCluster {
                namespace: ss.namespace().unwrap_or_default(),
                cluster_name: cluster_name.to_string(),
                sync_set: name.clone(),
                check_in_url: payload.check_in_url,
                tag: payload.tag,
            }),
            Err(e) => warn!(
                "Skipping SyncSet {}/{}: {}",
                ss.namespace().unwrap_or_default(),
                name,
                e
            ),
        }
    }
    clusters
}
